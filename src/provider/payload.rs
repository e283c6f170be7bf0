use super::GeneratedImage;
use crate::error::ProviderError;
use base64::Engine as _;

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

/// Decode a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(data_url: &str) -> Result<GeneratedImage, ProviderError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| ProviderError::Payload("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProviderError::Payload("data URL without payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ProviderError::Payload("data URL is not base64-encoded".to_string()))?;

    let content_type = if mime.is_empty() {
        DEFAULT_IMAGE_CONTENT_TYPE.to_string()
    } else {
        mime.to_ascii_lowercase()
    };
    if !content_type.starts_with("image/") {
        return Err(ProviderError::Payload(format!(
            "data URL carries {content_type}, expected an image"
        )));
    }

    let payload = payload.trim();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(payload))?;
    if bytes.is_empty() {
        return Err(ProviderError::NoImage);
    }

    Ok(GeneratedImage {
        bytes,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_url() {
        let img = decode_data_url("data:image/png;base64,aGVsbG8=").expect("decode");
        assert_eq!(img.bytes, b"hello");
        assert_eq!(img.content_type, "image/png");
    }

    #[test]
    fn accepts_unpadded_payload_and_defaults_mime() {
        let img = decode_data_url("data:;base64,aGVsbG8").expect("decode");
        assert_eq!(img.bytes, b"hello");
        assert_eq!(img.content_type, "image/png");
    }

    #[test]
    fn rejects_non_image_and_non_base64() {
        assert!(matches!(
            decode_data_url("data:text/plain;base64,aGVsbG8="),
            Err(ProviderError::Payload(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png,rawbytes"),
            Err(ProviderError::Payload(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,!!!"),
            Err(ProviderError::Decode(_))
        ));
        assert!(matches!(
            decode_data_url("https://example.test/a.png"),
            Err(ProviderError::Payload(_))
        ));
    }
}
