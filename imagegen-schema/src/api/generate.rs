use serde::{Deserialize, Serialize};

use super::ImageRecord;

/// Body of `POST /functions/v1/generate-image`.
///
/// `prompt` stays optional so a missing prompt is reported as a validation failure
/// instead of a JSON schema rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }

    /// The prompt with surrounding whitespace removed, or `None` when it is absent or blank.
    pub fn normalized_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerateResponse {
    pub image: ImageRecord,
    #[serde(rename = "remainingCredits")]
    pub remaining_credits: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_prompt_rejects_blank_and_missing() {
        assert_eq!(GenerateRequest::default().normalized_prompt(), None);
        assert_eq!(GenerateRequest::new("   ").normalized_prompt(), None);
        assert_eq!(
            GenerateRequest::new("  a red fox ").normalized_prompt(),
            Some("a red fox")
        );
    }

    #[test]
    fn missing_prompt_field_deserializes() {
        let req: GenerateRequest = serde_json::from_str("{}").expect("parse");
        assert!(req.prompt.is_none());
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":null}"#).expect("parse");
        assert!(req.prompt.is_none());
    }
}
