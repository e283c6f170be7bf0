use base64::Engine as _;
use rand::RngCore;

fn random_urlsafe<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// 96 bits => 16 chars base64url (no padding).
pub fn generate_request_id() -> String {
    random_urlsafe::<12>()
}

/// 256 bits => 43 chars base64url (no padding).
pub fn generate_session_token() -> String {
    random_urlsafe::<32>()
}
