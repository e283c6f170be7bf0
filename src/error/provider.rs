use reqwest::StatusCode;
use thiserror::Error as ThisError;

/// Failures talking to the upstream image provider.
#[derive(Debug, ThisError)]
pub enum ProviderError {
    #[error("provider API key not configured")]
    ApiKeyMissing,

    /// Transport-level failure (DNS, connect, timeouts, etc).
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body:.200}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("malformed upstream payload: {0}")]
    Payload(String),

    #[error("no image in upstream response")]
    NoImage,

    #[error("generated image exceeds {limit} bytes")]
    ImageTooLarge { limit: usize },

    #[error("invalid base64 image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("generation job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },

    #[error("generation job {id} still pending after {attempts} polls")]
    JobTimedOut { id: String, attempts: usize },
}

impl ProviderError {
    /// Message shown to clients. Upstream detail stays in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            ProviderError::ApiKeyMissing => "Provider API key not configured",
            ProviderError::NoImage => "No image generated",
            _ => "Failed to generate image",
        }
    }
}
