use thiserror::Error as ThisError;

/// Failures seen by the gallery client.
#[derive(Debug, ThisError)]
pub enum GalleryError {
    /// Rejected locally, before any request was made.
    #[error("{0}")]
    Invalid(String),

    #[error("{0} not found in view")]
    Missing(&'static str),

    /// The server answered with a non-2xx status and an `{ "error": ... }` body.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("event stream error: {0}")]
    Stream(String),
}

impl GalleryError {
    /// HTTP status when the server rejected the call.
    pub fn status(&self) -> Option<u16> {
        match self {
            GalleryError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
