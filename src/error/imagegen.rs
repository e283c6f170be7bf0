use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use imagegen_schema::ErrorBody;
use thiserror::Error as ThisError;

use super::{ProviderError, StorageError};

/// Request-terminal failures. Every variant maps to exactly one status code.
#[derive(Debug, ThisError)]
pub enum ImagegenError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A write the caller asked for was rejected by the database.
    #[error("{message}: {detail}")]
    Persistence {
        message: &'static str,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    Ractor(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImagegenError {
    pub fn status(&self) -> StatusCode {
        match self {
            ImagegenError::Unauthorized => StatusCode::UNAUTHORIZED,
            ImagegenError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ImagegenError::NotFound(_) | ImagegenError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ImagegenError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ImagegenError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ImagegenError::Provider(_)
            | ImagegenError::Storage(_)
            | ImagegenError::Persistence { .. }
            | ImagegenError::Database(_)
            | ImagegenError::Ractor(_)
            | ImagegenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ImagegenError::Unauthorized => "Unauthorized".to_string(),
            ImagegenError::BadRequest(msg)
            | ImagegenError::NotFound(msg)
            | ImagegenError::PayloadTooLarge(msg) => msg.clone(),
            ImagegenError::InsufficientCredits => "Insufficient credits".to_string(),
            ImagegenError::Provider(e) => e.client_message().to_string(),
            ImagegenError::Storage(StorageError::NotFound(_)) => "Object not found".to_string(),
            ImagegenError::Storage(
                StorageError::Write { .. }
                | StorageError::AlreadyExists(_)
                | StorageError::InvalidKey(_),
            ) => "Failed to save image to storage".to_string(),
            ImagegenError::Storage(_) => "Storage error".to_string(),
            ImagegenError::Persistence { message, .. } => (*message).to_string(),
            ImagegenError::Database(_)
            | ImagegenError::Ractor(_)
            | ImagegenError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<JsonRejection> for ImagegenError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(e) => {
                ImagegenError::Internal(format!("Failed to read request body: {e}"))
            }
            JsonRejection::JsonSyntaxError(_) => ImagegenError::BadRequest("Invalid JSON".to_string()),
            other => {
                tracing::debug!(rejection = %other, "Request body rejected");
                ImagegenError::BadRequest("Invalid request".to_string())
            }
        }
    }
}

impl IntoResponse for ImagegenError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody::new(self.client_message());

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}
