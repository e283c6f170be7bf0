//! Upstream image generation.

mod chat;
mod payload;

pub use chat::ChatImageProvider;
pub use payload::decode_data_url;

use crate::error::ProviderError;
use async_trait::async_trait;

pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Turns a prompt into image bytes. One call, no retries.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}
