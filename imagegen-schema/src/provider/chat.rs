use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{ProviderJob, ProviderJobStatus};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatImageRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub modalities: Vec<String>,
}

impl ChatImageRequest {
    /// Single user turn asking for image and text output.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            modalities: vec!["image".to_string(), "text".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Provider response. Either `choices` carries an image, or `id` + `status` describe a job.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatImageResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<ProviderJobStatus>,

    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<ResponseImage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseImage {
    pub image_url: ImageUrl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatImageResponse {
    /// `choices[0].message.images[0].image_url.url`, if present.
    pub fn first_image_url(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .images
            .first()
            .map(|img| img.image_url.url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// A job handle when the provider accepted the prompt asynchronously.
    pub fn pending_job(&self) -> Option<ProviderJob> {
        if self.first_image_url().is_some() {
            return None;
        }
        let status = self.status.filter(|s| s.is_pending())?;
        let id = self.id.clone()?;
        Some(ProviderJob {
            id,
            status,
            output: None,
            error: None,
        })
    }
}
