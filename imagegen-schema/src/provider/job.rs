use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderJobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
    /// Any status this client does not know. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl ProviderJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Accepted but not finished yet.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }
}

/// Asynchronous generation job as reported by the provider's job endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderJob {
    pub id: String,
    pub status: ProviderJobStatus,
    /// Downloadable image URL once `status` is `succeeded`.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
