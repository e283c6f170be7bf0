use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generated image as exposed to clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub user_id: String,
    pub prompt: String,
    /// Public URL of the stored object.
    pub image_data: String,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LikeRequest {
    pub liked: bool,
}
