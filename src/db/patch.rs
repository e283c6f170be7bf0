use serde::{Deserialize, Serialize};

use super::DbImage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCreate {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credits: i64,
}

/// Single-field profile mutations. Each one publishes a profile change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ProfilePatch {
    Avatar(String),
    AddCredits(i64),
}

/// Everything needed to bill one generation and record its image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCommit {
    pub user_id: String,
    pub prompt: String,
    pub image_data: String,
    pub storage_key: String,
}

#[derive(Debug, Clone)]
pub struct CommittedGeneration {
    pub image: DbImage,
    pub remaining_credits: i64,
}
