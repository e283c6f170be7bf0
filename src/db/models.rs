use chrono::{DateTime, Utc};
use imagegen_schema::{ImageRecord, Profile, ProfileChange};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbProfile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbImage {
    pub id: i64,
    pub user_id: String,
    pub prompt: String,
    pub image_data: String,
    /// Key inside the images bucket; never sent to clients.
    pub storage_key: String,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DbSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl From<DbProfile> for Profile {
    fn from(row: DbProfile) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            credits: row.credits,
            created_at: row.created_at,
        }
    }
}

impl From<&DbProfile> for ProfileChange {
    fn from(row: &DbProfile) -> Self {
        Self {
            user_id: row.id.clone(),
            display_name: row.display_name.clone(),
            avatar_url: row.avatar_url.clone(),
            credits: row.credits,
        }
    }
}

impl From<DbImage> for ImageRecord {
    fn from(row: DbImage) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prompt: row.prompt,
            image_data: row.image_data,
            liked: row.liked,
            created_at: row.created_at,
        }
    }
}
