use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

/// `GET /profile` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileWithStats {
    #[serde(flatten)]
    pub profile: Profile,
    pub total_images: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarSelection {
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AvatarPreset {
    pub name: String,
    pub style: String,
    pub url: String,
}

/// A pushed change to one profile row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileChange {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credits: i64,
}

impl From<&Profile> for ProfileChange {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            credits: profile.credits,
        }
    }
}
