use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /admin/profiles`. Stands in for the external signup flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminProfileCreate {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub credits: i64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CreditTopUp {
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionIssue {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}
