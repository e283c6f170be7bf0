use crate::db::{ProfileCreate, ProfilePatch};
use crate::error::ImagegenError;
use crate::server::router::ImagegenState;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use imagegen_schema::{AdminProfileCreate, CreditTopUp, Profile, SessionIssue, SessionToken};
use tracing::info;

/// Operator routes. Stand in for the external signup and billing flows; guarded by the
/// admin key in the router.
pub fn router() -> Router<ImagegenState> {
    Router::new()
        .route("/admin/profiles", post(create_profile))
        .route("/admin/profiles/{id}/credits", post(add_credits))
        .route("/admin/sessions", post(issue_session))
}

/// POST /admin/profiles
async fn create_profile(
    State(state): State<ImagegenState>,
    payload: Result<Json<AdminProfileCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ImagegenError> {
    let Json(req) = payload?;

    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ImagegenError::BadRequest("Display name is required".to_string()));
    }
    if req.credits < 0 {
        return Err(ImagegenError::BadRequest("Credits must not be negative".to_string()));
    }
    let id = req
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if id.contains('/') {
        return Err(ImagegenError::BadRequest("Invalid profile id".to_string()));
    }

    let row = state
        .db
        .create_profile(ProfileCreate {
            id,
            display_name: display_name.to_string(),
            avatar_url: None,
            credits: req.credits,
        })
        .await?;

    info!(user_id = %row.id, credits = row.credits, "Profile created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// POST /admin/profiles/{id}/credits
async fn add_credits(
    State(state): State<ImagegenState>,
    Path(user_id): Path<String>,
    payload: Result<Json<CreditTopUp>, JsonRejection>,
) -> Result<Json<Profile>, ImagegenError> {
    let Json(CreditTopUp { amount }) = payload?;
    if amount <= 0 {
        return Err(ImagegenError::BadRequest("Amount must be positive".to_string()));
    }

    let row = state
        .db
        .patch_profile(&user_id, ProfilePatch::AddCredits(amount))
        .await?
        .ok_or_else(|| ImagegenError::NotFound("Profile not found".to_string()))?;

    info!(user_id = %row.id, amount, credits = row.credits, "Credits added");
    Ok(Json(row.into()))
}

/// POST /admin/sessions
async fn issue_session(
    State(state): State<ImagegenState>,
    payload: Result<Json<SessionIssue>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionToken>), ImagegenError> {
    let Json(SessionIssue { user_id }) = payload?;

    if state.db.get_profile(&user_id).await?.is_none() {
        return Err(ImagegenError::NotFound("Profile not found".to_string()));
    }

    let session = state.sessions.issue(&user_id).await?;
    info!(user_id = %session.user_id, expires_at = %session.expires_at, "Session issued");
    Ok((
        StatusCode::CREATED,
        Json(SessionToken {
            access_token: session.token,
            user_id: session.user_id,
            expires_at: session.expires_at,
        }),
    ))
}
