use crate::db::ProfilePatch;
use crate::error::ImagegenError;
use crate::server::guards::auth::RequireUser;
use crate::server::router::ImagegenState;
use crate::storage::{ObjectKey, WriteMode, extension_for_content_type};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        State,
        rejection::{BytesRejection, JsonRejection},
    },
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use imagegen_schema::{AvatarPreset, AvatarSelection, Profile, ProfileChange, ProfileWithStats};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use url::Url;

const DICEBEAR_BASE: &str = "https://api.dicebear.com/7.x";

/// (label, DiceBear style)
const AVATAR_STYLES: [(&str, &str); 8] = [
    ("Avataaars", "avataaars"),
    ("Bottts", "bottts"),
    ("Pixel Art", "pixel-art"),
    ("Initials", "initials"),
    ("Fun Emoji", "fun-emoji"),
    ("Big Smile", "big-smile"),
    ("Adventurer", "adventurer"),
    ("Lorelei", "lorelei"),
];

pub fn router() -> Router<ImagegenState> {
    Router::new()
        .route("/profile", get(get_profile).patch(select_avatar))
        .route("/profile/avatar", post(upload_avatar))
        .route("/profile/avatars", get(avatar_presets))
        .route("/profile/events", get(profile_events))
}

async fn load_profile(state: &ImagegenState, user_id: &str) -> Result<Profile, ImagegenError> {
    state
        .db
        .get_profile(user_id)
        .await?
        .map(Profile::from)
        .ok_or_else(|| ImagegenError::NotFound("Profile not found".to_string()))
}

/// GET /profile
async fn get_profile(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ProfileWithStats>, ImagegenError> {
    let profile = load_profile(&state, &user.user_id).await?;
    let total_images = state.db.count_images(&user.user_id).await?;
    Ok(Json(ProfileWithStats {
        profile,
        total_images,
    }))
}

/// PATCH /profile
async fn select_avatar(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    payload: Result<Json<AvatarSelection>, JsonRejection>,
) -> Result<Json<Profile>, ImagegenError> {
    let Json(selection) = payload?;

    let url = Url::parse(selection.avatar_url.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(|| ImagegenError::BadRequest("Avatar URL must be an http(s) URL".to_string()))?;

    set_avatar(&state, &user.user_id, url.to_string()).await.map(Json)
}

/// POST /profile/avatar
///
/// Body is the raw image. Each user has one uploaded avatar per extension, replaced on
/// every upload.
async fn upload_avatar(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Profile>, ImagegenError> {
    let max = state.storage.max_avatar_bytes;
    // The router's body limit rejects before the length check below can run.
    let body = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            ImagegenError::PayloadTooLarge(format!("Avatar exceeds {max} bytes"))
        }
        _ => ImagegenError::BadRequest(rejection.body_text()),
    })?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|v| v.starts_with("image/"))
        .ok_or_else(|| ImagegenError::BadRequest("Avatar must be an image".to_string()))?;

    if body.is_empty() {
        return Err(ImagegenError::BadRequest("Avatar is empty".to_string()));
    }
    if body.len() > max {
        return Err(ImagegenError::PayloadTooLarge(format!(
            "Avatar exceeds {max} bytes"
        )));
    }

    let bucket = state.storage.avatars_bucket.as_str();
    let key = ObjectKey::parse(&format!(
        "{}/avatar.{}",
        user.user_id,
        extension_for_content_type(&content_type)
    ))?;
    state
        .store
        .put(bucket, &key, &body, WriteMode::Overwrite)
        .await?;

    let mut url = state.store.public_url(bucket, &key);
    // Same key on every upload; the query busts client caches.
    url.query_pairs_mut()
        .append_pair("v", &chrono::Utc::now().timestamp_millis().to_string());

    info!(user_id = %user.user_id, key = %key, size = body.len(), "Avatar uploaded");
    set_avatar(&state, &user.user_id, url.to_string()).await.map(Json)
}

async fn set_avatar(
    state: &ImagegenState,
    user_id: &str,
    avatar_url: String,
) -> Result<Profile, ImagegenError> {
    state
        .db
        .patch_profile(user_id, ProfilePatch::Avatar(avatar_url))
        .await?
        .map(Profile::from)
        .ok_or_else(|| ImagegenError::NotFound("Profile not found".to_string()))
}

pub(crate) fn avatar_presets_for(display_name: &str) -> Vec<AvatarPreset> {
    AVATAR_STYLES
        .iter()
        .filter_map(|(name, style)| {
            let mut url = Url::parse(&format!("{DICEBEAR_BASE}/{style}/svg")).ok()?;
            url.query_pairs_mut().append_pair("seed", display_name);
            Some(AvatarPreset {
                name: (*name).to_string(),
                style: (*style).to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// GET /profile/avatars
async fn avatar_presets(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<AvatarPreset>>, ImagegenError> {
    let profile = load_profile(&state, &user.user_id).await?;
    Ok(Json(avatar_presets_for(&profile.display_name)))
}

fn profile_event(change: &ProfileChange) -> Option<Event> {
    match Event::default().event("profile").json_data(change) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Failed to encode profile change");
            None
        }
    }
}

/// GET /profile/events
///
/// Opens with the current snapshot, then one `profile` event per committed change.
async fn profile_events(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse, ImagegenError> {
    // Subscribe before reading the snapshot so no change can fall in between.
    let subscription = state.feed.subscribe(&user.user_id);
    let profile = load_profile(&state, &user.user_id).await?;
    let snapshot = ProfileChange::from(&profile);

    let events = tokio_stream::once(snapshot)
        .chain(subscription.into_stream())
        .filter_map(|change| profile_event(&change))
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
