use crate::db::DbImage;
use crate::error::ImagegenError;
use crate::server::guards::auth::RequireUser;
use crate::server::router::ImagegenState;
use crate::storage::ObjectKey;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use imagegen_schema::{ImageRecord, LikeRequest};
use tracing::{info, warn};

const MAX_SLUG_CHARS: usize = 50;

pub fn router() -> Router<ImagegenState> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/{id}", patch(set_liked).delete(delete_image))
        .route("/images/{id}/download", get(download_image))
}

fn image_not_found() -> ImagegenError {
    ImagegenError::NotFound("Image not found".to_string())
}

/// GET /images
async fn list_images(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ImageRecord>>, ImagegenError> {
    let rows = state.db.list_images(&user.user_id).await?;
    Ok(Json(rows.into_iter().map(ImageRecord::from).collect()))
}

/// PATCH /images/{id}
async fn set_liked(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    Path(image_id): Path<i64>,
    payload: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<ImageRecord>, ImagegenError> {
    let Json(LikeRequest { liked }) = payload?;
    state
        .db
        .set_liked(&user.user_id, image_id, liked)
        .await?
        .map(|row| Json(row.into()))
        .ok_or_else(image_not_found)
}

/// DELETE /images/{id}
///
/// The row goes first. A stored object that cannot be removed afterwards is only logged.
async fn delete_image(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    Path(image_id): Path<i64>,
) -> Result<StatusCode, ImagegenError> {
    let row = state
        .db
        .delete_image(&user.user_id, image_id)
        .await?
        .ok_or_else(image_not_found)?;

    let bucket = state.storage.images_bucket.as_str();
    match ObjectKey::parse(&row.storage_key) {
        Ok(key) => {
            if let Err(e) = state.store.delete(bucket, &key).await {
                warn!(image_id, key = %key, error = %e, "Failed to delete image object");
            }
        }
        Err(e) => warn!(image_id, error = %e, "Image row had an invalid storage key"),
    }

    info!(user_id = %user.user_id, image_id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /images/{id}/download
async fn download_image(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    Path(image_id): Path<i64>,
) -> Result<Response, ImagegenError> {
    let row = state
        .db
        .get_image(&user.user_id, image_id)
        .await?
        .ok_or_else(image_not_found)?;

    let key = ObjectKey::parse(&row.storage_key)?;
    let object = state
        .store
        .get(state.storage.images_bucket.as_str(), &key)
        .await?;

    let filename = download_filename(&row, &key);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ImagegenError::Internal(format!("content-disposition: {e}")))?;
    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        object.bytes,
    )
        .into_response())
}

fn download_filename(row: &DbImage, key: &ObjectKey) -> String {
    let ext = key.extension().unwrap_or("bin");
    format!("{}.{ext}", slugify(&row.prompt))
}

/// Lowercase ASCII alphanumerics joined by single dashes. Falls back to `image`.
pub(crate) fn slugify(prompt: &str) -> String {
    let mut slug = String::with_capacity(prompt.len().min(MAX_SLUG_CHARS));
    for c in prompt.chars() {
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug.to_string()
    }
}
