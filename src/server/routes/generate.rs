use crate::error::ImagegenError;
use crate::server::guards::auth::RequireUser;
use crate::server::router::ImagegenState;
use axum::{Json, Router, extract::State, extract::rejection::JsonRejection, routing::post};
use imagegen_schema::{GenerateRequest, GenerateResponse};

pub fn router() -> Router<ImagegenState> {
    Router::new().route("/functions/v1/generate-image", post(generate_image))
}

/// POST /functions/v1/generate-image
///
/// The user guard runs before the body is read, so a bad token is a 401 even with a
/// malformed body.
async fn generate_image(
    State(state): State<ImagegenState>,
    RequireUser(user): RequireUser,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ImagegenError> {
    let Json(request) = payload?;
    let resp = state.generation.generate(&user.user_id, &request).await?;
    Ok(Json(resp))
}
