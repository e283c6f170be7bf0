use crate::auth::AuthUser;
use crate::error::ImagegenError;
use crate::server::router::ImagegenState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use imagegen_schema::ErrorBody;
use subtle::ConstantTimeEq;

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Browsers cannot set headers on an `EventSource`, so the feed also accepts `?access_token=`.
fn extract_query_token(query: Option<&str>) -> Option<String> {
    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.into_owned())
    })
}

/// An authenticated end user, resolved from a session token.
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthUser);

impl FromRequestParts<ImagegenState> for RequireUser {
    type Rejection = ImagegenError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ImagegenState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .or_else(|| extract_query_token(parts.uri.query()))
            .filter(|t| !t.is_empty())
            .ok_or(ImagegenError::Unauthorized)?;

        state
            .sessions
            .resolve(&token)
            .await?
            .map(RequireUser)
            .ok_or(ImagegenError::Unauthorized)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<ImagegenState> for RequireAdminKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ImagegenState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| extract_bearer_token(&parts.headers));

        match token {
            Some(key) => {
                let expected = state.admin_key.as_ref();
                // An unset key never matches, even an empty header.
                if !expected.is_empty() && bool::from(key.as_bytes().ct_eq(expected.as_bytes())) {
                    Ok(RequireAdminKey)
                } else {
                    Err(AuthError::InvalidKey)
                }
            }
            None => Err(AuthError::MissingKey),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let reason = match self {
            AuthError::MissingKey => "Missing admin key",
            AuthError::InvalidKey => "Invalid admin key",
        };
        tracing::warn!(reason, "Admin request rejected");
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("Unauthorized")),
        )
            .into_response()
    }
}
