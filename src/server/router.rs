use crate::auth::{SessionResolver, generate_request_id};
use crate::config::{Config, StorageConfig};
use crate::db::DbActorHandle;
use crate::provider::ImageProvider;
use crate::realtime::ChangeFeed;
use crate::server::guards::auth::RequireAdminKey;
use crate::server::routes::{admin, generate, images, profile};
use crate::service::GenerationService;
use crate::storage::{ObjectStore, PUBLIC_PREFIX};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Method, StatusCode, Version, header},
    middleware::{self, Next},
    response::Response,
};
use std::time::Instant;
use std::{sync::Arc, time::Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct ImagegenState {
    pub db: DbActorHandle,
    pub sessions: SessionResolver,
    pub generation: GenerationService,
    pub store: Arc<dyn ObjectStore>,
    pub feed: ChangeFeed,
    pub storage: Arc<StorageConfig>,
    pub admin_key: Arc<str>,
    allowed_origins: Arc<[String]>,
}

impl ImagegenState {
    pub fn new(
        db: DbActorHandle,
        feed: ChangeFeed,
        provider: Arc<dyn ImageProvider>,
        store: Arc<dyn ObjectStore>,
        cfg: &Config,
    ) -> Self {
        let sessions = SessionResolver::new(
            db.clone(),
            Duration::from_secs(cfg.basic.session_cache_secs),
            Duration::from_secs(cfg.basic.session_ttl_secs),
        );
        let generation = GenerationService::new(
            db.clone(),
            provider,
            store.clone(),
            cfg.storage.images_bucket.as_str(),
        );

        Self {
            db,
            sessions,
            generation,
            store,
            feed,
            storage: Arc::new(cfg.storage.clone()),
            admin_key: Arc::from(cfg.basic.admin_key.as_str()),
            allowed_origins: cfg.basic.allowed_origins.clone().into(),
        }
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    // For the SSE feed, `latency_ms` is time until the stream opened.
    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

pub fn imagegen_router(state: ImagegenState) -> Router {
    let public_objects = ServeDir::new(&state.storage.root);
    let cors = cors_layer(&state.allowed_origins);
    // Avatar uploads are the largest bodies; anything over the cap still gets a 413.
    let body_limit = DefaultBodyLimit::max(state.storage.max_avatar_bytes.max(MIN_BODY_LIMIT));

    let admin = admin::router().route_layer(middleware::from_extractor_with_state::<
        RequireAdminKey,
        _,
    >(state.clone()));

    Router::new()
        .merge(generate::router())
        .merge(profile::router())
        .merge(images::router())
        .merge(admin)
        .nest_service(&format!("/{PUBLIC_PREFIX}"), public_objects)
        .fallback(not_found_handler)
        .layer(body_limit)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(access_log))
}
