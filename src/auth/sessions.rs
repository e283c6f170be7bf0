use crate::db::{DbActorHandle, DbSession};
use crate::error::ImagegenError;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::time::Duration;
use tracing::debug;

const SESSION_CACHE_CAPACITY: u64 = 10_000;

/// The caller behind a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

#[derive(Debug, Clone)]
struct CachedSession {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Resolves bearer tokens to users, with a short-lived in-memory cache in front of the database.
///
/// Only positive lookups are cached.
#[derive(Clone)]
pub struct SessionResolver {
    db: DbActorHandle,
    cache: Cache<String, CachedSession>,
    ttl: Duration,
}

impl SessionResolver {
    pub fn new(db: DbActorHandle, cache_ttl: Duration, session_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(SESSION_CACHE_CAPACITY)
            .time_to_live(cache_ttl.max(Duration::from_millis(1)))
            .build();
        Self {
            db,
            cache,
            ttl: session_ttl,
        }
    }

    /// Lifetime given to newly issued sessions.
    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn resolve(&self, token: &str) -> Result<Option<AuthUser>, ImagegenError> {
        let now = Utc::now();

        if let Some(hit) = self.cache.get(token) {
            if hit.expires_at > now {
                return Ok(Some(AuthUser {
                    user_id: hit.user_id,
                }));
            }
            self.cache.invalidate(token);
            return Ok(None);
        }

        let Some(DbSession {
            user_id,
            expires_at,
            ..
        }) = self.db.find_session(token).await?
        else {
            debug!("Bearer token did not match a live session");
            return Ok(None);
        };

        self.cache.insert(
            token.to_string(),
            CachedSession {
                user_id: user_id.clone(),
                expires_at,
            },
        );
        Ok(Some(AuthUser { user_id }))
    }

    /// Issue a new session for `user_id`.
    pub async fn issue(&self, user_id: &str) -> Result<DbSession, ImagegenError> {
        let token = super::generate_session_token();
        self.db.create_session(token, user_id, self.ttl).await
    }
}
