use crate::db::models::{DbImage, DbProfile, DbSession};
use crate::db::patch::{CommittedGeneration, GenerationCommit, ProfileCreate, ProfilePatch};
use crate::db::schema::SQLITE_INIT;
use crate::error::ImagegenError;
use crate::realtime::ChangeFeed;
use chrono::Utc;
use imagegen_schema::ProfileChange;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

type Reply<T> = RpcReplyPort<Result<T, ImagegenError>>;

const PROFILE_COLUMNS: &str = "id, display_name, avatar_url, credits, created_at";
const IMAGE_COLUMNS: &str = "id, user_id, prompt, image_data, storage_key, liked, created_at";
const SESSION_COLUMNS: &str = "token, user_id, expires_at, created_at";

#[derive(Debug)]
pub enum DbActorMessage {
    /// Create (or rename) a profile and return the stored row.
    CreateProfile(ProfileCreate, Reply<DbProfile>),

    GetProfile(String, Reply<Option<DbProfile>>),

    /// Apply a single-field patch. `None` if the profile does not exist.
    PatchProfile {
        user_id: String,
        patch: ProfilePatch,
        reply: Reply<Option<DbProfile>>,
    },

    /// Deduct one credit and insert the image row in one transaction.
    /// `None` if the balance was already exhausted.
    CommitGeneration(GenerationCommit, Reply<Option<CommittedGeneration>>),

    /// List a user's images, newest first.
    ListImages(String, Reply<Vec<DbImage>>),

    CountImages(String, Reply<i64>),

    GetImage {
        user_id: String,
        image_id: i64,
        reply: Reply<Option<DbImage>>,
    },

    SetLiked {
        user_id: String,
        image_id: i64,
        liked: bool,
        reply: Reply<Option<DbImage>>,
    },

    /// Delete an image row and return it.
    DeleteImage {
        user_id: String,
        image_id: i64,
        reply: Reply<Option<DbImage>>,
    },

    CreateSession {
        token: String,
        user_id: String,
        ttl: Duration,
        reply: Reply<DbSession>,
    },

    /// Resolve a token. Expired sessions resolve to `None`.
    FindSession(String, Reply<Option<DbSession>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

fn rpc_failed(op: &str, e: impl std::fmt::Display) -> ImagegenError {
    ImagegenError::Ractor(format!("DbActor {op} RPC failed: {e}"))
}

impl DbActorHandle {
    pub async fn create_profile(&self, create: ProfileCreate) -> Result<DbProfile, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::CreateProfile, create)
            .map_err(|e| rpc_failed("CreateProfile", e))?
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<DbProfile>, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::GetProfile, user_id.to_string())
            .map_err(|e| rpc_failed("GetProfile", e))?
    }

    pub async fn patch_profile(
        &self,
        user_id: &str,
        patch: ProfilePatch,
    ) -> Result<Option<DbProfile>, ImagegenError> {
        ractor::call!(self.actor, |reply| DbActorMessage::PatchProfile {
            user_id: user_id.to_string(),
            patch,
            reply,
        })
        .map_err(|e| rpc_failed("PatchProfile", e))?
    }

    pub async fn commit_generation(
        &self,
        commit: GenerationCommit,
    ) -> Result<Option<CommittedGeneration>, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::CommitGeneration, commit)
            .map_err(|e| rpc_failed("CommitGeneration", e))?
    }

    pub async fn list_images(&self, user_id: &str) -> Result<Vec<DbImage>, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::ListImages, user_id.to_string())
            .map_err(|e| rpc_failed("ListImages", e))?
    }

    pub async fn count_images(&self, user_id: &str) -> Result<i64, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::CountImages, user_id.to_string())
            .map_err(|e| rpc_failed("CountImages", e))?
    }

    pub async fn get_image(
        &self,
        user_id: &str,
        image_id: i64,
    ) -> Result<Option<DbImage>, ImagegenError> {
        ractor::call!(self.actor, |reply| DbActorMessage::GetImage {
            user_id: user_id.to_string(),
            image_id,
            reply,
        })
        .map_err(|e| rpc_failed("GetImage", e))?
    }

    pub async fn set_liked(
        &self,
        user_id: &str,
        image_id: i64,
        liked: bool,
    ) -> Result<Option<DbImage>, ImagegenError> {
        ractor::call!(self.actor, |reply| DbActorMessage::SetLiked {
            user_id: user_id.to_string(),
            image_id,
            liked,
            reply,
        })
        .map_err(|e| rpc_failed("SetLiked", e))?
    }

    pub async fn delete_image(
        &self,
        user_id: &str,
        image_id: i64,
    ) -> Result<Option<DbImage>, ImagegenError> {
        ractor::call!(self.actor, |reply| DbActorMessage::DeleteImage {
            user_id: user_id.to_string(),
            image_id,
            reply,
        })
        .map_err(|e| rpc_failed("DeleteImage", e))?
    }

    pub async fn create_session(
        &self,
        token: String,
        user_id: &str,
        ttl: Duration,
    ) -> Result<DbSession, ImagegenError> {
        ractor::call!(self.actor, |reply| DbActorMessage::CreateSession {
            token,
            user_id: user_id.to_string(),
            ttl,
            reply,
        })
        .map_err(|e| rpc_failed("CreateSession", e))?
    }

    pub async fn find_session(&self, token: &str) -> Result<Option<DbSession>, ImagegenError> {
        ractor::call!(self.actor, DbActorMessage::FindSession, token.to_string())
            .map_err(|e| rpc_failed("FindSession", e))?
    }
}

struct DbActorState {
    pool: SqlitePool,
    feed: ChangeFeed,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = (String, ChangeFeed);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (database_url, feed): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool, feed })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::CreateProfile(create, reply) => {
                let _ = reply.send(self.create_profile(pool, create).await);
            }
            DbActorMessage::GetProfile(user_id, reply) => {
                let _ = reply.send(self.get_profile(pool, &user_id).await);
            }
            DbActorMessage::PatchProfile {
                user_id,
                patch,
                reply,
            } => {
                let res = self.patch_profile(pool, &user_id, patch).await;
                if let Ok(Some(profile)) = &res {
                    publish(&state.feed, profile);
                }
                let _ = reply.send(res);
            }
            DbActorMessage::CommitGeneration(commit, reply) => {
                let res = self.commit_generation(pool, commit).await;
                if let Ok(Some((_, profile))) = &res {
                    publish(&state.feed, profile);
                }
                let _ = reply.send(res.map(|done| done.map(|(committed, _)| committed)));
            }
            DbActorMessage::ListImages(user_id, reply) => {
                let _ = reply.send(self.list_images(pool, &user_id).await);
            }
            DbActorMessage::CountImages(user_id, reply) => {
                let _ = reply.send(self.count_images(pool, &user_id).await);
            }
            DbActorMessage::GetImage {
                user_id,
                image_id,
                reply,
            } => {
                let _ = reply.send(self.get_image(pool, &user_id, image_id).await);
            }
            DbActorMessage::SetLiked {
                user_id,
                image_id,
                liked,
                reply,
            } => {
                let _ = reply.send(self.set_liked(pool, &user_id, image_id, liked).await);
            }
            DbActorMessage::DeleteImage {
                user_id,
                image_id,
                reply,
            } => {
                let _ = reply.send(self.delete_image(pool, &user_id, image_id).await);
            }
            DbActorMessage::CreateSession {
                token,
                user_id,
                ttl,
                reply,
            } => {
                let _ = reply.send(self.create_session(pool, token, &user_id, ttl).await);
            }
            DbActorMessage::FindSession(token, reply) => {
                let _ = reply.send(self.find_session(pool, &token).await);
            }
        }
        Ok(())
    }
}

fn publish(feed: &ChangeFeed, profile: &DbProfile) {
    let delivered = feed.publish(ProfileChange::from(profile));
    debug!(
        user_id = %profile.id,
        credits = profile.credits,
        delivered,
        "Profile change published"
    );
}

impl DbActor {
    async fn create_profile(
        &self,
        pool: &SqlitePool,
        create: ProfileCreate,
    ) -> Result<DbProfile, ImagegenError> {
        let row = sqlx::query_as::<_, DbProfile>(&format!(
            r#"
        INSERT INTO profiles (id, display_name, avatar_url, credits, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            avatar_url = COALESCE(excluded.avatar_url, avatar_url)
        RETURNING {PROFILE_COLUMNS}
        "#
        ))
        .bind(create.id)
        .bind(create.display_name)
        .bind(create.avatar_url)
        .bind(create.credits)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    async fn get_profile(
        &self,
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Option<DbProfile>, ImagegenError> {
        let row = sqlx::query_as::<_, DbProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    async fn patch_profile(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        patch: ProfilePatch,
    ) -> Result<Option<DbProfile>, ImagegenError> {
        let query = match &patch {
            ProfilePatch::Avatar(_) => format!(
                "UPDATE profiles SET avatar_url = ? WHERE id = ? RETURNING {PROFILE_COLUMNS}"
            ),
            ProfilePatch::AddCredits(_) => format!(
                "UPDATE profiles SET credits = credits + ? WHERE id = ? RETURNING {PROFILE_COLUMNS}"
            ),
        };

        let q = sqlx::query_as::<_, DbProfile>(&query);
        let q = match patch {
            ProfilePatch::Avatar(url) => q.bind(url),
            ProfilePatch::AddCredits(amount) => q.bind(amount),
        };

        let row = q.bind(user_id).fetch_optional(pool).await?;
        Ok(row)
    }

    async fn commit_generation(
        &self,
        pool: &SqlitePool,
        commit: GenerationCommit,
    ) -> Result<Option<(CommittedGeneration, DbProfile)>, ImagegenError> {
        let mut tx = pool.begin().await?;

        // Guarded decrement: the balance can only move from >= 1 to >= 0.
        let profile = sqlx::query_as::<_, DbProfile>(&format!(
            r#"
        UPDATE profiles SET credits = credits - 1
        WHERE id = ? AND credits >= 1
        RETURNING {PROFILE_COLUMNS}
        "#
        ))
        .bind(&commit.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(profile) = profile else {
            tx.rollback().await?;
            return Ok(None);
        };

        let image = sqlx::query_as::<_, DbImage>(&format!(
            r#"
        INSERT INTO images (user_id, prompt, image_data, storage_key, liked, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        RETURNING {IMAGE_COLUMNS}
        "#
        ))
        .bind(&commit.user_id)
        .bind(commit.prompt)
        .bind(commit.image_data)
        .bind(commit.storage_key)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let committed = CommittedGeneration {
            image,
            remaining_credits: profile.credits,
        };
        Ok(Some((committed, profile)))
    }

    async fn list_images(
        &self,
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<DbImage>, ImagegenError> {
        let rows = sqlx::query_as::<_, DbImage>(&format!(
            r#"
        SELECT {IMAGE_COLUMNS}
        FROM images
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn count_images(&self, pool: &SqlitePool, user_id: &str) -> Result<i64, ImagegenError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    async fn get_image(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        image_id: i64,
    ) -> Result<Option<DbImage>, ImagegenError> {
        let row = sqlx::query_as::<_, DbImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = ? AND user_id = ?"
        ))
        .bind(image_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    async fn set_liked(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        image_id: i64,
        liked: bool,
    ) -> Result<Option<DbImage>, ImagegenError> {
        let row = sqlx::query_as::<_, DbImage>(&format!(
            "UPDATE images SET liked = ? WHERE id = ? AND user_id = ? RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(liked)
        .bind(image_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    async fn delete_image(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        image_id: i64,
    ) -> Result<Option<DbImage>, ImagegenError> {
        let row = sqlx::query_as::<_, DbImage>(&format!(
            "DELETE FROM images WHERE id = ? AND user_id = ? RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(image_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    async fn create_session(
        &self,
        pool: &SqlitePool,
        token: String,
        user_id: &str,
        ttl: Duration,
    ) -> Result<DbSession, ImagegenError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ImagegenError::BadRequest(format!("invalid session ttl: {e}")))?;

        let row = sqlx::query_as::<_, DbSession>(&format!(
            r#"
        INSERT INTO sessions (token, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING {SESSION_COLUMNS}
        "#
        ))
        .bind(token)
        .bind(user_id)
        .bind(now + ttl)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    async fn find_session(
        &self,
        pool: &SqlitePool,
        token: &str,
    ) -> Result<Option<DbSession>, ImagegenError> {
        let row = sqlx::query_as::<_, DbSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(pool)
        .await?;

        // Timestamps are compared here rather than in SQL: the stored text is not guaranteed to
        // sort lexically.
        Ok(row.filter(|s| !s.is_expired_at(Utc::now())))
    }
}

/// Spawn the database actor and return a cloneable handle.
///
/// Profile mutations are published on `feed` after they commit.
pub async fn spawn(database_url: &str, feed: ChangeFeed) -> Result<DbActorHandle, ImagegenError> {
    let (actor, _jh) = ractor::Actor::spawn(
        None,
        DbActor,
        (database_url.to_string(), feed),
    )
    .await
    .map_err(|e| ImagegenError::Ractor(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), ImagegenError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
