use crate::db::{DbActorHandle, GenerationCommit};
use crate::error::{ImagegenError, StorageError};
use crate::provider::{GeneratedImage, ImageProvider};
use crate::storage::{ObjectKey, ObjectStore, WriteMode};
use chrono::{TimeDelta, Utc};
use imagegen_schema::{GenerateRequest, GenerateResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keys are millisecond timestamps; a taken key moves on to the next millisecond this many times.
const KEY_COLLISION_ATTEMPTS: i64 = 16;

/// Credit-gated generation: validate, call the provider, store the image, bill and record it.
#[derive(Clone)]
pub struct GenerationService {
    db: DbActorHandle,
    provider: Arc<dyn ImageProvider>,
    store: Arc<dyn ObjectStore>,
    bucket: Arc<str>,
}

impl GenerationService {
    pub fn new(
        db: DbActorHandle,
        provider: Arc<dyn ImageProvider>,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            db,
            provider,
            store,
            bucket: bucket.into(),
        }
    }

    /// Rejections happen in a fixed order and all of them before the provider is called:
    /// blank prompt (400), unknown profile (404), empty balance (402).
    ///
    /// The remaining chain runs detached, so a caller that goes away does not abort a
    /// provider call or storage write that is already in flight.
    pub async fn generate(
        &self,
        user_id: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ImagegenError> {
        let prompt = request
            .normalized_prompt()
            .ok_or_else(|| ImagegenError::BadRequest("Prompt is required".to_string()))?
            .to_string();

        let profile = self
            .db
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ImagegenError::NotFound("Profile not found".to_string()))?;

        if profile.credits < 1 {
            return Err(ImagegenError::InsufficientCredits);
        }

        info!(user_id = %user_id, credits = profile.credits, "Generating image");

        let this = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move { this.run(user_id, prompt).await })
            .await
            .map_err(|e| ImagegenError::Internal(format!("generation task failed: {e}")))?
    }

    async fn run(&self, user_id: String, prompt: String) -> Result<GenerateResponse, ImagegenError> {
        let image = self.provider.generate(&prompt).await?;

        let key = self.store_image(&user_id, &image).await?;
        let public_url = self.store.public_url(&self.bucket, &key);

        let commit = GenerationCommit {
            user_id: user_id.clone(),
            prompt,
            image_data: public_url.to_string(),
            storage_key: key.to_string(),
        };

        match self.db.commit_generation(commit).await {
            Ok(Some(committed)) => {
                info!(
                    user_id = %user_id,
                    image_id = committed.image.id,
                    remaining_credits = committed.remaining_credits,
                    "Image generation committed"
                );
                Ok(GenerateResponse {
                    image: committed.image.into(),
                    remaining_credits: committed.remaining_credits,
                })
            }
            Ok(None) => {
                warn!(user_id = %user_id, "Balance exhausted while generating; discarding image");
                self.discard(&key).await;
                Err(ImagegenError::InsufficientCredits)
            }
            Err(e) => {
                self.discard(&key).await;
                Err(ImagegenError::Persistence {
                    message: "Failed to save image metadata",
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Create-only write under `<user_id>/<millis>.<ext>`. Concurrent generations of one user
    /// can land in the same millisecond, so a taken key is retried with the following one.
    async fn store_image(
        &self,
        user_id: &str,
        image: &GeneratedImage,
    ) -> Result<ObjectKey, ImagegenError> {
        let now = Utc::now();
        let mut offset = 0;
        loop {
            let at = now + TimeDelta::milliseconds(offset);
            let key = ObjectKey::timestamped(user_id, at, &image.content_type)?;
            match self
                .store
                .put(&self.bucket, &key, &image.bytes, WriteMode::CreateOnly)
                .await
            {
                Ok(()) => return Ok(key),
                Err(StorageError::AlreadyExists(_)) if offset + 1 < KEY_COLLISION_ATTEMPTS => {
                    debug!(key = %key, "Object key taken; trying the next millisecond");
                    offset += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best effort; a leftover object is only logged.
    async fn discard(&self, key: &ObjectKey) {
        if let Err(e) = self.store.delete(&self.bucket, key).await {
            warn!(key = %key, error = %e, "Failed to delete orphaned image object");
        }
    }
}
