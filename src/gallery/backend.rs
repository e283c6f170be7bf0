use crate::error::GalleryError;
use async_trait::async_trait;
use imagegen_schema::{GenerateResponse, ImageRecord, Profile, ProfileWithStats};

/// The server surface the gallery talks to, scoped to the signed-in user.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    async fn fetch_profile(&self) -> Result<ProfileWithStats, GalleryError>;

    /// Newest first.
    async fn list_images(&self) -> Result<Vec<ImageRecord>, GalleryError>;

    async fn set_liked(&self, image_id: i64, liked: bool) -> Result<ImageRecord, GalleryError>;

    async fn delete_image(&self, image_id: i64) -> Result<(), GalleryError>;

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, GalleryError>;

    async fn set_avatar(&self, avatar_url: &str) -> Result<Profile, GalleryError>;

    async fn upload_avatar(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Profile, GalleryError>;
}
