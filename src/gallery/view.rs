use super::{GalleryBackend, apply_optimistic};
use crate::error::GalleryError;
use base64::Engine as _;
use imagegen_schema::{GenerateRequest, ImageRecord, Profile, ProfileChange};
use tracing::debug;

pub struct GalleryView<B> {
    backend: B,
    profile: Option<Profile>,
    total_images: i64,
    images: Vec<ImageRecord>,
    generating: bool,
}

impl<B: GalleryBackend> GalleryView<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            profile: None,
            total_images: 0,
            images: Vec::new(),
            generating: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn credits(&self) -> Option<i64> {
        self.profile.as_ref().map(|p| p.credits)
    }

    /// Image count as last reported by the server.
    pub fn total_images(&self) -> i64 {
        self.total_images
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Fetch the profile and the image list. Replaces any local state.
    pub async fn load(&mut self) -> Result<(), GalleryError> {
        let stats = self.backend.fetch_profile().await?;
        let images = self.backend.list_images().await?;

        self.total_images = stats.total_images;
        self.profile = Some(stats.profile);
        self.images = images;
        Ok(())
    }

    pub async fn toggle_like(&mut self, image_id: i64) -> Result<(), GalleryError> {
        let idx = self.image_index(image_id)?;
        let next = !self.images[idx].liked;

        let updated = apply_optimistic(
            &mut self.images,
            |images| images[idx].liked = next,
            self.backend.set_liked(image_id, next),
        )
        .await?;

        if let Some(slot) = self.images.iter_mut().find(|i| i.id == updated.id) {
            *slot = updated;
        }
        Ok(())
    }

    pub async fn delete_image(&mut self, image_id: i64) -> Result<(), GalleryError> {
        self.image_index(image_id)?;

        apply_optimistic(
            &mut self.images,
            |images| images.retain(|i| i.id != image_id),
            self.backend.delete_image(image_id),
        )
        .await?;

        self.total_images = (self.total_images - 1).max(0);
        Ok(())
    }

    pub async fn select_avatar(&mut self, avatar_url: &str) -> Result<(), GalleryError> {
        if self.profile.is_none() {
            return Err(GalleryError::Missing("profile"));
        }

        let preview = avatar_url.to_string();
        let saved = apply_optimistic(
            &mut self.profile,
            |profile| set_avatar_url(profile, preview),
            self.backend.set_avatar(avatar_url),
        )
        .await?;

        self.profile = Some(saved);
        Ok(())
    }

    /// Shows the uploaded bytes inline until the server returns the stored URL.
    pub async fn upload_avatar(
        &mut self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GalleryError> {
        if self.profile.is_none() {
            return Err(GalleryError::Missing("profile"));
        }
        if !content_type.starts_with("image/") {
            return Err(GalleryError::Invalid("Avatar must be an image".to_string()));
        }

        let preview = format!(
            "data:{content_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        let saved = apply_optimistic(
            &mut self.profile,
            |profile| set_avatar_url(profile, preview),
            self.backend.upload_avatar(bytes, content_type),
        )
        .await?;

        self.profile = Some(saved);
        Ok(())
    }

    /// Not optimistic: the record only exists once the server has stored it.
    pub async fn generate(&mut self, prompt: &str) -> Result<ImageRecord, GalleryError> {
        let request = GenerateRequest::new(prompt);
        let Some(prompt) = request.normalized_prompt() else {
            return Err(GalleryError::Invalid("Prompt is required".to_string()));
        };

        self.generating = true;
        let res = self.backend.generate(prompt).await;
        self.generating = false;
        let resp = res?;

        self.images.insert(0, resp.image.clone());
        self.total_images += 1;
        if let Some(profile) = self.profile.as_mut() {
            profile.credits = resp.remaining_credits;
        }
        Ok(resp.image)
    }

    /// Merge a pushed change. Returns `false` when it is for another user or nothing is loaded.
    pub fn apply_profile_change(&mut self, change: &ProfileChange) -> bool {
        let Some(profile) = self.profile.as_mut() else {
            return false;
        };
        if profile.id != change.user_id {
            debug!(user_id = %change.user_id, "Ignoring change for another profile");
            return false;
        }

        profile.display_name.clone_from(&change.display_name);
        profile.avatar_url.clone_from(&change.avatar_url);
        profile.credits = change.credits;
        true
    }

    fn image_index(&self, image_id: i64) -> Result<usize, GalleryError> {
        self.images
            .iter()
            .position(|i| i.id == image_id)
            .ok_or(GalleryError::Missing("image"))
    }
}

fn set_avatar_url(profile: &mut Option<Profile>, url: String) {
    if let Some(profile) = profile.as_mut() {
        profile.avatar_url = Some(url);
    }
}
