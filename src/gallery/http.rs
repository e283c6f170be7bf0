use super::GalleryBackend;
use crate::error::GalleryError;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, future};
use imagegen_schema::{
    AvatarSelection, ErrorBody, GenerateRequest, GenerateResponse, ImageRecord, LikeRequest,
    Profile, ProfileChange, ProfileWithStats,
};
use reqwest::{RequestBuilder, Response, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const PROFILE_EVENT: &str = "profile";

/// [`GalleryBackend`] over the service's HTTP API, authenticated with a session token.
#[derive(Clone)]
pub struct HttpGalleryBackend {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl HttpGalleryBackend {
    pub fn new(base_url: Url, access_token: impl Into<String>) -> Result<Self, GalleryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, base_url, access_token))
    }

    /// `base_url` may carry a path prefix (`http://host/api`). Endpoints resolve beneath it.
    pub fn with_client(
        client: reqwest::Client,
        mut base_url: Url,
        access_token: impl Into<String>,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            access_token: access_token.into(),
        }
    }

    /// `path` is relative, without a leading slash.
    fn endpoint(&self, path: &str) -> Result<Url, GalleryError> {
        Ok(self.base_url.join(path)?)
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, GalleryError> {
        Ok(self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.access_token))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, GalleryError> {
        Ok(self
            .client
            .post(self.endpoint(path)?)
            .bearer_auth(&self.access_token))
    }

    fn patch(&self, path: &str) -> Result<RequestBuilder, GalleryError> {
        Ok(self
            .client
            .patch(self.endpoint(path)?)
            .bearer_auth(&self.access_token))
    }

    /// Subscribe to pushed changes of the signed-in user's profile.
    ///
    /// The first item is the current snapshot. The stream ends when the server closes it.
    pub async fn profile_events(
        &self,
    ) -> Result<impl Stream<Item = Result<ProfileChange, GalleryError>> + Send + 'static, GalleryError>
    {
        let resp = ensure_success(self.get("profile/events")?.send().await?).await?;

        let events = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|item| {
                future::ready(match item {
                    Ok(event) if event.event == PROFILE_EVENT => Some(
                        serde_json::from_str::<ProfileChange>(&event.data)
                            .map_err(|e| GalleryError::Decode(e.to_string())),
                    ),
                    Ok(event) => {
                        debug!(event = %event.event, "Skipping unknown event");
                        None
                    }
                    Err(e) => Some(Err(GalleryError::Stream(e.to_string()))),
                })
            });
        Ok(events)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, GalleryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let bytes = resp.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
    warn!(%status, message = %message, "Gallery request failed");
    Err(GalleryError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, GalleryError> {
    let resp = ensure_success(req.send().await?).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GalleryError::Decode(e.to_string()))
}

#[async_trait]
impl GalleryBackend for HttpGalleryBackend {
    async fn fetch_profile(&self) -> Result<ProfileWithStats, GalleryError> {
        send_json(self.get("profile")?).await
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, GalleryError> {
        send_json(self.get("images")?).await
    }

    async fn set_liked(&self, image_id: i64, liked: bool) -> Result<ImageRecord, GalleryError> {
        send_json(
            self.patch(&format!("images/{image_id}"))?
                .json(&LikeRequest { liked }),
        )
        .await
    }

    async fn delete_image(&self, image_id: i64) -> Result<(), GalleryError> {
        let req = self
            .client
            .delete(self.endpoint(&format!("images/{image_id}"))?)
            .bearer_auth(&self.access_token);
        ensure_success(req.send().await?).await?;
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, GalleryError> {
        send_json(
            self.post("functions/v1/generate-image")?
                .json(&GenerateRequest::new(prompt)),
        )
        .await
    }

    async fn set_avatar(&self, avatar_url: &str) -> Result<Profile, GalleryError> {
        send_json(self.patch("profile")?.json(&AvatarSelection {
            avatar_url: avatar_url.to_string(),
        }))
        .await
    }

    async fn upload_avatar(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Profile, GalleryError> {
        send_json(
            self.post("profile/avatar")?
                .header(CONTENT_TYPE, content_type)
                .body(bytes),
        )
        .await
    }
}
