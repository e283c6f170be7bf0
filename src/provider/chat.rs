use super::{GeneratedImage, ImageProvider, UPSTREAM_BODY_PREVIEW_CHARS, decode_data_url};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::utils::logging::with_pretty_json_debug;
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use imagegen_schema::{ChatImageRequest, ChatImageResponse, ProviderJob, ProviderJobStatus};
use reqwest::header::{CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const IMAGEGEN_USER_AGENT: &str = concat!("imagegen/", env!("CARGO_PKG_VERSION"));

/// Chat-completions style provider (`modalities: ["image", "text"]`).
///
/// Accepts three answer shapes:
/// - an inline `data:` URL in `choices[0].message.images[0].image_url.url`
/// - an `http(s)` URL in the same place, downloaded without the API key
/// - a job handle (`id` + `status`), polled at `<api_url>/<id>` until it yields an `output` URL
pub struct ChatImageProvider {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    model: String,
    poll_policy: ConstantBuilder,
    poll_max_times: usize,
    max_image_bytes: usize,
}

enum JobPoll {
    Pending,
    Failed(ProviderError),
}

impl ChatImageProvider {
    pub fn new(cfg: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = build_client(cfg)?;
        let poll_max_times = cfg.job_poll_max_times.max(1);
        let poll_policy = ConstantBuilder::default()
            .with_delay(Duration::from_millis(cfg.job_poll_interval_ms))
            .with_max_times(poll_max_times);

        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            poll_policy,
            poll_max_times,
            max_image_bytes: cfg.max_image_bytes,
        })
    }

    pub(crate) fn build_generate_request(
        &self,
        prompt: &str,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let body = ChatImageRequest::from_prompt(self.model.as_str(), prompt);
        self.client
            .post(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .build()
    }

    fn job_url(&self, job_id: &str) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(job_id);
        }
        url
    }

    async fn resolve_image_url(&self, image_url: &str) -> Result<GeneratedImage, ProviderError> {
        if image_url.starts_with("data:") {
            let image = decode_data_url(image_url)?;
            if image.bytes.len() > self.max_image_bytes {
                return Err(ProviderError::ImageTooLarge {
                    limit: self.max_image_bytes,
                });
            }
            return Ok(image);
        }

        let url = Url::parse(image_url)
            .map_err(|e| ProviderError::Payload(format!("invalid image url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::Payload(format!(
                "unsupported image url scheme: {}",
                url.scheme()
            )));
        }
        self.download(url).await
    }

    async fn download(&self, url: Url) -> Result<GeneratedImage, ProviderError> {
        debug!(url = %url, "Downloading generated image");
        let resp = self.client.get(url).send().await?;
        let mut resp = ensure_success(resp).await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());

        let limit = self.max_image_bytes;
        if resp.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ProviderError::ImageTooLarge { limit });
        }
        // Content-Length may be absent or wrong; count what actually arrives.
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(ProviderError::ImageTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ProviderError::NoImage);
        }
        Ok(GeneratedImage {
            bytes,
            content_type,
        })
    }

    async fn fetch_job(&self, job_id: &str) -> Result<ProviderJob, ProviderError> {
        let resp = self
            .client
            .get(self.job_url(job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice::<ProviderJob>(&bytes)
            .map_err(|e| ProviderError::Payload(format!("job status: {e}")))
    }

    /// Poll until the job is terminal. Only the pending state is waited on; any failure ends
    /// the poll immediately.
    async fn wait_for_job(&self, job: ProviderJob) -> Result<String, ProviderError> {
        let job_id = job.id;
        info!(job.id = %job_id, status = ?job.status, "Provider accepted prompt as a job");

        let done = (|| async {
            let job = self.fetch_job(&job_id).await.map_err(JobPoll::Failed)?;
            if job.status.is_terminal() {
                Ok(job)
            } else {
                Err(JobPoll::Pending)
            }
        })
        .retry(&self.poll_policy)
        .when(|e: &JobPoll| matches!(e, JobPoll::Pending))
        .await;

        let job = match done {
            Ok(job) => job,
            Err(JobPoll::Failed(e)) => return Err(e),
            Err(JobPoll::Pending) => {
                return Err(ProviderError::JobTimedOut {
                    id: job_id,
                    attempts: self.poll_max_times,
                });
            }
        };

        match job.status {
            ProviderJobStatus::Succeeded => job.output.filter(|o| !o.is_empty()).ok_or_else(|| {
                ProviderError::Payload(format!("job {} succeeded without output", job.id))
            }),
            _ => Err(ProviderError::JobFailed {
                id: job.id,
                reason: job.error.unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }
}

#[async_trait]
impl ImageProvider for ChatImageProvider {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::ApiKeyMissing);
        }

        let start = Instant::now();
        let req = self.build_generate_request(prompt)?;
        let resp = self.client.execute(req).await?;
        let resp = ensure_success(resp).await?;

        let bytes = resp.bytes().await?;
        let answer: ChatImageResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Payload(format!("chat completion: {e}")))?;

        with_pretty_json_debug(&answer.extra, |pretty| {
            debug!(extra = %pretty, "Provider response extra fields");
        });

        let image = if let Some(url) = answer.first_image_url() {
            self.resolve_image_url(url).await?
        } else if let Some(job) = answer.pending_job() {
            let output = self.wait_for_job(job).await?;
            self.resolve_image_url(&output).await?
        } else {
            warn!(
                text = ?answer.choices.first().and_then(|c| c.message.content.as_deref()),
                "Provider answered without an image"
            );
            return Err(ProviderError::NoImage);
        };

        info!(
            model = %self.model,
            size = image.bytes.len(),
            content_type = %image.content_type,
            took_ms = start.elapsed().as_millis() as u64,
            "Image generated"
        );
        Ok(image)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = match resp.bytes().await {
        Ok(bytes) => {
            let raw_body = String::from_utf8_lossy(&bytes);
            format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
        }
        Err(e) => format!("<failed to read body: {e}>"),
    };
    warn!(%status, body = %body, "Provider upstream error");
    Err(ProviderError::UpstreamStatus { status, body })
}

fn build_client(cfg: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    let mut headers = HeaderMap::new();

    let mut builder = reqwest::Client::builder()
        .user_agent(IMAGEGEN_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(cfg.request_timeout_secs.max(1)));

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if cfg.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    Ok(builder.default_headers(headers).build()?)
}
