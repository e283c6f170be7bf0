use serde::{Deserialize, Serialize};
use url::Url;

/// Upstream image provider configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Chat-completions endpoint accepting image modalities. Job status is polled at
    /// `<api_url>/<job id>`.
    /// TOML: `provider.api_url`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Bearer key sent upstream. Empty fails generation requests after the credit check.
    /// TOML: `provider.api_key`.
    #[serde(default)]
    pub api_key: String,

    /// TOML: `provider.model`. Default: `google/gemini-2.5-flash-image-preview`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `provider.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for the reqwest client; disabled forces HTTP/1.
    /// TOML: `provider.enable_multiplexing`. Default: `false`.
    #[serde(default)]
    pub enable_multiplexing: bool,

    /// Overall upstream request timeout, in seconds.
    /// TOML: `provider.request_timeout_secs`. Default: `600`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between job status polls, in milliseconds.
    /// TOML: `provider.job_poll_interval_ms`. Default: `1000`.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,

    /// Maximum number of job status polls before giving up.
    /// TOML: `provider.job_poll_max_times`. Default: `120`.
    #[serde(default = "default_job_poll_max_times")]
    pub job_poll_max_times: usize,

    /// Largest generated image accepted, inline or downloaded, in bytes.
    /// TOML: `provider.max_image_bytes`. Default: `20971520` (20 MiB).
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            proxy: None,
            enable_multiplexing: false,
            request_timeout_secs: default_request_timeout_secs(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
            job_poll_max_times: default_job_poll_max_times(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://ai.gateway.lovable.dev/v1/chat/completions")
        .expect("default provider url is valid")
}

fn default_model() -> String {
    "google/gemini-2.5-flash-image-preview".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10 * 60
}

fn default_job_poll_interval_ms() -> u64 {
    1000
}

fn default_job_poll_max_times() -> usize {
    120
}

fn default_max_image_bytes() -> usize {
    20 * 1024 * 1024
}
