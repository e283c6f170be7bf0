use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Object storage configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket.
    /// TOML: `storage.root`. Default: `./storage`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Externally reachable base URL used to build public object URLs.
    /// TOML: `storage.public_base_url`. Default: `http://127.0.0.1:8188`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: Url,

    /// TOML: `storage.images_bucket`. Default: `generated-images`.
    #[serde(default = "default_images_bucket")]
    pub images_bucket: String,

    /// TOML: `storage.avatars_bucket`. Default: `avatars`.
    #[serde(default = "default_avatars_bucket")]
    pub avatars_bucket: String,

    /// Upper bound for uploaded avatar bodies, in bytes.
    /// TOML: `storage.max_avatar_bytes`. Default: 5 MiB.
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_base_url: default_public_base_url(),
            images_bucket: default_images_bucket(),
            avatars_bucket: default_avatars_bucket(),
            max_avatar_bytes: default_max_avatar_bytes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_public_base_url() -> Url {
    Url::parse("http://127.0.0.1:8188").expect("default public base url is valid")
}

fn default_images_bucket() -> String {
    "generated-images".to_string()
}

fn default_avatars_bucket() -> String {
    "avatars".to_string()
}

fn default_max_avatar_bytes() -> usize {
    5 * 1024 * 1024
}
