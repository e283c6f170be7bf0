//! Object storage for generated images and uploaded avatars.
//!
//! Objects live in named buckets under keys of the form `<user_id>/<unix_millis>.<ext>`.
//! Every stored object is publicly readable under [`PUBLIC_PREFIX`].

mod fs;
mod key;

pub use fs::FsObjectStore;
pub use key::{ObjectKey, content_type_for_extension, extension_for_content_type};

use crate::error::StorageError;
use async_trait::async_trait;
use url::Url;

/// URL path under which objects are served: `/<PUBLIC_PREFIX>/<bucket>/<key>`.
pub const PUBLIC_PREFIX: &str = "storage/v1/object/public";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with [`StorageError::AlreadyExists`] if the key is taken.
    CreateOnly,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &ObjectKey,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError>;

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<StoredObject, StorageError>;

    async fn delete(&self, bucket: &str, key: &ObjectKey) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> Url;
}
