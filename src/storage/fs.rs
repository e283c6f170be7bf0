use super::{ObjectKey, ObjectStore, PUBLIC_PREFIX, StoredObject, WriteMode};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

/// Filesystem-backed store: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: Url,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Url) -> Result<Self, StorageError> {
        if public_base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidKey(public_base_url.to_string()));
        }
        Ok(Self {
            root: root.into(),
            public_base_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &ObjectKey) -> Result<PathBuf, StorageError> {
        // Buckets are single segments.
        let bucket_key = ObjectKey::parse(bucket)?;
        if bucket_key.segments().count() != 1 {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        let mut path = self.root.join(bucket);
        path.extend(key.segments());
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &ObjectKey,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        match mode {
            WriteMode::CreateOnly => {
                let mut file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                    .map_err(|e| match e.kind() {
                        ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
                        _ => write_err(e),
                    })?;
                file.write_all(bytes).await.map_err(write_err)?;
                file.flush().await.map_err(write_err)?;
            }
            WriteMode::Overwrite => {
                // Write aside and rename so readers never observe a partial object.
                let tmp = path.with_extension(format!(
                    "{}.tmp",
                    crate::auth::generate_request_id()
                ));
                tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
                if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(write_err(e));
                }
            }
        }

        debug!(bucket, key = %key, size = bytes.len(), ?mode, "Object stored");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<StoredObject, StorageError> {
        let path = self.object_path(bucket, key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Read {
                key: key.to_string(),
                source: e,
            },
        })?;
        Ok(StoredObject {
            bytes,
            content_type: key.content_type().to_string(),
        })
    }

    async fn delete(&self, bucket: &str, key: &ObjectKey) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::Delete {
                    key: key.to_string(),
                    source: e,
                },
            })
    }

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> Url {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(PUBLIC_PREFIX.split('/'))
                .push(bucket)
                .extend(key.segments());
        }
        url
    }
}
