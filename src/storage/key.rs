use crate::error::StorageError;
use chrono::{DateTime, Utc};
use std::fmt;

/// A validated, relative object key. Never contains empty, `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let valid = !raw.is_empty()
            && !raw.starts_with('/')
            && !raw.contains(['\\', '\0'])
            && raw
                .split('/')
                .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StorageError::InvalidKey(raw.to_string()))
        }
    }

    /// `<owner>/<unix_millis>.<ext>`, with the extension derived from `content_type`.
    pub fn timestamped(
        owner: &str,
        at: DateTime<Utc>,
        content_type: &str,
    ) -> Result<Self, StorageError> {
        if owner.contains('/') {
            return Err(StorageError::InvalidKey(owner.to_string()));
        }
        let ext = extension_for_content_type(content_type);
        Self::parse(&format!("{owner}/{}.{ext}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn extension(&self) -> Option<&str> {
        let file = self.0.rsplit('/').next()?;
        file.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn content_type(&self) -> &'static str {
        self.extension()
            .map_or("application/octet-stream", content_type_for_extension)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/webp" => "webp",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "webp" => "image/webp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
