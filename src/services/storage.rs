#![allow(clippy::result_large_err)]

//! Object storage for uploaded documents.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use url::Url;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `bucket/path` and return its public URL.
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, AppError>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), AppError>;
}

/// Upload path for a file: `{unix millis}_{sanitized name}`.
pub fn object_path(file_name: &str) -> String {
    format!("{}_{}", chrono::Utc::now().timestamp_millis(), sanitize_file_name(file_name))
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() || value.contains("..") || value.contains('/') || value.contains('\\') {
        return Err(AppError::storage(format!("invalid {} '{}'", kind, value)));
    }
    Ok(())
}

/// Objects kept as files under `root/bucket/path`, addressed by `file://` URLs.
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_file(&self, bucket: &str, path: &str) -> Result<PathBuf, AppError> {
        validate_segment("bucket", bucket)?;
        validate_segment("object path", path)?;
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, AppError> {
        let target = self.object_file(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await.map_err(|err| {
            AppError::with_source(
                ErrorCategory::StorageError,
                format!("failed to write object {}/{}", bucket, path),
                Box::new(err),
            )
        })?;

        let absolute = tokio::fs::canonicalize(&target).await?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            AppError::storage(format!("cannot build a URL for {}", absolute.display()))
        })?;
        tracing::debug!(%url, size = bytes.len(), "object stored");
        Ok(url.to_string())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), AppError> {
        let target = self.object_file(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AppError::storage(
                format!("object {}/{} does not exist", bucket, path),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local object storage, addressed by `memory://bucket/path` URLs.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String, AppError> {
        validate_segment("bucket", bucket)?;
        validate_segment("object path", path)?;
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), path.to_string()), bytes.to_vec());
        Ok(format!("memory://{}/{}", bucket, path))
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), AppError> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::storage(format!("object {}/{} does not exist", bucket, path)))
    }
}
