//! Object storage: file bytes in a bucket, addressed by key.

pub mod documents;
mod http;
mod local;
pub mod transfer;

pub use documents::DocumentStore;
pub use http::HttpObjectStore;
pub use local::LocalObjectStore;
pub use transfer::{TransferHandle, TransferManager, TransferProgress, TransferState};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Channel on which a backend reports bytes moved.
pub type ProgressSender = watch::Sender<TransferProgress>;

/// A bucket of objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file to `key`.
    async fn put_file(&self, key: &str, source: &Path, progress: &ProgressSender) -> Result<()>;

    /// Download `key` into `dest`. The file only appears at `dest` once complete.
    async fn get_file(&self, key: &str, dest: &Path, progress: &ProgressSender) -> Result<()>;

    /// Store a small object from memory.
    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch a small object into memory. `None` if it does not exist.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// URL at which the object is published.
    fn public_url(&self, key: &str) -> String;
}

/// Build the configured backend.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(&config.root)?)),
        StorageBackend::Http => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("storage.endpoint is required for the http backend".into())
            })?;
            let mut store = HttpObjectStore::new(endpoint, &config.bucket)?;
            if let Some(token) = &config.access_token {
                store = store.with_access_token(token);
            }
            Ok(Arc::new(store))
        }
    }
}

/// Staging path used while a download is in flight.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Reject keys that are empty or could escape the bucket.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err(AppError::InvalidFormat(format!("Invalid object key: {}", key)));
    }
    Ok(())
}
