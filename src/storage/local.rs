use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, ProgressSender, TransferProgress, partial_path, validate_key};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 64 * 1024;

/// A `.part` file that is deleted on drop unless committed. Dropping the
/// copy future mid-write also drops the guard.
struct Staging {
    path: PathBuf,
    committed: bool,
}

impl Staging {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    async fn commit(mut self, to: &Path) -> Result<()> {
        tokio::fs::rename(&self.path, to).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Bucket backed by a directory; each key is a relative file path.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Use `root` as the bucket, creating it if needed.
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Copy `from` to `to` through a `.part` file, reporting progress.
    async fn copy_with_progress(from: &Path, to: &Path, progress: &ProgressSender) -> Result<()> {
        let mut source = tokio::fs::File::open(from).await?;
        let total = source.metadata().await?.len();

        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = Staging::new(partial_path(to));
        let mut target = tokio::fs::File::create(&staging.path).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut copied = 0u64;

        progress.send_replace(TransferProgress::new(0, total));
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            target.write_all(&buf[..n]).await?;
            copied += n as u64;
            progress.send_replace(TransferProgress::new(copied, total));
        }
        target.flush().await?;
        drop(target);

        staging.commit(to).await
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_file(&self, key: &str, source: &Path, progress: &ProgressSender) -> Result<()> {
        let dest = self.object_path(key)?;
        Self::copy_with_progress(source, &dest, progress).await?;
        tracing::debug!(key, "Stored object");
        Ok(())
    }

    async fn get_file(&self, key: &str, dest: &Path, progress: &ProgressSender) -> Result<()> {
        let object = self.object_path(key)?;
        if !tokio::fs::try_exists(&object).await? {
            return Err(AppError::NotFound(format!("Object not found: {}", key)));
        }
        Self::copy_with_progress(&object, dest, progress).await
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let dest = self.object_path(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = Staging::new(partial_path(&dest));
        tokio::fs::write(&staging.path, bytes).await?;
        staging.commit(&dest).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object = self.object_path(key)?;
        match tokio::fs::read(&object).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || {
            let mut keys: Vec<String> = WalkDir::new(&root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    let relative = e.path().strip_prefix(&root).ok()?;
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    Some(key)
                })
                .filter(|key| key.starts_with(&prefix) && !key.ends_with(".part"))
                .collect();
            keys.sort();
            keys
        })
        .await
        .map_err(AppError::from)
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}/{}", self.root.display(), key)
    }
}
