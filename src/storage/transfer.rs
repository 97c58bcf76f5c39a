//! Upload/download tasks with an awaitable outcome.
//!
//! Each transfer runs on its own task and publishes its state and byte
//! counts on watch channels. [`TransferHandle::wait`] resolves on the first
//! terminal state. [`TransferHandle::cancel`] stops the task; the state then
//! becomes [`TransferState::Canceled`]. A partial file is removed on any
//! outcome other than completion, both for downloads and in the bucket.
//! Dropping the handle detaches the transfer without cancelling it.

use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, partial_path};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Bytes moved so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    /// Bytes transferred.
    pub bytes_current: u64,
    /// Expected size, 0 when unknown.
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Create a progress value.
    pub fn new(bytes_current: u64, bytes_total: u64) -> Self {
        Self {
            bytes_current,
            bytes_total,
        }
    }

    /// Completed fraction in `[0.0, 1.0]`; 0.0 when the size is unknown.
    pub fn fraction(&self) -> f32 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (self.bytes_current as f64 / self.bytes_total as f64).clamp(0.0, 1.0) as f32
        }
    }
}

/// Lifecycle of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed(String),
    /// Stopped by [`TransferHandle::cancel`].
    Canceled,
}

impl TransferState {
    /// Whether the transfer has finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferState::InProgress)
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Local file to bucket.
    Upload,
    /// Bucket to local file.
    Download,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Upload => f.write_str("Upload"),
            TransferKind::Download => f.write_str("Download"),
        }
    }
}

/// Starts transfers against one object store.
pub struct TransferManager {
    store: Arc<dyn ObjectStore>,
    next_id: AtomicU64,
}

impl TransferManager {
    /// Create a manager for `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(1),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Start uploading `source` to `key`.
    pub fn upload(&self, key: impl Into<String>, source: PathBuf) -> TransferHandle {
        self.spawn(TransferKind::Upload, key.into(), source)
    }

    /// Start downloading `key` to `dest`.
    pub fn download(&self, key: impl Into<String>, dest: PathBuf) -> TransferHandle {
        self.spawn(TransferKind::Download, key.into(), dest)
    }

    fn spawn(&self, kind: TransferKind, key: String, path: PathBuf) -> TransferHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (state_tx, state_rx) = watch::channel(TransferState::InProgress);
        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        let cancel = CancellationToken::new();

        let store = Arc::clone(&self.store);
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            tracing::debug!(id, %kind, %key, path = %path.display(), "Transfer started");

            let run = async {
                match kind {
                    TransferKind::Upload => store.put_file(&key, &path, &progress_tx).await,
                    TransferKind::Download => store.get_file(&key, &path, &progress_tx).await,
                }
            };

            let outcome = tokio::select! {
                _ = task_cancel.cancelled() => TransferState::Canceled,
                result = run => match result {
                    Ok(()) => TransferState::Completed,
                    Err(e) => TransferState::Failed(e.to_string()),
                },
            };

            if kind == TransferKind::Download && outcome != TransferState::Completed {
                let _ = tokio::fs::remove_file(partial_path(&path)).await;
            }

            match &outcome {
                TransferState::Completed => {
                    tracing::debug!(id, %kind, %key, "Transfer completed")
                }
                TransferState::Failed(error) => {
                    tracing::warn!(id, %kind, %key, %error, "Transfer failed")
                }
                _ => tracing::info!(id, %kind, %key, "Transfer canceled"),
            }

            state_tx.send_replace(outcome);
        });

        TransferHandle {
            kind,
            state: state_rx,
            progress: progress_rx,
            cancel,
        }
    }
}

/// Handle to a running transfer.
#[derive(Debug)]
pub struct TransferHandle {
    kind: TransferKind,
    state: watch::Receiver<TransferState>,
    progress: watch::Receiver<TransferProgress>,
    cancel: CancellationToken,
}

impl TransferHandle {
    /// Current state.
    pub fn state(&self) -> TransferState {
        self.state.borrow().clone()
    }

    /// Subscribe to byte-count updates.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress.clone()
    }

    /// Request cancellation. No effect once the transfer has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the first terminal state.
    pub async fn wait(mut self) -> Result<()> {
        let kind = self.kind;
        let state = self
            .state
            .wait_for(TransferState::is_terminal)
            .await
            .map_err(|_| AppError::Transfer(format!("{} task stopped unexpectedly", kind)))?
            .clone();

        match state {
            TransferState::Completed => Ok(()),
            TransferState::Failed(error) => {
                Err(AppError::Transfer(format!("{} failed: {}", kind, error)))
            }
            TransferState::Canceled => Err(AppError::Transfer(format!("{} canceled", kind))),
            TransferState::InProgress => unreachable!("wait_for returns a terminal state"),
        }
    }
}
