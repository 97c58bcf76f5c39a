//! Book repository: the user's library across the local store, the bucket
//! and the metadata documents.

use crate::auth::CurrentUser;
use crate::config::BookFormat;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::formats::get_extractor;
use crate::library::book::remote_key;
use crate::library::{Book, ReadingProgress, RemoteBook};
use crate::storage::{DocumentStore, TransferHandle, TransferManager, TransferProgress};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Document collection holding the books of one user.
fn books_collection(user_id: &str) -> String {
    format!("books/{}", user_id)
}

/// Orchestrates the local store, object storage and content extraction.
#[derive(Clone)]
pub struct BookRepository {
    db: Database,
    transfers: Arc<TransferManager>,
    documents: DocumentStore,
    current: CurrentUser,
    downloads_dir: PathBuf,
    temp_dir: PathBuf,
}

impl BookRepository {
    /// Create a repository. Downloads land in `downloads_dir`; uploads are
    /// staged in `temp_dir`.
    pub fn new(
        db: Database,
        transfers: Arc<TransferManager>,
        documents: DocumentStore,
        current: CurrentUser,
        downloads_dir: PathBuf,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            transfers,
            documents,
            current,
            downloads_dir,
            temp_dir,
        }
    }

    /// All books of the signed-in user, ordered by title.
    pub async fn load_all_books(&self) -> Result<Vec<Book>> {
        let user_id = self.current.require_id()?;
        self.db
            .get_user_books(&user_id)?
            .into_iter()
            .map(Book::from_stored)
            .collect()
    }

    /// A single book of the signed-in user.
    pub async fn load_book_by_id(&self, book_id: &str) -> Result<Book> {
        let user_id = self.current.require_id()?;
        match self.db.get_book(book_id)? {
            Some(stored) if stored.user_id == user_id => Book::from_stored(stored),
            _ => Err(AppError::NotFound("Failed to load book".to_string())),
        }
    }

    /// Download the book file and record where it was saved.
    pub async fn download_book(&self, book: &Book) -> Result<Book> {
        let user_id = self.current.require_id()?;

        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let dest = std::path::absolute(
            self.downloads_dir
                .join(format!("{}.{}", book.id, book.format.storage_extension())),
        )?;

        let key = remote_key(&user_id, &book.id, book.format);
        tracing::info!(book_id = %book.id, %key, "Downloading book");
        self.transfers.download(key, dest.clone()).wait().await?;

        let updated = Book {
            local_path: Some(dest.to_string_lossy().into_owned()),
            ..book.clone()
        };
        self.db.save_book(&updated.to_stored())?;

        tracing::info!(book_id = %book.id, path = %dest.display(), "Book downloaded");
        Ok(updated)
    }

    /// Upload a book file and add it to the library.
    pub async fn upload_book(&self, file: &Path, title: &str, author: &str) -> Result<Book> {
        self.start_upload(file, title, author).await?.finish().await
    }

    /// Start uploading a book file. The returned [`PendingUpload`] exposes
    /// transfer progress and completes the upload when finished.
    pub async fn start_upload(&self, file: &Path, title: &str, author: &str) -> Result<PendingUpload> {
        let user_id = self.current.require_id()?;

        let format = BookFormat::mime_for_path(file)
            .and_then(BookFormat::from_mime)
            .ok_or_else(|| {
                AppError::InvalidFormat(format!("Unsupported file type: {}", file.display()))
            })?;

        let id = uuid::Uuid::new_v4().to_string();
        let title = match title.trim() {
            "" => file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.clone()),
            t => t.to_string(),
        };

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let staged = self
            .temp_dir
            .join(format!("{}.{}", id, format.storage_extension()));
        if let Err(e) = tokio::fs::copy(file, &staged).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }

        let key = remote_key(&user_id, &id, format);
        tracing::info!(book_id = %id, %key, "Uploading book");
        let handle = self.transfers.upload(key.clone(), staged.clone());

        let book = Book {
            id,
            title,
            author: author.trim().to_string(),
            file_url: self.transfers.store().public_url(&key),
            local_path: None,
            format,
            user_id,
            poster_image_url: None,
        };

        Ok(PendingUpload {
            repo: self.clone(),
            handle,
            book,
            staged,
        })
    }

    /// Remove a book from the library. The local file is deleted if present;
    /// the bucket object is kept.
    pub async fn delete_book(&self, book: &Book) -> Result<()> {
        let user_id = self.current.require_id()?;
        if book.user_id != user_id {
            return Err(AppError::NotFound("Failed to load book".to_string()));
        }

        if let Some(path) = book.local_file() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(book_id = %book.id, path = %path.display(), error = %e, "Failed to delete local file")
                }
            }
        }

        self.db.delete_book(&book.id, &user_id)?;
        self.db.delete_progress(&book.id, &user_id)?;

        tracing::info!(book_id = %book.id, "Deleted book");
        Ok(())
    }

    /// Books whose title or author contains `query`, ignoring case in any script.
    pub async fn search_book(&self, query: &str) -> Result<Vec<Book>> {
        let user_id = self.current.require_id()?;
        self.db
            .search_books(&user_id, query)?
            .into_iter()
            .map(Book::from_stored)
            .collect()
    }

    /// Readable text of a downloaded book.
    pub async fn get_book_content(&self, book: &Book) -> Result<String> {
        let path = book
            .local_file()
            .ok_or_else(|| AppError::NotFound("Book is not downloaded locally".to_string()))?
            .to_path_buf();

        if !tokio::fs::try_exists(&path).await? {
            return Err(AppError::NotFound("Local book file not found".to_string()));
        }

        let format = book.format;
        let text =
            tokio::task::spawn_blocking(move || get_extractor(format).extract_text(&path)).await??;

        tracing::debug!(book_id = %book.id, chars = text.len(), "Extracted book content");
        Ok(text)
    }

    /// Store the reading position, replacing any previous one.
    pub async fn save_reading_progress(&self, progress: &ReadingProgress) -> Result<()> {
        let user_id = self.current.require_id()?;

        if !(0.0..=1.0).contains(&progress.progress) {
            return Err(AppError::InvalidFormat(format!(
                "Progress must be between 0 and 1, got {}",
                progress.progress
            )));
        }

        self.db.save_progress(&progress.to_stored(&user_id))
    }

    /// Reading position of a book; zero if never saved.
    pub async fn get_reading_progress(&self, book_id: &str) -> Result<ReadingProgress> {
        let user_id = self.current.require_id()?;
        Ok(self
            .db
            .get_progress(book_id, &user_id)?
            .map(ReadingProgress::from_stored)
            .unwrap_or_else(|| ReadingProgress::new(book_id)))
    }

    /// Add books uploaded from other devices to the local store. Returns the
    /// number of books added.
    pub async fn sync_remote_books(&self) -> Result<usize> {
        let user_id = self.current.require_id()?;
        let docs: Vec<RemoteBook> = self.documents.list(&books_collection(&user_id)).await?;

        let mut added = 0;
        for doc in docs.into_iter().filter(|d| d.user_id == user_id) {
            let book = doc.into_book();
            if self.db.insert_book_if_absent(&book.to_stored())? {
                tracing::debug!(book_id = %book.id, "Added remote book");
                added += 1;
            }
        }

        tracing::info!(user_id = %user_id, added, "Synced remote books");
        Ok(added)
    }
}

/// An upload in flight, created by [`BookRepository::start_upload`].
pub struct PendingUpload {
    repo: BookRepository,
    handle: TransferHandle,
    book: Book,
    staged: PathBuf,
}

impl PendingUpload {
    /// Byte counts of the transfer.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.handle.progress()
    }

    /// Stop the transfer. [`PendingUpload::finish`] then returns an error.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Wait for the transfer and record the book. The staged copy is removed
    /// whatever the outcome.
    pub async fn finish(self) -> Result<Book> {
        let outcome = self.handle.wait().await;

        match tokio::fs::remove_file(&self.staged).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.staged.display(), error = %e, "Failed to remove staged upload")
            }
        }
        outcome?;

        let book = self.book;
        self.repo.db.save_book(&book.to_stored())?;
        self.repo
            .documents
            .set(
                &books_collection(&book.user_id),
                &book.id,
                &RemoteBook::from_book(&book),
            )
            .await?;

        tracing::info!(book_id = %book.id, title = %book.title, "Book uploaded");
        Ok(book)
    }
}
