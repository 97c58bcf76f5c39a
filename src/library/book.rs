//! Book, reading progress and user models.

use crate::config::BookFormat;
use crate::db::{StoredBook, StoredProgress, UserAccount, now_timestamp};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A book in the user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier for the book.
    pub id: String,

    /// Book title.
    pub title: String,

    /// Author.
    pub author: String,

    /// URL of the file in object storage.
    pub file_url: String,

    /// Path of the downloaded copy on this device.
    pub local_path: Option<String>,

    /// File format.
    pub format: BookFormat,

    /// Owning user.
    pub user_id: String,

    /// Poster image URL.
    pub poster_image_url: Option<String>,
}

impl Book {
    /// Whether a local copy has been recorded.
    pub fn is_downloaded(&self) -> bool {
        self.local_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Object key of the book file: `books/{user_id}/{id}.{ext}`.
    pub fn remote_key(&self) -> String {
        remote_key(&self.user_id, &self.id, self.format)
    }

    /// Local file path, if downloaded.
    pub fn local_file(&self) -> Option<&Path> {
        self.local_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(Path::new)
    }

    /// Convert a database row into a book.
    pub fn from_stored(sb: StoredBook) -> Result<Self> {
        let format = BookFormat::parse(&sb.format).ok_or_else(|| {
            AppError::InvalidFormat(format!("Unknown book format: {}", sb.format))
        })?;

        Ok(Self {
            id: sb.id,
            title: sb.title,
            author: sb.author,
            file_url: sb.file_url,
            local_path: sb.local_path,
            format,
            user_id: sb.user_id,
            poster_image_url: sb.poster_image_url,
        })
    }

    /// Convert into a database row.
    pub fn to_stored(&self) -> StoredBook {
        StoredBook {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            file_url: self.file_url.clone(),
            local_path: self.local_path.clone(),
            format: self.format.as_str().to_string(),
            user_id: self.user_id.clone(),
            poster_image_url: self.poster_image_url.clone(),
            updated_at: now_timestamp(),
        }
    }
}

/// Metadata document describing an uploaded book, shared across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBook {
    /// Book ID.
    pub id: String,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// URL of the file in object storage.
    pub file_url: String,
    /// Owning user.
    pub user_id: String,
    /// File format.
    pub format: BookFormat,
    /// Poster image URL.
    #[serde(default)]
    pub poster_image_url: Option<String>,
    /// Upload time, seconds since the epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl RemoteBook {
    /// Document for a freshly uploaded book.
    pub fn from_book(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            file_url: book.file_url.clone(),
            user_id: book.user_id.clone(),
            format: book.format,
            poster_image_url: book.poster_image_url.clone(),
            created_at: now_timestamp(),
        }
    }

    /// Library entry for this document, not yet downloaded.
    pub fn into_book(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            file_url: self.file_url,
            local_path: None,
            format: self.format,
            user_id: self.user_id,
            poster_image_url: self.poster_image_url,
        }
    }
}

/// Object key for a book file.
pub fn remote_key(user_id: &str, book_id: &str, format: BookFormat) -> String {
    format!(
        "books/{}/{}.{}",
        user_id,
        book_id,
        format.storage_extension()
    )
}

/// Reading position within a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    /// Book ID.
    pub book_id: String,

    /// Fraction read, 0.0 - 1.0.
    pub progress: f32,

    /// Current page.
    pub current_page: i32,

    /// Total pages.
    pub total_pages: i32,
}

impl ReadingProgress {
    /// Zero progress for a book that has not been opened yet.
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            progress: 0.0,
            current_page: 0,
            total_pages: 0,
        }
    }

    /// Convert a database row.
    pub fn from_stored(sp: StoredProgress) -> Self {
        Self {
            book_id: sp.book_id,
            progress: sp.progress as f32,
            current_page: sp.current_page as i32,
            total_pages: sp.total_pages as i32,
        }
    }

    /// Convert into a database row owned by `user_id`.
    pub fn to_stored(&self, user_id: &str) -> StoredProgress {
        StoredProgress {
            book_id: self.book_id.clone(),
            user_id: user_id.to_string(),
            progress: f64::from(self.progress),
            current_page: i64::from(self.current_page),
            total_pages: i64::from(self.total_pages),
            updated_at: now_timestamp(),
        }
    }
}

/// Public profile of a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Email address.
    pub email: String,

    /// Avatar image URL.
    pub avatar_image_url: Option<String>,

    /// Phone number.
    pub phone_number: Option<String>,
}

impl From<UserAccount> for User {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            avatar_image_url: account.avatar_url,
            phone_number: account.phone_number,
        }
    }
}
