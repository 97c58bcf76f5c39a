mod schema;

pub use schema::Database;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Account in the local identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique user ID.
    pub id: String,
    /// Login email, unique.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Row of the `books` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBook {
    /// Book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Remote object URL.
    pub file_url: String,
    /// Path of the downloaded file, if any.
    pub local_path: Option<String>,
    /// Format name ("TXT", "EPUB", "PDF").
    pub format: String,
    /// Owning user.
    pub user_id: String,
    /// Poster image URL.
    pub poster_image_url: Option<String>,
    /// Last write timestamp.
    pub updated_at: i64,
}

/// Row of the `reading_progress` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProgress {
    /// Book ID.
    pub book_id: String,
    /// User ID.
    pub user_id: String,
    /// Fraction read (0.0 - 1.0).
    pub progress: f64,
    /// Current page number.
    pub current_page: i64,
    /// Total pages in book.
    pub total_pages: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}
