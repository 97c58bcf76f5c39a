use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

const BOOK_COLUMNS: &str =
    "id, title, author, file_url, local_path, format, user_id, poster_image_url, updated_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Accounts of the identity provider
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                avatar_url TEXT,
                phone_number TEXT,
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Library cache, one row per book
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                file_url TEXT NOT NULL,
                local_path TEXT,
                format TEXT NOT NULL,
                user_id TEXT NOT NULL,
                poster_image_url TEXT,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reading_progress (
                book_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                progress REAL NOT NULL,
                current_page INTEGER NOT NULL DEFAULT 0,
                total_pages INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (book_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Database(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new account.
    pub fn create_user(&self, user: &UserAccount) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, name, avatar_url, phone_number, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.name,
                user.avatar_url,
                user.phone_number,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::InvalidFormat(format!(
                    "The email address {} is already in use by another account",
                    user.email
                ))
            } else {
                AppError::Database(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get account by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, name, avatar_url, phone_number, created_at, last_login
             FROM users WHERE email = ?1",
            params![email],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))
    }

    /// Get account by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, name, avatar_url, phone_number, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
        Ok(UserAccount {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            name: row.get(3)?,
            avatar_url: row.get(4)?,
            phone_number: row.get(5)?,
            created_at: row.get(6)?,
            last_login: row.get(7)?,
        })
    }

    /// Update the editable profile fields of an account.
    pub fn update_user_profile(
        &self,
        id: &str,
        name: &str,
        avatar_url: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET name = ?1, avatar_url = ?2, phone_number = ?3 WHERE id = ?4",
                params![name, avatar_url, phone_number, id],
            )
            .map_err(|e| AppError::Database(format!("Failed to update user: {}", e)))?;
        Ok(rows > 0)
    }

    /// Set the avatar URL of an account.
    pub fn update_user_avatar(&self, id: &str, avatar_url: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET avatar_url = ?1 WHERE id = ?2",
                params![avatar_url, id],
            )
            .map_err(|e| AppError::Database(format!("Failed to update avatar: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update account last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Database(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Database(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Database(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Database(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a book, replacing any row with the same ID.
    pub fn save_book(&self, book: &StoredBook) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books
             (id, title, author, file_url, local_path, format, user_id, poster_image_url, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                file_url = excluded.file_url,
                local_path = excluded.local_path,
                format = excluded.format,
                user_id = excluded.user_id,
                poster_image_url = excluded.poster_image_url,
                updated_at = excluded.updated_at",
            params![
                book.id,
                book.title,
                book.author,
                book.file_url,
                book.local_path,
                book.format,
                book.user_id,
                book.poster_image_url,
                book.updated_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to save book: {}", e)))?;
        Ok(())
    }

    /// Insert a book unless a row with the same ID exists. Returns whether it was inserted.
    pub fn insert_book_if_absent(&self, book: &StoredBook) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO books
                 (id, title, author, file_url, local_path, format, user_id, poster_image_url, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    book.id,
                    book.title,
                    book.author,
                    book.file_url,
                    book.local_path,
                    book.format,
                    book.user_id,
                    book.poster_image_url,
                    book.updated_at,
                ],
            )
            .map_err(|e| AppError::Database(format!("Failed to insert book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Get book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<StoredBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS),
            params![id],
            Self::row_to_stored_book,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get book: {}", e)))
    }

    /// Get all books owned by a user.
    pub fn get_user_books(&self, user_id: &str) -> Result<Vec<StoredBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM books WHERE user_id = ?1 ORDER BY title",
                BOOK_COLUMNS
            ))
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![user_id], Self::row_to_stored_book)
            .map_err(|e| AppError::Database(format!("Failed to get books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Substring search on title or author among a user's books.
    ///
    /// Case is folded with Unicode rules, so Cyrillic and other non-ASCII
    /// titles match regardless of case. The query has no wildcards.
    pub fn search_books(&self, user_id: &str, query: &str) -> Result<Vec<StoredBook>> {
        let needle = query.to_lowercase();
        Ok(self
            .get_user_books(user_id)?
            .into_iter()
            .filter(|b| contains_folded(&b.title, &needle) || contains_folded(&b.author, &needle))
            .collect())
    }

    fn row_to_stored_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredBook> {
        Ok(StoredBook {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            file_url: row.get(3)?,
            local_path: row.get(4)?,
            format: row.get(5)?,
            user_id: row.get(6)?,
            poster_image_url: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    /// Delete a book owned by `user_id`.
    pub fn delete_book(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM books WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(|e| AppError::Database(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== PROGRESS OPERATIONS ==========

    /// Save reading progress, replacing the previous record wholesale.
    pub fn save_progress(&self, progress: &StoredProgress) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_progress
             (book_id, user_id, progress, current_page, total_pages, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (book_id, user_id) DO UPDATE SET
                progress = excluded.progress,
                current_page = excluded.current_page,
                total_pages = excluded.total_pages,
                updated_at = excluded.updated_at",
            params![
                progress.book_id,
                progress.user_id,
                progress.progress,
                progress.current_page,
                progress.total_pages,
                progress.updated_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to save progress: {}", e)))?;
        Ok(())
    }

    /// Get reading progress for a book.
    pub fn get_progress(&self, book_id: &str, user_id: &str) -> Result<Option<StoredProgress>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT book_id, user_id, progress, current_page, total_pages, updated_at
             FROM reading_progress
             WHERE book_id = ?1 AND user_id = ?2",
            params![book_id, user_id],
            |row| {
                Ok(StoredProgress {
                    book_id: row.get(0)?,
                    user_id: row.get(1)?,
                    progress: row.get(2)?,
                    current_page: row.get(3)?,
                    total_pages: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get progress: {}", e)))
    }

    /// Delete reading progress for a book.
    pub fn delete_progress(&self, book_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM reading_progress WHERE book_id = ?1 AND user_id = ?2",
                params![book_id, user_id],
            )
            .map_err(|e| AppError::Database(format!("Failed to delete progress: {}", e)))?;
        Ok(rows > 0)
    }
}

fn contains_folded(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
