//! Use cases: one operation each, forwarding to the repository or a service.

use crate::auth::AuthService;
use crate::error::Result;
use crate::library::{Book, ReadingProgress, User};
use crate::profile::UserService;
use crate::repository::{BookRepository, PendingUpload};
use std::path::Path;

/// Books of the signed-in user.
#[derive(Clone)]
pub struct GetAllBooksUseCase {
    repository: BookRepository,
}

impl GetAllBooksUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self) -> Result<Vec<Book>> {
        self.repository.load_all_books().await
    }
}

/// One book by ID.
#[derive(Clone)]
pub struct GetBookByIdUseCase {
    repository: BookRepository,
}

impl GetBookByIdUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, book_id: &str) -> Result<Book> {
        self.repository.load_book_by_id(book_id).await
    }
}

/// Download a book file to this device.
#[derive(Clone)]
pub struct DownloadBookUseCase {
    repository: BookRepository,
}

impl DownloadBookUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, book: &Book) -> Result<Book> {
        self.repository.download_book(book).await
    }
}

/// Upload a book file.
#[derive(Clone)]
pub struct UploadBookUseCase {
    repository: BookRepository,
}

impl UploadBookUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it to completion.
    pub async fn execute(&self, file: &Path, title: &str, author: &str) -> Result<Book> {
        self.repository.upload_book(file, title, author).await
    }

    /// Start the upload and return it while in flight.
    pub async fn start(&self, file: &Path, title: &str, author: &str) -> Result<PendingUpload> {
        self.repository.start_upload(file, title, author).await
    }
}

/// Remove a book from the library.
#[derive(Clone)]
pub struct DeleteBookUseCase {
    repository: BookRepository,
}

impl DeleteBookUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, book: &Book) -> Result<()> {
        self.repository.delete_book(book).await
    }
}

/// Search by title or author.
#[derive(Clone)]
pub struct SearchBooksUseCase {
    repository: BookRepository,
}

impl SearchBooksUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, query: &str) -> Result<Vec<Book>> {
        self.repository.search_book(query).await
    }
}

/// Text of a downloaded book.
#[derive(Clone)]
pub struct GetBookContentUseCase {
    repository: BookRepository,
}

impl GetBookContentUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, book: &Book) -> Result<String> {
        self.repository.get_book_content(book).await
    }
}

/// Pull book metadata uploaded from other devices.
#[derive(Clone)]
pub struct SyncBooksUseCase {
    repository: BookRepository,
}

impl SyncBooksUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it; returns how many books were added.
    pub async fn execute(&self) -> Result<usize> {
        self.repository.sync_remote_books().await
    }
}

/// Saved reading position of a book.
#[derive(Clone)]
pub struct GetReadingProgressUseCase {
    repository: BookRepository,
}

impl GetReadingProgressUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, book_id: &str) -> Result<ReadingProgress> {
        self.repository.get_reading_progress(book_id).await
    }
}

/// Store a reading position.
#[derive(Clone)]
pub struct SaveReadingProgressUseCase {
    repository: BookRepository,
}

impl SaveReadingProgressUseCase {
    /// Create the use case.
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }

    /// Run it.
    pub async fn execute(&self, progress: &ReadingProgress) -> Result<()> {
        self.repository.save_reading_progress(progress).await
    }
}

/// Sign in.
#[derive(Clone)]
pub struct LoginUseCase {
    auth: AuthService,
}

impl LoginUseCase {
    /// Create the use case.
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Run it.
    pub async fn execute(&self, email: &str, password: &str) -> Result<User> {
        self.auth.login(email, password).await
    }
}

/// Create an account.
#[derive(Clone)]
pub struct RegisterUseCase {
    auth: AuthService,
}

impl RegisterUseCase {
    /// Create the use case.
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Run it.
    pub async fn execute(&self, name: &str, email: &str, password: &str) -> Result<User> {
        self.auth.register(name, email, password).await
    }
}

/// Sign out.
#[derive(Clone)]
pub struct LogoutUseCase {
    auth: AuthService,
}

impl LogoutUseCase {
    /// Create the use case.
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Run it.
    pub async fn execute(&self) -> Result<()> {
        self.auth.logout().await
    }
}

/// The signed-in user, if any.
#[derive(Clone)]
pub struct GetCurrentUserUseCase {
    auth: AuthService,
}

impl GetCurrentUserUseCase {
    /// Create the use case.
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    /// Run it.
    pub async fn execute(&self) -> Result<Option<User>> {
        self.auth.current_user().await
    }
}

/// Profile of the signed-in user.
#[derive(Clone)]
pub struct GetUserUseCase {
    users: UserService,
}

impl GetUserUseCase {
    /// Create the use case.
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    /// Run it.
    pub async fn execute(&self) -> Result<User> {
        self.users.get_user().await
    }
}

/// Save profile edits.
#[derive(Clone)]
pub struct UpdateUserUseCase {
    users: UserService,
}

impl UpdateUserUseCase {
    /// Create the use case.
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    /// Run it.
    pub async fn execute(&self, user: &User) -> Result<()> {
        self.users.update_user(user).await
    }
}

/// Replace the avatar image.
#[derive(Clone)]
pub struct UpdateAvatarUseCase {
    users: UserService,
}

impl UpdateAvatarUseCase {
    /// Create the use case.
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    /// Run it; returns the new avatar URL.
    pub async fn execute(&self, image: &Path) -> Result<String> {
        self.users.update_avatar_image(image).await
    }
}
