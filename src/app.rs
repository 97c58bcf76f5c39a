//! Application state: the services of one process, built from the config.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::profile::UserService;
use crate::repository::BookRepository;
use crate::storage::{self, DocumentStore, ObjectStore, TransferManager};
use crate::usecases::*;
use crate::viewmodels::{AuthViewModel, BooksViewModel, ProfileViewModel, ReadingViewModel};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Authentication service.
    pub auth: AuthService,
    /// Profile service.
    pub users: UserService,
    /// Book repository.
    pub books: BookRepository,
}

impl AppState {
    /// Open the database and the configured object store.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.database.path)?;
        let store = storage::open_store(&config.storage)?;
        Ok(Self::new_with(config, db, store, true))
    }

    /// Build the state from an open database and store. The session token is
    /// only persisted when `persist_session` is set.
    pub fn new_with(
        config: Config,
        db: Database,
        store: Arc<dyn ObjectStore>,
        persist_session: bool,
    ) -> Self {
        let session_file = persist_session.then(|| config.auth.session_file.clone());
        let auth = AuthService::new(db.clone(), config.auth.session_days, session_file);

        let transfers = Arc::new(TransferManager::new(Arc::clone(&store)));
        let documents = DocumentStore::new(store);

        let users = UserService::new(
            db.clone(),
            auth.clone(),
            documents.clone(),
            Arc::clone(&transfers),
        );
        let books = BookRepository::new(
            db,
            transfers,
            documents,
            auth.current(),
            config.library.downloads_dir.clone(),
            config.library.temp_dir.clone(),
        );

        Self {
            auth,
            users,
            books,
        }
    }

    /// Library list holder.
    pub fn books_view_model(&self) -> BooksViewModel {
        BooksViewModel::new(
            GetAllBooksUseCase::new(self.books.clone()),
            DownloadBookUseCase::new(self.books.clone()),
            DeleteBookUseCase::new(self.books.clone()),
            SearchBooksUseCase::new(self.books.clone()),
            UploadBookUseCase::new(self.books.clone()),
        )
    }

    /// Reader holder.
    pub fn reading_view_model(&self) -> ReadingViewModel {
        ReadingViewModel::new(
            GetBookContentUseCase::new(self.books.clone()),
            GetReadingProgressUseCase::new(self.books.clone()),
            SaveReadingProgressUseCase::new(self.books.clone()),
            GetBookByIdUseCase::new(self.books.clone()),
        )
    }

    /// Sign-in holder.
    pub fn auth_view_model(&self) -> AuthViewModel {
        AuthViewModel::new(
            LoginUseCase::new(self.auth.clone()),
            RegisterUseCase::new(self.auth.clone()),
            LogoutUseCase::new(self.auth.clone()),
            GetCurrentUserUseCase::new(self.auth.clone()),
        )
    }

    /// Profile holder.
    pub fn profile_view_model(&self) -> ProfileViewModel {
        ProfileViewModel::new(
            GetUserUseCase::new(self.users.clone()),
            UpdateUserUseCase::new(self.users.clone()),
            UpdateAvatarUseCase::new(self.users.clone()),
        )
    }

    /// Pull book documents from other devices.
    pub fn sync_books_use_case(&self) -> SyncBooksUseCase {
        SyncBooksUseCase::new(self.books.clone())
    }
}
