use super::OperationResult;
use crate::library::Book;
use crate::usecases::{
    DeleteBookUseCase, DownloadBookUseCase, GetAllBooksUseCase, SearchBooksUseCase,
    UploadBookUseCase,
};
use std::path::Path;
use tokio::sync::watch;

/// State of the most recent upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    /// No upload started.
    Idle,
    /// Uploading; completed fraction in `[0.0, 1.0]`.
    Loading(f32),
    /// Uploaded and added to the library.
    Success(Book),
    /// Upload failed.
    Error(String),
}

/// Library list, search and upload state.
pub struct BooksViewModel {
    get_all_books: GetAllBooksUseCase,
    download_book: DownloadBookUseCase,
    delete_book: DeleteBookUseCase,
    search_books: SearchBooksUseCase,
    upload_book: UploadBookUseCase,

    books_state: watch::Sender<OperationResult<Vec<Book>>>,
    search_query: watch::Sender<String>,
    upload_state: watch::Sender<UploadState>,
    is_loading: watch::Sender<bool>,
}

impl BooksViewModel {
    /// Create the holder. Call [`BooksViewModel::load_books`] to populate it.
    pub fn new(
        get_all_books: GetAllBooksUseCase,
        download_book: DownloadBookUseCase,
        delete_book: DeleteBookUseCase,
        search_books: SearchBooksUseCase,
        upload_book: UploadBookUseCase,
    ) -> Self {
        Self {
            get_all_books,
            download_book,
            delete_book,
            search_books,
            upload_book,
            books_state: watch::Sender::new(OperationResult::Loading),
            search_query: watch::Sender::new(String::new()),
            upload_state: watch::Sender::new(UploadState::Idle),
            is_loading: watch::Sender::new(false),
        }
    }

    /// Books shown in the list.
    pub fn books_state(&self) -> watch::Receiver<OperationResult<Vec<Book>>> {
        self.books_state.subscribe()
    }

    /// Current search text.
    pub fn search_query(&self) -> watch::Receiver<String> {
        self.search_query.subscribe()
    }

    /// Upload progress and outcome.
    pub fn upload_state(&self) -> watch::Receiver<UploadState> {
        self.upload_state.subscribe()
    }

    /// Whether an operation is running.
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.is_loading.subscribe()
    }

    /// Reload every book of the signed-in user.
    pub async fn load_books(&self) {
        self.is_loading.send_replace(true);
        let result = self.get_all_books.execute().await;
        self.books_state.send_replace(result.into());
        self.is_loading.send_replace(false);
    }

    /// Download a book, then reload the list.
    pub async fn download_book(&self, book: &Book) -> OperationResult<Book> {
        self.is_loading.send_replace(true);
        let result = self.download_book.execute(book).await;
        if result.is_ok() {
            self.load_books().await;
        }
        self.is_loading.send_replace(false);
        result.into()
    }

    /// Delete a book, then reload the list.
    pub async fn delete_book(&self, book: &Book) -> OperationResult<()> {
        self.is_loading.send_replace(true);
        let result = self.delete_book.execute(book).await;
        if result.is_ok() {
            self.load_books().await;
        }
        self.is_loading.send_replace(false);
        result.into()
    }

    /// Filter the list. A blank query shows every book.
    pub async fn search_books(&self, query: &str) {
        self.search_query.send_replace(query.to_string());

        if query.trim().is_empty() {
            self.load_books().await;
        } else {
            self.is_loading.send_replace(true);
            let result = self.search_books.execute(query).await;
            self.books_state.send_replace(result.into());
            self.is_loading.send_replace(false);
        }
    }

    /// Upload a book file, reporting transfer progress through
    /// [`BooksViewModel::upload_state`], then reload the list.
    pub async fn upload_book(&self, file: &Path, title: &str, author: &str) {
        self.upload_state.send_replace(UploadState::Loading(0.0));
        self.is_loading.send_replace(true);

        let state = match self.upload_book.start(file, title, author).await {
            Ok(pending) => {
                let mut progress = pending.progress();
                let finish = pending.finish();
                tokio::pin!(finish);

                let result = loop {
                    tokio::select! {
                        result = &mut finish => break result,
                        changed = progress.changed() => match changed {
                            Ok(()) => {
                                let fraction = progress.borrow_and_update().fraction();
                                self.upload_state.send_replace(UploadState::Loading(fraction));
                            }
                            // Transfer task is gone; only the outcome is left.
                            Err(_) => break (&mut finish).await,
                        },
                    }
                };

                match result {
                    Ok(book) => UploadState::Success(book),
                    Err(e) => UploadState::Error(e.to_string()),
                }
            }
            Err(e) => UploadState::Error(e.to_string()),
        };

        let uploaded = matches!(state, UploadState::Success(_));
        self.upload_state.send_replace(state);
        if uploaded {
            self.load_books().await;
        }
        self.is_loading.send_replace(false);
    }

    /// Forget the search text and show every book.
    pub async fn clear_search(&self) {
        self.search_query.send_replace(String::new());
        self.load_books().await;
    }

    /// Return the upload state to idle.
    pub fn reset_upload_state(&self) {
        self.upload_state.send_replace(UploadState::Idle);
    }
}
