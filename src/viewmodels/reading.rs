use super::OperationResult;
use crate::library::{Book, ReadingProgress};
use crate::usecases::{
    GetBookByIdUseCase, GetBookContentUseCase, GetReadingProgressUseCase,
    SaveReadingProgressUseCase,
};
use tokio::sync::watch;

/// Text and reading position of the open book.
pub struct ReadingViewModel {
    get_book_content: GetBookContentUseCase,
    get_reading_progress: GetReadingProgressUseCase,
    save_reading_progress: SaveReadingProgressUseCase,
    get_book_by_id: GetBookByIdUseCase,

    book_content: watch::Sender<Option<OperationResult<String>>>,
    reading_progress: watch::Sender<Option<ReadingProgress>>,
    current_book: watch::Sender<Option<Book>>,
    is_loading: watch::Sender<bool>,
}

impl ReadingViewModel {
    /// Create the holder with no book open.
    pub fn new(
        get_book_content: GetBookContentUseCase,
        get_reading_progress: GetReadingProgressUseCase,
        save_reading_progress: SaveReadingProgressUseCase,
        get_book_by_id: GetBookByIdUseCase,
    ) -> Self {
        Self {
            get_book_content,
            get_reading_progress,
            save_reading_progress,
            get_book_by_id,
            book_content: watch::Sender::new(None),
            reading_progress: watch::Sender::new(None),
            current_book: watch::Sender::new(None),
            is_loading: watch::Sender::new(false),
        }
    }

    /// Text of the open book.
    pub fn book_content(&self) -> watch::Receiver<Option<OperationResult<String>>> {
        self.book_content.subscribe()
    }

    /// Reading position of the open book.
    pub fn reading_progress(&self) -> watch::Receiver<Option<ReadingProgress>> {
        self.reading_progress.subscribe()
    }

    /// The open book.
    pub fn current_book(&self) -> watch::Receiver<Option<Book>> {
        self.current_book.subscribe()
    }

    /// Whether an operation is running.
    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.is_loading.subscribe()
    }

    /// Open a book by ID and load its text and position.
    pub async fn load_book_by_id(&self, book_id: &str) {
        tracing::debug!(book_id, "Opening book");
        self.is_loading.send_replace(true);
        self.book_content.send_replace(None);

        match self.get_book_by_id.execute(book_id).await {
            Ok(book) => {
                self.current_book.send_replace(Some(book.clone()));
                self.load_book_content(&book).await;
            }
            Err(e) => {
                tracing::debug!(book_id, error = %e, "Failed to open book");
                self.book_content
                    .send_replace(Some(OperationResult::Error(e.to_string())));
                self.is_loading.send_replace(false);
            }
        }
    }

    /// Load the text and saved position of `book`. A position that cannot be
    /// read falls back to the start of the book.
    pub async fn load_book_content(&self, book: &Book) {
        self.is_loading.send_replace(true);

        let content = self.get_book_content.execute(book).await;
        self.book_content.send_replace(Some(content.into()));

        let progress = match self.get_reading_progress.execute(&book.id).await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::debug!(book_id = %book.id, error = %e, "Using default progress");
                ReadingProgress::new(&book.id)
            }
        };
        self.reading_progress.send_replace(Some(progress));

        self.is_loading.send_replace(false);
    }

    /// Record a new position for the open book. The published position only
    /// changes once the save succeeds.
    pub async fn save_progress(
        &self,
        progress: f32,
        current_page: i32,
        total_pages: i32,
    ) -> OperationResult<()> {
        let Some(book) = self.current_book.borrow().clone() else {
            return OperationResult::Error("No book is open".to_string());
        };

        let new_progress = ReadingProgress {
            book_id: book.id,
            progress,
            current_page,
            total_pages,
        };
        let result = self.save_reading_progress.execute(&new_progress).await;
        if result.is_ok() {
            self.reading_progress.send_replace(Some(new_progress));
        }
        result.into()
    }

    /// Change the fraction read, keeping the page numbers.
    pub async fn update_progress(&self, progress: f32) -> OperationResult<()> {
        let Some(current) = self.reading_progress.borrow().clone() else {
            return OperationResult::Error("No reading progress loaded".to_string());
        };
        self.save_progress(progress, current.current_page, current.total_pages)
            .await
    }
}
