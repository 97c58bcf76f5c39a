//! View-state holders.
//!
//! Each holder owns `watch` channels describing what a front end should
//! show and updates them as its operations run. Subscribe with the
//! accessor methods; read the latest value with `borrow()`.

mod auth;
mod books;
mod profile;
mod reading;

pub use auth::{AuthState, AuthViewModel};
pub use books::{BooksViewModel, UploadState};
pub use profile::ProfileViewModel;
pub use reading::ReadingViewModel;

use crate::error::Result;

/// Outcome of an operation as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    /// Still running.
    Loading,
    /// Finished with a value.
    Success(T),
    /// Finished with an error message.
    Error(String),
}

impl<T> OperationResult<T> {
    /// The value, if successful.
    pub fn success(&self) -> Option<&T> {
        match self {
            OperationResult::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The error message, if failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            OperationResult::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Whether the operation is still running.
    pub fn is_loading(&self) -> bool {
        matches!(self, OperationResult::Loading)
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => OperationResult::Success(value),
            Err(e) => OperationResult::Error(e.to_string()),
        }
    }
}
