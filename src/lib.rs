//! bookly: a personal e-book library.
//!
//! Users sign in, upload books (TXT, PDF, EPUB) to object storage, download
//! them to the device, read their text and keep a reading position per book.
//!
//! # Features
//!
//! - Email/password accounts with persisted sessions
//! - Local directory or S3-compatible HTTP bucket
//! - Cancellable uploads and downloads with progress
//! - Text extraction for TXT, PDF and EPUB
//! - Library search by title or author
//! - Book metadata documents shared across devices

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Application state.
pub mod app;
/// Authentication and the signed-in user.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book format handlers.
pub mod formats;
/// Library models.
pub mod library;
/// User profile.
pub mod profile;
/// Book repository.
pub mod repository;
/// Object storage.
pub mod storage;
/// Use cases.
pub mod usecases;
/// View-state holders.
pub mod viewmodels;

#[cfg(test)]
mod tests;

pub use app::AppState;
pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
