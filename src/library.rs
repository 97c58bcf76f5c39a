pub mod book;

pub use book::{Book, ReadingProgress, RemoteBook, User};
