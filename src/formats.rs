mod epub;
mod pdf;
mod text;

pub use epub::EpubExtractor;
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

use crate::config::BookFormat;
use crate::error::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

// Every C0 control character except tab, line feed and carriage return.
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("valid control character pattern")
});

/// Trait for format-specific text extraction.
pub trait ContentExtractor: Send + Sync {
    /// Read the readable text of a book file.
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Get the extractor for a book format.
pub fn get_extractor(format: BookFormat) -> Box<dyn ContentExtractor> {
    match format {
        BookFormat::Txt => Box::new(TextExtractor),
        BookFormat::Pdf => Box::new(PdfExtractor),
        BookFormat::Epub => Box::new(EpubExtractor),
    }
}

/// Normalize extracted text: collapse 3+ newlines to a blank line, drop
/// control characters and trim.
pub fn clean_extracted_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = CONTROL_CHARS.replace_all(&text, "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
