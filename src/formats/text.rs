use crate::error::Result;
use crate::formats::ContentExtractor;
use std::path::Path;

/// Plain text files are returned as stored.
pub struct TextExtractor;

impl ContentExtractor for TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string())
    }
}
