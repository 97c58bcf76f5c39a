use crate::error::{AppError, Result};
use crate::formats::{ContentExtractor, clean_extracted_text};
use lopdf::Document;
use std::path::Path;

/// Text extraction for PDF files.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract page text in page order. Pages whose text cannot be decoded
    /// are skipped; a document where every page fails is an error.
    fn page_texts(doc: &Document) -> Result<Vec<String>> {
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        let mut texts = Vec::with_capacity(pages.len());
        let mut last_error = None;

        for page in &pages {
            match doc.extract_text(&[*page]) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    tracing::warn!(page, error = %e, "Skipping unreadable PDF page");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if texts.is_empty() => Err(AppError::Pdf(e.to_string())),
            _ => Ok(texts),
        }
    }
}

impl ContentExtractor for PdfExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let doc = Document::load(path).map_err(|e| AppError::Pdf(e.to_string()))?;

        let texts = Self::page_texts(&doc)?;
        tracing::debug!(path = %path.display(), pages = texts.len(), "Extracted PDF text");

        Ok(clean_extracted_text(&texts.join("\n")))
    }
}
