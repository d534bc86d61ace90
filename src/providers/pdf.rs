//! Text extraction from PDF documents.
//!
//! Converts downloaded attachment bytes into plain text for the extraction
//! model. Behind a trait so tests can substitute canned text.

use thiserror::Error;

/// Errors that can occur during document text extraction.
#[derive(Debug, Error)]
pub enum TextExtractError {
    /// The document could not be parsed.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The document parsed but yielded no text.
    #[error("document produced no text")]
    Empty,
}

/// Trait for document-to-text conversion.
#[cfg_attr(test, mockall::automock)]
pub trait TextExtractor: Send + Sync {
    /// Extracts plain text from raw document bytes.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractError>;
}

/// PDF text extractor.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractError> {
        // pdf-extract can panic on malformed PDFs — wrap in catch_unwind
        let owned = bytes.to_vec();
        let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

        let text = match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(TextExtractError::Malformed(e.to_string())),
            Err(_) => {
                return Err(TextExtractError::Malformed(
                    "extraction panicked (malformed file)".to_string(),
                ))
            }
        };

        if text.trim().is_empty() {
            return Err(TextExtractError::Empty);
        }

        Ok(text)
    }
}
