use super::DocumentDecoder;
use crate::processing::types::{DetectedType, ExtractionError};
use std::path::Path;

/// Page-text extraction backed by `pdf-extract`. Pages are joined with `\n` in page order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfDecoder;

impl DocumentDecoder for PdfDecoder {
    fn decode(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|error| ExtractionError::decode(DetectedType::Pdf, error))?;

        let text = pages.join("\n");
        if text.trim().is_empty() {
            tracing::warn!(
                path = %path.display(),
                pages = pages.len(),
                "No text extracted from PDF; it may be image-only"
            );
        }
        Ok(text)
    }
}
