//! Text extraction dispatch.
//!
//! [`Extractor`] routes a classified file to the decoder registered for its type and returns
//! the decoder's text unchanged. Decoders are trait objects so callers can swap any format
//! out (tests use this to avoid real PDF fixtures).

mod docx;
mod pdf;
mod tabular;

pub use docx::DocxDecoder;
pub use pdf::PdfDecoder;
pub use tabular::{Table, TabularDecoder, render_report};

use super::types::{DetectedType, ExtractionError};
use std::path::Path;
use std::sync::Arc;

/// Converts one file format into plain text.
pub trait DocumentDecoder: Send + Sync {
    /// Decode the file at `path`.
    fn decode(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Reads a file as UTF-8, replacing undecodable bytes instead of failing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDecoder;

impl DocumentDecoder for TextDecoder {
    fn decode(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Per-type decoder table.
#[derive(Clone)]
pub struct Extractor {
    pdf: Arc<dyn DocumentDecoder>,
    docx: Arc<dyn DocumentDecoder>,
    text: Arc<dyn DocumentDecoder>,
    tabular: Arc<dyn DocumentDecoder>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            pdf: Arc::new(PdfDecoder),
            docx: Arc::new(DocxDecoder),
            text: Arc::new(TextDecoder),
            tabular: Arc::new(TabularDecoder),
        }
    }
}

impl Extractor {
    /// Extractor wired to the built-in decoders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the decoder used for `kind`. Registering for `Unknown` has no effect.
    pub fn with_decoder(mut self, kind: DetectedType, decoder: Arc<dyn DocumentDecoder>) -> Self {
        match kind {
            DetectedType::Pdf => self.pdf = decoder,
            DetectedType::Docx => self.docx = decoder,
            DetectedType::Text => self.text = decoder,
            DetectedType::Tabular => self.tabular = decoder,
            DetectedType::Unknown => {
                tracing::warn!("Ignoring decoder registration for unknown file type");
            }
        }
        self
    }

    /// Extract the text of `path`, already classified as `kind`.
    pub fn extract(&self, path: &Path, kind: DetectedType) -> Result<String, ExtractionError> {
        let decoder = match kind {
            DetectedType::Pdf => &self.pdf,
            DetectedType::Docx => &self.docx,
            DetectedType::Text => &self.text,
            DetectedType::Tabular => &self.tabular,
            DetectedType::Unknown => return Err(ExtractionError::UnsupportedType(kind)),
        };
        let text = decoder.decode(path)?;
        tracing::debug!(
            path = %path.display(),
            kind = %kind,
            chars = text.chars().count(),
            "Extracted text"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedDecoder(&'static str);

    impl DocumentDecoder for FixedDecoder {
        fn decode(&self, _path: &Path) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn text_decoding_replaces_invalid_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"caf\xc3\xa9 \xff ok").expect("write");

        let text = Extractor::new()
            .extract(&path, DetectedType::Text)
            .expect("text");
        assert!(text.starts_with("café "));
        assert!(text.ends_with(" ok"));
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let error = Extractor::new()
            .extract(Path::new("whatever.bin"), DetectedType::Unknown)
            .expect_err("unsupported");
        assert!(matches!(
            error,
            ExtractionError::UnsupportedType(DetectedType::Unknown)
        ));
    }

    #[test]
    fn registered_decoder_replaces_builtin() {
        let extractor = Extractor::new().with_decoder(DetectedType::Pdf, Arc::new(FixedDecoder("page one\npage two")));
        let text = extractor
            .extract(Path::new("report.pdf"), DetectedType::Pdf)
            .expect("decoded");
        assert_eq!(text, "page one\npage two");
    }

    #[test]
    fn missing_text_file_is_io_error() {
        let error = Extractor::new()
            .extract(Path::new("/no/such/file.txt"), DetectedType::Text)
            .expect_err("missing");
        assert!(matches!(error, ExtractionError::Io(_)));
    }
}
