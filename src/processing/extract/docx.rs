use super::DocumentDecoder;
use crate::processing::types::{DetectedType, ExtractionError};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Body-paragraph extraction for Word documents.
///
/// Reads `word/document.xml` and returns each top-level `w:p` on its own line, in document
/// order. Paragraphs nested in tables or text boxes are skipped. Run-level tabs and breaks
/// are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxDecoder;

impl DocumentDecoder for DocxDecoder {
    fn decode(&self, path: &Path) -> Result<String, ExtractionError> {
        let file = File::open(path)?;
        let mut archive =
            ZipArchive::new(file).map_err(|error| ExtractionError::decode(DetectedType::Docx, error))?;
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|error| {
                ExtractionError::decode(DetectedType::Docx, format!("{DOCUMENT_PART}: {error}"))
            })?
            .read_to_string(&mut xml)?;

        Ok(paragraphs_from_xml(&xml)?.join("\n"))
    }
}

pub(crate) fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut table_depth = 0usize;
    let mut textbox_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;

    loop {
        // Tables and text boxes carry their own paragraphs; only body paragraphs count.
        let nested = table_depth > 0 || textbox_depth > 0;
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"txbxContent" => textbox_depth += 1,
                b"p" if !nested => current = Some(String::new()),
                b"r" if !nested => in_run = true,
                b"t" if !nested => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(element)) => match element.local_name().as_ref() {
                b"p" if !nested => paragraphs.push(String::new()),
                b"tab" if in_run && !nested => push_to(&mut current, "\t"),
                b"br" | b"cr" if in_run && !nested => push_to(&mut current, "\n"),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text && !nested => {
                let text = text
                    .unescape()
                    .map_err(|error| ExtractionError::decode(DetectedType::Docx, error))?;
                push_to(&mut current, &text);
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"txbxContent" => textbox_depth = textbox_depth.saturating_sub(1),
                b"p" if !nested => {
                    if let Some(paragraph) = current.take() {
                        paragraphs.push(paragraph);
                    }
                }
                b"r" if !nested => in_run = false,
                b"t" if !nested => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => {
                return Err(ExtractionError::decode(
                    DetectedType::Docx,
                    format!("malformed XML at byte {}: {error}", reader.buffer_position()),
                ));
            }
            Ok(_) => {}
        }
    }

    Ok(paragraphs)
}

fn push_to(current: &mut Option<String>, text: &str) {
    if let Some(paragraph) = current.as_mut() {
        paragraph.push_str(text);
    }
}
