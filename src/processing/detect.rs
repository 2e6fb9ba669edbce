//! File-type sniffing.
//!
//! Resolution order is fixed: declared media type, then content signature (with ZIP entry
//! inspection for Office containers), then file extension. The first rule that matches wins,
//! so an untrusted declared type still outranks the bytes. Detection never fails; anything
//! unreadable falls through to the next rule and finally to [`DetectedType::Unknown`].

use super::types::DetectedType;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const SIGNATURE_LEN: usize = 8;

/// Classify the file at `path`.
pub fn detect(path: &Path, declared_media_type: Option<&str>) -> DetectedType {
    let detected = declared_media_type
        .and_then(from_media_type)
        .or_else(|| from_signature(path))
        .or_else(|| from_extension(path))
        .unwrap_or(DetectedType::Unknown);
    tracing::debug!(
        path = %path.display(),
        declared = declared_media_type.unwrap_or(""),
        detected = %detected,
        "Detected file type"
    );
    detected
}

/// Map a declared media type onto a semantic type.
///
/// Matching is exact on the essence: parameters such as `; charset=utf-8` are ignored and
/// case is folded, but no prefix or wildcard matching is done.
pub fn from_media_type(media_type: &str) -> Option<DetectedType> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => Some(DetectedType::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(DetectedType::Docx)
        }
        "text/plain" | "text/markdown" => Some(DetectedType::Text),
        "text/csv"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            Some(DetectedType::Tabular)
        }
        _ => None,
    }
}

fn from_signature(path: &Path) -> Option<DetectedType> {
    let signature = read_signature(path)?;
    if signature.starts_with(PDF_SIGNATURE) {
        return Some(DetectedType::Pdf);
    }
    if signature.starts_with(ZIP_SIGNATURE) {
        return detect_zip_type(path);
    }
    None
}

fn read_signature(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    file.take(SIGNATURE_LEN as u64)
        .read_to_end(&mut signature)
        .ok()?;
    Some(signature)
}

fn detect_zip_type(path: &Path) -> Option<DetectedType> {
    let file = File::open(path).ok()?;
    let archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(error) => {
            tracing::debug!(path = %path.display(), error = %error, "ZIP signature but unreadable archive");
            return None;
        }
    };
    classify_entries(archive.file_names())
}

fn classify_entries<'a>(names: impl Iterator<Item = &'a str>) -> Option<DetectedType> {
    let names: Vec<String> = names.map(str::to_ascii_lowercase).collect();
    if names.iter().any(|name| name.starts_with("word/")) {
        return Some(DetectedType::Docx);
    }
    if names.iter().any(|name| name.starts_with("xl/")) {
        return Some(DetectedType::Tabular);
    }
    None
}

fn from_extension(path: &Path) -> Option<DetectedType> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some(DetectedType::Pdf),
        "docx" => Some(DetectedType::Docx),
        "txt" | "md" => Some(DetectedType::Text),
        "xlsx" | "csv" => Some(DetectedType::Tabular),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).expect("write fixture");
        path
    }

    fn write_zip(dir: &TempDir, name: &str, entries: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        for entry in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(b"<xml/>").expect("entry body");
        }
        writer.finish().expect("finish zip");
        path
    }

    #[test]
    fn declared_type_wins_over_signature() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_zip(&dir, "blob.bin", &["word/document.xml"]);
        assert_eq!(detect(&path, Some("application/pdf")), DetectedType::Pdf);
    }

    #[test]
    fn zip_with_word_entries_is_docx() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_zip(&dir, "upload", &["[Content_Types].xml", "word/document.xml"]);
        assert_eq!(detect(&path, None), DetectedType::Docx);
    }

    #[test]
    fn zip_with_xl_entries_is_tabular() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_zip(&dir, "upload", &["xl/workbook.xml", "xl/worksheets/sheet1.xml"]);
        assert_eq!(detect(&path, None), DetectedType::Tabular);
    }

    #[test]
    fn plain_zip_falls_through_to_extension() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_zip(&dir, "archive.docx", &["readme.txt"]);
        assert_eq!(detect(&path, None), DetectedType::Docx);

        let other = write_zip(&dir, "archive.zip", &["readme.txt"]);
        assert_eq!(detect(&other, None), DetectedType::Unknown);
    }

    #[test]
    fn pdf_signature_beats_extension() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "notes.txt", b"%PDF-1.7\n%binary");
        assert_eq!(detect(&path, None), DetectedType::Pdf);
    }

    #[test]
    fn csv_extension_without_signature_is_tabular() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "data.csv", b"a,b\n1,2\n");
        assert_eq!(detect(&path, None), DetectedType::Tabular);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "README.MD", b"# Title");
        assert_eq!(detect(&path, None), DetectedType::Text);
    }

    #[test]
    fn unknown_declared_type_and_extension_yield_unknown() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "image.png", b"\x89PNG\r\n\x1a\n");
        assert_eq!(detect(&path, Some("image/png")), DetectedType::Unknown);
    }

    #[test]
    fn missing_file_still_uses_extension() {
        let path = Path::new("/definitely/not/here/report.pdf");
        assert_eq!(detect(path, None), DetectedType::Pdf);
    }

    #[test]
    fn media_type_parameters_are_ignored() {
        assert_eq!(
            from_media_type("Text/Plain; charset=utf-8"),
            Some(DetectedType::Text)
        );
        assert_eq!(from_media_type("application/vnd.ms-excel"), Some(DetectedType::Tabular));
        assert_eq!(from_media_type("text/html"), None);
    }
}
