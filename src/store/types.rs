//! Records held by the lifecycle store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// Registered and waiting for (or retrying) the pipeline.
    Pending,
    /// Summary committed; a [`SummaryRecord`] exists for the file.
    Processed,
    /// Given up on by the calling layer. Never set by the pipeline itself.
    Failed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// An uploaded file and its lifecycle status.
///
/// Every field except `status` is fixed at registration. Status changes go through the store,
/// which swaps in a rebuilt record rather than mutating one readers may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// File identifier.
    pub id: String,
    /// Upload batch the file arrived in.
    pub upload_id: String,
    /// Display name supplied by the uploader.
    pub filename: String,
    /// Caller-supplied media type. Untrusted.
    pub declared_media_type: Option<String>,
    /// Hex SHA-256 of the stored bytes.
    pub sha256: String,
    /// Where the bytes live on disk.
    pub storage_path: PathBuf,
    /// Current lifecycle state.
    pub status: FileStatus,
}

impl StoredFile {
    /// Build a `PENDING` record with a fresh identifier.
    pub fn new(
        upload_id: impl Into<String>,
        filename: impl Into<String>,
        declared_media_type: Option<String>,
        sha256: impl Into<String>,
        storage_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            upload_id: upload_id.into(),
            filename: filename.into(),
            declared_media_type,
            sha256: sha256.into(),
            storage_path: storage_path.into(),
            status: FileStatus::Pending,
        }
    }
}

/// Final output of the pipeline for one file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    /// Summary identifier.
    pub id: String,
    /// File the summary belongs to.
    pub file_id: String,
    /// Raw text of the reduce-phase response.
    pub summary_text: String,
    /// Ordered chunk summaries plus any structured points parsed from the reduce response.
    pub key_points: KeyPoints,
    /// Model identifier used for every call.
    pub model: String,
    /// Creation time (UTC).
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Key-points payload stored alongside the final summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPoints {
    /// Map-phase output in chunk order.
    pub chunks: Vec<String>,
    /// Structured points found in the reduce response, if it contained any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

mod rfc3339 {
    use serde::Serializer;
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub(super) fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}
