//! Core data types and error definitions for the processing pipeline.

use crate::model::ModelClientError;
use crate::store::StoreError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Semantic format of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedType {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain or markdown text.
    Text,
    /// Delimited text or spreadsheet.
    Tabular,
    /// No rule matched.
    Unknown,
}

impl DetectedType {
    /// Lowercase label used in logs and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "text",
            Self::Tabular => "tabular",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DetectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, 1-indexed slice of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk, starting at 1.
    pub index: usize,
    /// Member paragraphs rejoined with `\n`.
    pub text: String,
}

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The caller asked for chunks of zero characters.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors raised while turning a classified file into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extractor exists for the detected type.
    #[error("Unsupported type: {0}")]
    UnsupportedType(DetectedType),
    /// The file could not be read.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    /// A per-format decoder rejected the file.
    #[error("Failed to decode {kind} file: {message}")]
    Decode {
        /// Format the decoder was handling.
        kind: DetectedType,
        /// Decoder diagnostic.
        message: String,
    },
}

impl ExtractionError {
    pub(crate) fn decode(kind: DetectedType, message: impl fmt::Display) -> Self {
        Self::Decode {
            kind,
            message: message.to_string(),
        }
    }
}

/// Stage of the summarization protocol a model call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPhase {
    /// Per-chunk summaries.
    Map,
    /// Combination of all chunk summaries.
    Reduce,
}

impl fmt::Display for SummaryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
        })
    }
}

/// Errors raised by the summarization engine.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Model credential, endpoint or chunk budget is missing or invalid.
    #[error("Summarization not configured: {0}")]
    Configuration(String),
    /// A model request failed. `chunk_index` is 1-based and absent for the reduce call.
    #[error("{phase} call failed{}: {source}", chunk_label(.chunk_index))]
    ExternalCall {
        /// Stage the failing call belonged to.
        phase: SummaryPhase,
        /// Chunk the failing map call was summarizing.
        chunk_index: Option<usize>,
        /// Adapter error.
        #[source]
        source: ModelClientError,
    },
}

fn chunk_label(chunk_index: &Option<usize>) -> String {
    chunk_index
        .map(|index| format!(" for chunk {index}"))
        .unwrap_or_default()
}

/// Output of one summarization call.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    /// Raw reduce-phase response.
    pub final_summary: String,
    /// Map-phase responses in chunk order.
    pub chunk_summaries: Vec<String>,
    /// Model identifier used for every call.
    pub model: String,
}

/// Errors returned by the pipeline orchestrator.
///
/// Any of these aborts the file's unit of work and leaves its status untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Model collaborator lacks a credential or endpoint.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The detected type has no extractor.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(DetectedType),
    /// A decoder failed on a recognized type.
    #[error("Extraction failed: {0}")]
    Extraction(ExtractionError),
    /// A model request failed.
    #[error("External call failed during {phase} phase{}: {source}", chunk_label(.chunk_index))]
    ExternalCall {
        /// Stage the failing call belonged to.
        phase: SummaryPhase,
        /// Chunk the failing map call was summarizing.
        chunk_index: Option<usize>,
        /// Adapter error.
        #[source]
        source: ModelClientError,
    },
    /// The file or summary identifier is unknown to the store.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A file path resolves outside the configured storage root.
    #[error("Path is outside the storage root: {}", .0.display())]
    OutsideStorageRoot(PathBuf),
}

impl From<ExtractionError> for PipelineError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::UnsupportedType(kind) => Self::UnsupportedType(kind),
            other => Self::Extraction(other),
        }
    }
}

impl From<SummarizeError> for PipelineError {
    fn from(error: SummarizeError) -> Self {
        match error {
            SummarizeError::Configuration(message) => Self::Configuration(message),
            SummarizeError::ExternalCall {
                phase,
                chunk_index,
                source,
            } => Self::ExternalCall {
                phase,
                chunk_index,
                source,
            },
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        Self::NotFound(error.to_string())
    }
}
