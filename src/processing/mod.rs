//! Document pipeline: type detection, text extraction, chunking and map-reduce summarization.

pub mod chunking;
pub mod detect;
pub mod extract;
mod service;
pub mod summarize;
pub mod types;

pub use detect::detect;
pub use extract::{DocumentDecoder, Extractor};
pub use service::{FileRegistration, PipelineApi, PipelineService};
pub use summarize::SummarizationEngine;
pub use types::{
    ChunkingError, DetectedType, ExtractionError, PipelineError, SummarizeError, SummaryOutcome,
    SummaryPhase, TextChunk,
};
