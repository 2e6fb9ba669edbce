//! Two-phase (map-reduce) summarization over chunked text.
//!
//! Map: one model request per chunk, asking for bullets, risks and action items.
//! Reduce: one request over every chunk summary, joined in chunk order by a blank line.
//! A document with `N` chunks costs exactly `N + 1` requests. Map requests may overlap when
//! `map_concurrency > 1`, but results are always reassembled in chunk order before the
//! reduce request is sent. Nothing is retried here; the first failing request aborts the call.

mod prompt;

use crate::config::Config;
use crate::model::{ModelClient, ModelRequest};
use crate::processing::chunking::chunk_text;
use crate::processing::types::{SummarizeError, SummaryOutcome, SummaryPhase, TextChunk};
use futures_util::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use std::sync::Arc;

/// Final summary recorded for documents with no text to summarize.
pub const EMPTY_DOCUMENT_SUMMARY: &str = "No extractable text found in document.";

const DEFAULT_CHUNK_MAX_CHARS: usize = 12_000;

/// Runs the map-reduce protocol against an injected model client.
///
/// Construct once per process and share it; it holds no per-document state.
#[derive(Clone)]
pub struct SummarizationEngine {
    client: Arc<dyn ModelClient>,
    model: String,
    chunk_max_chars: usize,
    map_concurrency: usize,
}

impl SummarizationEngine {
    /// Engine with default chunking and sequential map phase.
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            map_concurrency: 1,
        }
    }

    /// Engine configured from the model, chunk and concurrency settings in `config`.
    pub fn from_config(client: Arc<dyn ModelClient>, config: &Config) -> Self {
        Self::new(client, config.summary_model.clone())
            .with_chunk_max_chars(config.chunk_max_chars)
            .with_map_concurrency(config.map_concurrency)
    }

    /// Override the advisory chunk size.
    pub fn with_chunk_max_chars(mut self, chunk_max_chars: usize) -> Self {
        self.chunk_max_chars = chunk_max_chars;
        self
    }

    /// Allow up to `concurrency` map requests in flight (minimum 1).
    pub fn with_map_concurrency(mut self, concurrency: usize) -> Self {
        self.map_concurrency = concurrency.max(1);
        self
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Summarize `text`.
    ///
    /// Fails with [`SummarizeError::Configuration`] before any request when the client is not
    /// configured. Text that produces no chunks returns [`EMPTY_DOCUMENT_SUMMARY`] without
    /// contacting the model.
    pub async fn summarize(&self, text: &str) -> Result<SummaryOutcome, SummarizeError> {
        self.client
            .validate()
            .map_err(|error| SummarizeError::Configuration(error.to_string()))?;
        let chunks = chunk_text(text, self.chunk_max_chars)
            .map_err(|error| SummarizeError::Configuration(error.to_string()))?;

        if chunks.is_empty() {
            tracing::info!("No chunks to summarize; skipping model calls");
            return Ok(SummaryOutcome {
                final_summary: EMPTY_DOCUMENT_SUMMARY.to_string(),
                chunk_summaries: Vec::new(),
                model: self.model.clone(),
            });
        }

        let total = chunks.len();
        tracing::debug!(
            chunks = total,
            chunk_max_chars = self.chunk_max_chars,
            concurrency = self.map_concurrency,
            "Starting map phase"
        );
        let chunk_summaries: Vec<String> = stream::iter(chunks)
            .map(|chunk| self.summarize_chunk(chunk, total))
            .buffered(self.map_concurrency)
            .try_collect()
            .await?;

        tracing::debug!(summaries = chunk_summaries.len(), "Starting reduce phase");
        let final_summary = self
            .client
            .generate(ModelRequest {
                model: self.model.clone(),
                messages: prompt::reduce_messages(&chunk_summaries),
            })
            .await
            .map_err(|source| SummarizeError::ExternalCall {
                phase: SummaryPhase::Reduce,
                chunk_index: None,
                source,
            })?;

        Ok(SummaryOutcome {
            final_summary,
            chunk_summaries,
            model: self.model.clone(),
        })
    }

    async fn summarize_chunk(&self, chunk: TextChunk, total: usize) -> Result<String, SummarizeError> {
        tracing::debug!(chunk = chunk.index, total, "Summarizing chunk");
        self.client
            .generate(ModelRequest {
                model: self.model.clone(),
                messages: prompt::map_messages(chunk.index, total, &chunk.text),
            })
            .await
            .map_err(|source| SummarizeError::ExternalCall {
                phase: SummaryPhase::Map,
                chunk_index: Some(chunk.index),
                source,
            })
    }
}

/// Number of model requests a summary with `chunk_count` chunks required.
pub fn model_calls_for(chunk_count: usize) -> usize {
    if chunk_count == 0 { 0 } else { chunk_count + 1 }
}

/// Pull the key-points JSON object (`title`, `bullets`, `risks`, `actions`) out of a reduce
/// response, if the model produced one.
pub fn structured_key_points(final_summary: &str) -> Option<Value> {
    final_summary
        .match_indices('{')
        .filter_map(|(start, _)| {
            serde_json::Deserializer::from_str(&final_summary[start..])
                .into_iter::<Value>()
                .next()?
                .ok()
        })
        .find(|value| {
            value.as_object().is_some_and(|object| {
                KEY_POINT_FIELDS
                    .iter()
                    .any(|key| object.contains_key(*key))
            })
        })
}

const KEY_POINT_FIELDS: [&str; 4] = ["title", "bullets", "risks", "actions"];
