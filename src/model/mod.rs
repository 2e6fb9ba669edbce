//! Contract for the external language-model collaborator and its HTTP adapters.
//!
//! The summarization engine only sees [`ModelClient`]; which backend answers is decided once
//! at startup by [`build_model_client`] and the resulting handle is passed in explicitly.
//! Adapters never retry: a failed request is returned to the caller as-is.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::{Config, ModelProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by model adapters.
#[derive(Debug, Error)]
pub enum ModelClientError {
    /// Credential or endpoint missing; detected before any request is sent.
    #[error("Model provider not configured: {0}")]
    NotConfigured(String),
    /// Provider could not be reached.
    #[error("Model provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider rejected the request because of rate limiting.
    #[error("Model provider rate limited the request: {0}")]
    RateLimited(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Speaker tag attached to each message of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing instruction for the model.
    System,
    /// Content and task for this turn.
    User,
}

/// One role-tagged instruction/content pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker of this message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request payload passed to a model adapter.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Ordered conversation sent to the model.
    pub messages: Vec<ChatMessage>,
}

/// Interface implemented by text-generation backends.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Check that the credential and endpoint are present. Performs no I/O.
    fn validate(&self) -> Result<(), ModelClientError> {
        Ok(())
    }

    /// Generate text for the given conversation.
    async fn generate(&self, request: ModelRequest) -> Result<String, ModelClientError>;
}

/// Build the model client selected by configuration.
///
/// Construction never fails on a missing credential; that is reported by
/// [`ModelClient::validate`] so the engine can fail fast before the first call.
pub fn build_model_client(config: &Config) -> Result<Arc<dyn ModelClient>, ModelClientError> {
    let http = build_http_client(config.model_timeout_secs)?;
    let client: Arc<dyn ModelClient> = match config.model_provider {
        ModelProvider::OpenAI => Arc::new(OpenAiClient::with_http(
            http,
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
        )),
        ModelProvider::Ollama => Arc::new(OllamaClient::with_http(http, config.ollama_url.clone())),
    };
    tracing::info!(provider = ?config.model_provider, "Model client initialized");
    Ok(client)
}

fn build_http_client(timeout_secs: Option<u64>) -> Result<Client, ModelClientError> {
    let mut builder = Client::builder().user_agent("docsum/summary");
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(|error| {
        ModelClientError::NotConfigured(format!("failed to construct HTTP client: {error}"))
    })
}
