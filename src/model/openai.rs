use super::{ChatMessage, ModelClient, ModelClientError, ModelRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Adapter for the OpenAI Responses API (`POST {base}/responses`).
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Create an adapter with a default HTTP client.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_http(Client::new(), base_url.into(), api_key)
    }

    pub(crate) fn with_http(http: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ResponsesPayload<'a> {
    model: &'a str,
    input: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesBody {
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text {
            return Some(text);
        }
        let parts: Vec<String> = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|content| content.kind == "output_text")
            .filter_map(|content| content.text)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn validate(&self) -> Result<(), ModelClientError> {
        if self.api_key.is_none() {
            return Err(ModelClientError::NotConfigured(
                "OPENAI_API_KEY is required for summarization".into(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ModelClientError::NotConfigured(
                "OPENAI_BASE_URL must not be empty".into(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, request: ModelRequest) -> Result<String, ModelClientError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ModelClientError::NotConfigured("OPENAI_API_KEY is required for summarization".into())
        })?;
        let payload = ResponsesPayload {
            model: &request.model,
            input: &request.messages,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ModelClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelClientError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: ResponsesBody = response.json().await.map_err(|error| {
            ModelClientError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        body.into_text().ok_or_else(|| {
            ModelClientError::InvalidResponse("response contained no output text".into())
        })
    }
}
