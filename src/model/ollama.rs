use super::{ChatMessage, ModelClient, ModelClientError, ModelRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Adapter for a local Ollama runtime (`POST {base}/api/chat`).
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create an adapter with a default HTTP client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url.into())
    }

    pub(crate) fn with_http(http: Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn validate(&self) -> Result<(), ModelClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ModelClientError::NotConfigured(
                "OLLAMA_URL must not be empty".into(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, request: ModelRequest) -> Result<String, ModelClientError> {
        let payload = ChatPayload {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            // Lower temperature for deterministic summaries.
            options: json!({ "temperature": 0.1 }),
        };

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ModelClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ModelClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            ModelClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ModelClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request() -> ModelRequest {
        ModelRequest {
            model: "llama3".into(),
            messages: vec![ChatMessage::user("Summarize")],
        }
    }

    #[tokio::test]
    async fn returns_trimmed_message_content() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"model":"llama3","stream":false}"#);
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "  Summary text\n" },
                    "done": true
                }));
            })
            .await;

        let summary = client.generate(request()).await.expect("summary");
        mock.assert_async().await;
        assert_eq!(summary, "Summary text");
    }

    #[tokio::test]
    async fn surfaces_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("boom");
            })
            .await;

        let error = client.generate(request()).await.expect_err("error response");
        assert!(
            matches!(error, ModelClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn incomplete_response_is_rejected() {
        let server = MockServer::start_async().await;
        let client = OllamaClient::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "partial" },
                    "done": false
                }));
            })
            .await;

        let error = client.generate(request()).await.expect_err("incomplete");
        assert!(matches!(error, ModelClientError::InvalidResponse(_)));
    }
}
