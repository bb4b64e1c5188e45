//! Ollama completion provider (`/api/generate`, non-streaming)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::client::{
    CompletionGateway, CompletionRequest, CompletionResponse, ContinuationToken,
};
use crate::retry::{RetryConfig, send_with_retry};

/// Model load plus generation on a cold start
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama client
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    retry_config: RetryConfig,
}

impl OllamaClient {
    /// Create a new client posting to the full generate endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: build_http_client(GENERATE_TIMEOUT),
            endpoint: endpoint.into(),
            model: "Smooj".to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    context: &'a [i64],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    context: Option<Vec<i64>>,
}

#[async_trait]
impl CompletionGateway for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = GenerateRequest {
            model,
            prompt: &request.prompt,
            stream: false,
            context: request.context.as_slice(),
            images: &request.images,
        };

        tracing::debug!(
            model,
            context_len = request.context.len(),
            images = request.images.len(),
            "Sending completion request"
        );

        let response = send_with_retry(&self.retry_config, "ollama", || {
            self.client.post(&self.endpoint).json(&body)
        })
        .await?;

        let raw = response.text().await?;
        let data: GenerateResponse = serde_json::from_str(&raw).map_err(|err| {
            tracing::error!("Unparseable completion response: {}", raw);
            AiError::MalformedResponse(format!("completion body: {}", err))
        })?;

        let text = data.response.ok_or_else(|| {
            AiError::MalformedResponse("completion body has no `response` field".to_string())
        })?;

        Ok(CompletionResponse {
            text,
            context: ContinuationToken::from_values(data.context.unwrap_or_default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::new(format!("{}/api/generate", server.uri()))
            .with_model("Smooj")
            .with_retry_config(RetryConfig::none())
    }

    #[tokio::test]
    async fn test_complete_threads_context_and_images() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "Smooj",
                "prompt": "Alice says: hi",
                "stream": false,
                "context": [0],
                "images": ["aGk="]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "hello Alice",
                "context": [7, 8, 9],
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .complete(
                CompletionRequest::new("Alice says: hi")
                    .with_context(ContinuationToken::seed())
                    .with_images(vec!["aGk=".to_string()]),
            )
            .await
            .expect("completion should succeed");

        assert_eq!(response.text, "hello Alice");
        assert_eq!(response.context.as_slice(), &[7, 8, 9]);
    }

    #[tokio::test]
    async fn test_complete_uses_model_override() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({ "model": "llama3.2", "context": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "summary"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .complete(CompletionRequest::new("summarize").with_model("llama3.2"))
            .await
            .expect("completion should succeed");

        assert_eq!(response.text, "summary");
        assert!(response.context.is_empty());
    }

    #[tokio::test]
    async fn test_missing_response_field_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("hi"))
            .await
            .expect_err("missing field should fail");

        assert!(matches!(err, AiError::MalformedResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("hi"))
            .await
            .expect_err("invalid json should fail");

        assert!(matches!(err, AiError::MalformedResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_server_error_is_reported_with_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("hi"))
            .await
            .expect_err("500 should fail");

        match err {
            AiError::ServiceHttp {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert!(message.contains("model crashed"));
            }
            other => panic!("Expected ServiceHttp, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "recovered",
                "context": [1]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(format!("{}/api/generate", server.uri()))
            .with_retry_config(RetryConfig {
                max_retries: 1,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                backoff_multiplier: 1.0,
            });

        let response = client
            .complete(CompletionRequest::new("hi"))
            .await
            .expect("retry should recover");
        assert_eq!(response.text, "recovered");
    }
}
