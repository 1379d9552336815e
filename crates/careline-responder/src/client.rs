// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible chat completions endpoint.
//!
//! Provides [`ChatClient`] which handles request construction, bearer
//! authentication, and transient error retry.

use std::time::Duration;

use careline_core::CarelineError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use careline_config::model::ResponderConfig;

use crate::types::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};

/// Endpoint path appended to the configured base URL.
const COMPLETIONS_PATH: &str = "/chat/completions";

/// HTTP client for chat completion requests.
///
/// Manages the bearer authentication header, connection pooling, and retry
/// logic for transient errors (429, 500, 502, 503).
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

impl ChatClient {
    /// Creates a new client from the responder configuration.
    pub fn new(config: &ResponderConfig) -> Result<Self, CarelineError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| {
                CarelineError::Config(format!("invalid responder API key header value: {e}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CarelineError::Responder {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: 1,
        })
    }

    /// The model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one completion request and returns the assistant text.
    ///
    /// On transient errors (429, 500, 502, 503), retries once after a
    /// 1-second delay.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CarelineError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
        };
        let url = format!("{}{COMPLETIONS_PATH}", self.base_url);

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| CarelineError::Responder {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| CarelineError::Responder {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let parsed: ChatResponse =
                    serde_json::from_str(&body).map_err(|e| CarelineError::Responder {
                        message: format!("failed to parse API response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let Some(choice) = parsed.choices.into_iter().next() else {
                    return Err(CarelineError::Responder {
                        message: "completion response had no choices".into(),
                        source: None,
                    });
                };
                return Ok(choice.message.content);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(CarelineError::Responder {
                    message: format!("API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Non-transient error or exhausted retries.
            let body = response.text().await.unwrap_or_default();
            let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                format!("chat API error: {}", api_err.error.message)
            } else {
                format!("API returned {status}: {body}")
            };
            return Err(CarelineError::Responder {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| CarelineError::Responder {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ChatClient {
        let config = ResponderConfig {
            api_url: base_url.to_string(),
            api_key: "test-api-key".to_string(),
            model: "test-model".to_string(),
            max_tokens: 64,
            timeout_secs: 5,
            ..ResponderConfig::default()
        };
        ChatClient::new(&config).unwrap()
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "cmpl-test",
            "choices": [{
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn complete_returns_assistant_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("hi there")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn complete_sends_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete(vec![ChatMessage::user("hi")]).await;
        assert!(result.is_ok(), "bearer header should match: {result:?}");
    }

    #[tokio::test]
    async fn complete_retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("after retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let text = client
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn complete_fails_on_400_with_api_message() {
        let server = MockServer::start().await;
        let error_body = serde_json::json!({
            "error": {"message": "model not found", "type": "invalid_request_error"}
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(&error_body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model not found"), "got: {err}");
    }

    #[tokio::test]
    async fn complete_exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete(vec![ChatMessage::user("hello")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cmpl-empty", "choices": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"), "got: {err}");
    }
}
