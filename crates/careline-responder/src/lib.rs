// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot responder adapter backed by an OpenAI-compatible chat API.
//!
//! This crate implements [`Responder`] over the `/chat/completions`
//! endpoint shape served by Together AI and similar providers. The
//! responder is infallible by contract: any upstream failure produces the
//! configured fallback reply instead of an error, so a provider outage can
//! never fail an inbound message.

pub mod client;
pub mod types;

pub use client::ChatClient;

use async_trait::async_trait;
use tracing::{info, warn};

use careline_config::model::ResponderConfig;
use careline_core::types::{AdapterType, HealthStatus};
use careline_core::{Adapter, CarelineError, Responder};

use crate::types::ChatMessage;

/// Chat-API responder implementing [`Responder`].
pub struct ApiResponder {
    client: ChatClient,
    fallback: String,
    configured: bool,
}

impl ApiResponder {
    /// Creates a responder from configuration.
    ///
    /// `fallback` is the reply returned whenever the upstream API fails or
    /// produces an empty completion. An empty `api_key` still constructs a
    /// working responder; it will simply fall back on every request and
    /// report itself degraded.
    pub fn new(config: &ResponderConfig, fallback: String) -> Result<Self, CarelineError> {
        let configured = !config.api_key.is_empty();
        let client = ChatClient::new(config)?;
        info!(
            model = config.model.as_str(),
            configured, "chat responder initialized"
        );
        Ok(Self {
            client,
            fallback,
            configured,
        })
    }
}

#[async_trait]
impl Adapter for ApiResponder {
    fn name(&self) -> &str {
        "chat-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Responder
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        if self.configured {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(
                "responder API key not configured, serving fallback replies".to_string(),
            ))
        }
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl Responder for ApiResponder {
    async fn generate(&self, context: &str, query: &str, history: Option<&str>) -> String {
        let mut messages = vec![ChatMessage::system(context)];
        if let Some(history) = history {
            messages.push(ChatMessage::system(format!(
                "Conversation so far:\n{history}"
            )));
        }
        messages.push(ChatMessage::user(query));

        match self.client.complete(messages).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("empty completion, using fallback reply");
                self.fallback.clone()
            }
            Err(e) => {
                warn!(error = %e, "completion failed, using fallback reply");
                self.fallback.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_responder(base_url: &str) -> ApiResponder {
        let config = ResponderConfig {
            api_url: base_url.to_string(),
            api_key: "test-api-key".to_string(),
            model: "test-model".to_string(),
            max_tokens: 64,
            timeout_secs: 5,
            ..ResponderConfig::default()
        };
        ApiResponder::new(&config, "I am having trouble right now.".to_string()).unwrap()
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })
    }

    #[tokio::test]
    async fn generate_returns_completion_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "be supportive"},
                    {"role": "user", "content": "I feel anxious"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("take a breath")))
            .mount(&server)
            .await;

        let responder = test_responder(&server.uri());
        let reply = responder.generate("be supportive", "I feel anxious", None).await;
        assert_eq!(reply, "take a breath");
    }

    #[tokio::test]
    async fn generate_folds_history_into_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "ctx"},
                    {"role": "system", "content": "Conversation so far:\nuser: earlier\n"},
                    {"role": "user", "content": "and now?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("continuing")))
            .mount(&server)
            .await;

        let responder = test_responder(&server.uri());
        let reply = responder
            .generate("ctx", "and now?", Some("user: earlier\n"))
            .await;
        assert_eq!(reply, "continuing");
    }

    #[tokio::test]
    async fn generate_falls_back_on_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let responder = test_responder(&server.uri());
        let reply = responder.generate("ctx", "hello", None).await;
        assert_eq!(reply, "I am having trouble right now.");
    }

    #[tokio::test]
    async fn generate_falls_back_on_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("   ")))
            .mount(&server)
            .await;

        let responder = test_responder(&server.uri());
        let reply = responder.generate("ctx", "hello", None).await;
        assert_eq!(reply, "I am having trouble right now.");
    }

    #[tokio::test]
    async fn health_degraded_without_api_key() {
        let config = ResponderConfig {
            api_key: String::new(),
            ..ResponderConfig::default()
        };
        let responder = ApiResponder::new(&config, "fallback".to_string()).unwrap();
        match responder.health_check().await.unwrap() {
            HealthStatus::Degraded(reason) => assert!(reason.contains("API key")),
            other => panic!("expected degraded, got {other:?}"),
        }

        let configured = ResponderConfig {
            api_key: "k".to_string(),
            ..ResponderConfig::default()
        };
        let responder = ApiResponder::new(&configured, "fallback".to_string()).unwrap();
        assert_eq!(responder.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
