// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web counselling console channel adapter.
//!
//! Counsellors working from the web console receive messages in chat
//! rooms. A counsellor's binding stores the room slug as its channel id,
//! and delivery is a `POST /rooms/{slug}/messages` against the console
//! API with bearer authentication. Transient upstream errors are retried
//! a configured number of times before the room is declared unreachable.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use careline_config::model::RouteConfig;
use careline_core::types::{AdapterType, HealthStatus, MessageId};
use careline_core::{Adapter, CarelineError, ChannelTransport};

/// Channel kind tag counsellor bindings use for the web console.
pub const CHANNEL_KIND: &str = "webchat";

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Console room transport implementing [`ChannelTransport`].
pub struct WebchatTransport {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct RoomMessageRequest {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct RoomMessageResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

impl WebchatTransport {
    /// Creates a transport from the webchat route configuration.
    pub fn new(config: &RouteConfig) -> Result<Self, CarelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CarelineError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Adapter for WebchatTransport {
    fn name(&self) -> &str {
        "webchat-console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        if self.api_token.is_none() {
            return Ok(HealthStatus::Degraded(
                "webchat route token not configured".to_string(),
            ));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for WebchatTransport {
    fn kind(&self) -> &str {
        CHANNEL_KIND
    }

    /// Posts `content` into the room named by `channel_id`.
    async fn send(
        &self,
        channel_id: &str,
        auth_key: Option<&str>,
        _recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError> {
        let token = auth_key
            .map(str::to_string)
            .or_else(|| self.api_token.clone())
            .ok_or_else(|| CarelineError::Channel {
                message: "no API token configured for the webchat route".to_string(),
                source: None,
            })?;

        let url = format!("{}/rooms/{channel_id}/messages", self.api_url);
        let payload = RoomMessageRequest {
            text: content.to_string(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(room = channel_id, attempt, "retrying console send after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .json(&payload)
                .send()
                .await
                .map_err(|e| CarelineError::Channel {
                    message: format!("console request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            if status.is_success() {
                let body: RoomMessageResponse = response.json().await.unwrap_or_default();
                let id = match body.id {
                    Some(serde_json::Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => format!("wc-{}", uuid::Uuid::new_v4()),
                };
                return Ok(MessageId(id));
            }

            if is_transient_error(status) {
                warn!(
                    room = channel_id,
                    status = status.as_u16(),
                    attempt,
                    "console send returned transient error"
                );
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(CarelineError::Channel {
                message: format!("console returned {status}: {body}"),
                source: None,
            });
        }

        Err(CarelineError::Unreachable {
            target: format!("webchat:{channel_id}"),
            attempts: (self.max_retries + 1) as usize,
        })
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

    fn test_transport(base_url: &str, max_retries: u32) -> WebchatTransport {
        WebchatTransport::new(&RouteConfig {
            api_url: base_url.to_string(),
            api_token: Some("console-token".to_string()),
            timeout_secs: 5,
            max_retries,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn send_posts_text_into_the_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/wa_u1_ada/messages"))
            .and(header("authorization", "Bearer console-token"))
            .and(body_partial_json(serde_json::json!({"text": "hello"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 42})),
            )
            .mount(&server)
            .await;

        let transport = test_transport(&server.uri(), 0);
        let id = transport
            .send("wa_u1_ada", None, "wa_u1_ada", "hello")
            .await
            .unwrap();
        assert_eq!(id.0, "42");
    }

    #[tokio::test]
    async fn binding_auth_key_overrides_route_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/desk-ada/messages"))
            .and(header("authorization", "Bearer ada-key"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let transport = test_transport(&server.uri(), 0);
        let id = transport
            .send("desk-ada", Some("ada-key"), "desk-ada", "brief")
            .await
            .unwrap();
        assert!(id.0.starts_with("wc-"), "synthetic id expected: {}", id.0);
    }

    #[tokio::test]
    async fn transient_error_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/desk-ada/messages"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rooms/desk-ada/messages"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "m1"})),
            )
            .mount(&server)
            .await;

        let transport = test_transport(&server.uri(), 1);
        let id = transport.send("desk-ada", None, "desk-ada", "hi").await.unwrap();
        assert_eq!(id.0, "m1");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/desk-ada/messages"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let transport = test_transport(&server.uri(), 1);
        let err = transport
            .send("desk-ada", None, "desk-ada", "hi")
            .await
            .unwrap_err();
        match err {
            CarelineError::Unreachable { target, attempts } => {
                assert_eq!(target, "webchat:desk-ada");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected unreachable, got {other}"),
        }
    }

    #[tokio::test]
    async fn missing_room_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/gone/messages"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such room"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = test_transport(&server.uri(), 3);
        let err = transport.send("gone", None, "gone", "hi").await.unwrap_err();
        match err {
            CarelineError::Channel { message, .. } => {
                assert!(message.contains("404"), "got: {message}");
            }
            other => panic!("expected channel error, got {other}"),
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_channel_error() {
        let transport = WebchatTransport::new(&RouteConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_token: None,
            timeout_secs: 1,
            max_retries: 0,
        })
        .unwrap();
        let err = transport.send("desk", None, "desk", "hi").await.unwrap_err();
        assert!(err.to_string().contains("token"), "got: {err}");
    }
}
