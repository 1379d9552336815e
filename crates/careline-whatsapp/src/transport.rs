// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound WhatsApp transport over the gateway's REST API.
//!
//! Sends text messages through `POST /messages/text` with bearer
//! authentication and exponential-backoff retry. A send that exhausts its
//! retries surfaces as [`CarelineError::Unreachable`] so the dispatcher
//! can fall over to the counsellor's next channel.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use careline_config::model::RouteConfig;
use careline_core::types::{AdapterType, HealthStatus, MessageId};
use careline_core::{Adapter, CarelineError, ChannelTransport};

use crate::payload::CHANNEL_KIND;

/// Endpoint path for text sends, appended to the configured base URL.
const SEND_TEXT_PATH: &str = "/messages/text";

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);
const BACKOFF_FACTOR: f64 = 2.0;

/// WhatsApp gateway transport implementing [`ChannelTransport`].
pub struct WhatsAppTransport {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct SendTextRequest {
    to: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct SendTextResponse {
    #[serde(default)]
    sent: bool,
    #[serde(default)]
    message: Option<SentMessageRef>,
}

#[derive(Debug, Deserialize)]
struct SentMessageRef {
    #[serde(default)]
    id: Option<String>,
}

/// Outcome of one delivery attempt.
enum Attempt {
    Sent(MessageId),
    /// Worth retrying: network failure, timeout, transient status, or the
    /// provider reporting `sent: false`.
    Retryable(String),
    /// Not worth retrying: client errors such as 401 or 404.
    Fatal(CarelineError),
}

impl WhatsAppTransport {
    /// Creates a transport from the whatsapp route configuration.
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

    async fn attempt_send(&self, url: &str, token: &str, payload: &SendTextRequest) -> Attempt {
        let response = match self
            .client
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retryable(format!("HTTP request failed: {e}")),
        };

        let status = response.status();
        if status.is_success() {
            let body: SendTextResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    return Attempt::Fatal(CarelineError::Channel {
                        message: format!("failed to parse gateway response: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            };
            if !body.sent {
                return Attempt::Retryable("gateway reported sent: false".to_string());
            }
            let id = body
                .message
                .and_then(|m| m.id)
                .unwrap_or_else(|| format!("wa-{}", uuid::Uuid::new_v4()));
            return Attempt::Sent(MessageId(id));
        }

        if is_transient_error(status) {
            Attempt::Retryable(format!("gateway returned {status}"))
        } else {
            let body = response.text().await.unwrap_or_default();
            Attempt::Fatal(CarelineError::Channel {
                message: format!("gateway returned {status}: {body}"),
                source: None,
            })
        }
    }
}

#[async_trait]
impl Adapter for WhatsAppTransport {
    fn name(&self) -> &str {
        "whapi"
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
                "whatsapp route token not configured".to_string(),
            ));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for WhatsAppTransport {
    fn kind(&self) -> &str {
        CHANNEL_KIND
    }

    /// Delivers `content` to `recipient`.
    ///
    /// `auth_key` overrides the route-level token when the binding carries
    /// its own credential. `channel_id` is the recipient address on this
    /// channel and is folded into the destination.
    async fn send(
        &self,
        channel_id: &str,
        auth_key: Option<&str>,
        recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError> {
        let token = auth_key
            .map(str::to_string)
            .or_else(|| self.api_token.clone())
            .ok_or_else(|| CarelineError::Channel {
                message: "no API token configured for the whatsapp route".to_string(),
                source: None,
            })?;

        // The binding's channel id is the WhatsApp address; direct user
        // sends pass the same value for both.
        let to = if channel_id.is_empty() {
            recipient
        } else {
            channel_id
        };
        let url = format!("{}{SEND_TEXT_PATH}", self.api_url);
        let payload = SendTextRequest {
            to: to.to_string(),
            body: content.to_string(),
        };

        let attempts = self.max_retries + 1;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying whatsapp send after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt_send(&url, &token, &payload).await {
                Attempt::Sent(id) => {
                    if attempt > 0 {
                        info!(attempt, to = to, "whatsapp send succeeded after retry");
                    }
                    return Ok(id);
                }
                Attempt::Retryable(reason) => {
                    warn!(attempt, to = to, reason = reason.as_str(), "whatsapp send attempt failed");
                }
                Attempt::Fatal(error) => return Err(error),
            }
        }

        Err(CarelineError::Unreachable {
            target: format!("whatsapp:{to}"),
            attempts: attempts as usize,
        })
    }
}

/// Exponential backoff with up to 10% jitter, capped at [`MAX_DELAY`].
fn backoff_delay(retry_index: u32) -> Duration {
    let exp = BASE_DELAY.as_secs_f64() * BACKOFF_FACTOR.powi(retry_index as i32);
    let capped = exp.min(MAX_DELAY.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(0.0..=0.1) * capped;
    Duration::from_secs_f64(capped + jitter)
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
