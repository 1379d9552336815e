// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel transport for deterministic testing.
//!
//! `MockTransport` implements `ChannelTransport` with captured outbound
//! sends, scripted failures for failover tests, and an optional artificial
//! delay for timeout tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use careline_core::types::{AdapterType, HealthStatus, MessageId};
use careline_core::{Adapter, CarelineError, ChannelTransport};

/// One captured outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub auth_key: Option<String>,
    pub recipient: String,
    pub content: String,
}

/// A mock channel transport for testing.
///
/// Every successful `send()` is captured and retrievable via
/// `sent_messages()`. Failure behavior is scripted:
/// - `fail_next(n)` makes the next `n` sends return a channel error
/// - `set_delay(d)` makes every send sleep first, for timeout tests
/// - `set_unhealthy(reason)` changes what `health_check()` reports
pub struct MockTransport {
    kind: String,
    name: String,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_remaining: Arc<Mutex<u32>>,
    delay: Arc<Mutex<Option<Duration>>>,
    health: Arc<Mutex<HealthStatus>>,
    notify: Arc<Notify>,
}

impl MockTransport {
    /// Create a mock transport serving the given channel kind.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: format!("mock-{kind}"),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_remaining: Arc::new(Mutex::new(0)),
            delay: Arc::new(Mutex::new(None)),
            health: Arc::new(Mutex::new(HealthStatus::Healthy)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Script the next `n` sends to fail with a channel error.
    pub async fn fail_next(&self, n: u32) {
        *self.fail_remaining.lock().await = n;
    }

    /// Make every send sleep for `delay` before completing.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Make `health_check()` report an unhealthy transport.
    pub async fn set_unhealthy(&self, reason: &str) {
        *self.health.lock().await = HealthStatus::Unhealthy(reason.to_string());
    }

    /// Get all messages that were delivered through `send()`.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of delivered messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all captured messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Wait until some captured message matches `predicate`, or the
    /// timeout elapses. Returns whether a match was seen.
    pub async fn wait_for_matching<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&SentMessage) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.sent.lock().await.iter().any(&predicate) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[async_trait]
impl Adapter for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(self.health.lock().await.clone())
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn send(
        &self,
        channel_id: &str,
        auth_key: Option<&str>,
        recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError> {
        if let Some(delay) = *self.delay.lock().await {
            tokio::time::sleep(delay).await;
        }
        {
            let mut remaining = self.fail_remaining.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CarelineError::Channel {
                    message: format!("scripted failure on {}", self.kind),
                    source: None,
                });
            }
        }
        self.sent.lock().await.push(SentMessage {
            channel_id: channel_id.to_string(),
            auth_key: auth_key.map(str::to_string),
            recipient: recipient.to_string(),
            content: content.to_string(),
        });
        self.notify.notify_one();
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }
}
