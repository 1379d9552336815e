// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock bot responder for deterministic testing.
//!
//! `MockResponder` implements `Responder` with pre-configured replies and
//! records every prompt it was asked to answer, enabling assertions on the
//! context and history the engine supplies.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use careline_core::types::{AdapterType, HealthStatus};
use careline_core::{Adapter, CarelineError, Responder};

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub context: String,
    pub query: String,
    pub history: Option<String>,
}

/// A mock responder that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a
/// default "mock reply" text is returned.
pub struct MockResponder {
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<RecordedPrompt>>>,
}

impl MockResponder {
    /// Create a new mock responder with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock responder pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn add_reply(&self, text: String) {
        self.replies.lock().await.push_back(text);
    }

    /// Get every prompt asked of this responder, in call order.
    pub async fn calls(&self) -> Vec<RecordedPrompt> {
        self.calls.lock().await.clone()
    }

    /// Get the number of `generate` calls made.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockResponder {
    fn name(&self) -> &str {
        "mock-responder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Responder
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        Ok(())
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn generate(&self, context: &str, query: &str, history: Option<&str>) -> String {
        self.calls.lock().await.push(RecordedPrompt {
            context: context.to_string(),
            query: query.to_string(),
            history: history.map(str::to_string),
        });
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock reply".to_string())
    }
}
