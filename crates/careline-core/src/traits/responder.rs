// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot responder trait for the automated reply collaborator.

use async_trait::async_trait;

use crate::traits::adapter::Adapter;

/// The automated responder serving bot-handled conversations.
///
/// `generate` is infallible by contract: on upstream failure or empty
/// context the implementation returns a graceful fallback string rather
/// than an error, so a responder outage can never fail an inbound message.
#[async_trait]
pub trait Responder: Adapter {
    /// Produce a reply for `query` given retrieval `context` and optional
    /// conversation `history`.
    async fn generate(&self, context: &str, query: &str, history: Option<&str>) -> String;
}
