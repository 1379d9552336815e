// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Careline integration tests.
//!
//! Provides mock adapters and harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockTransport`] - Mock channel transport with scripted failures and capture
//! - [`MockResponder`] - Mock bot responder with pre-configured replies
//! - [`RoutingHarness`] - A fully wired engine over a temp-file store

pub mod harness;
pub mod mock_responder;
pub mod mock_transport;

pub use harness::RoutingHarness;
pub use mock_responder::MockResponder;
pub use mock_transport::{MockTransport, SentMessage};
