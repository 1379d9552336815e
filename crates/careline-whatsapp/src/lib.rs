// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel integration for Careline.
//!
//! Two halves live here:
//!
//! - [`payload`] normalizes inbound webhook envelopes into
//!   [`careline_core::types::InboundMessage`] values, dropping own echoes
//!   and entries without usable content.
//! - [`transport`] implements [`careline_core::ChannelTransport`] over the
//!   gateway's `POST /messages/text` endpoint with bearer auth and
//!   exponential-backoff retry.

pub mod payload;
pub mod transport;

pub use payload::{normalize, WebhookPayload, CHANNEL_KIND};
pub use transport::WhatsAppTransport;
