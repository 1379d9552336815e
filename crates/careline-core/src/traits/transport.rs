// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel transport trait for outbound provider integrations.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::Adapter;
use crate::types::MessageId;

/// Uniform outbound send capability over one channel type.
///
/// The dispatcher selects a transport by the channel binding's `kind` tag
/// and iterates a counsellor's bindings in priority order; no transport is
/// aware of failover. A send either returns the provider's message id or a
/// channel error; transports must not swallow failures, since a failed
/// attempt is what drives fallback to the next channel.
#[async_trait]
pub trait ChannelTransport: Adapter {
    /// Channel type tag this transport serves, e.g. `whatsapp`.
    fn kind(&self) -> &str;

    /// Deliver `content` to `recipient` through the endpoint `channel_id`.
    ///
    /// `auth_key` is the per-binding credential, when the binding carries
    /// one; transports with route-level credentials may ignore it.
    async fn send(
        &self,
        channel_id: &str,
        auth_key: Option<&str>,
        recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError>;
}
