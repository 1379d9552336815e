// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel dispatcher: outbound delivery with per-counsellor failover.
//!
//! Transports register under their channel kind tag. Counsellor delivery
//! walks the bindings the store returns (already in ascending
//! `order_priority`) and reports [`DeliveryResult`] instead of an error:
//! exhausting every channel is routing data, not a fault.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use careline_core::{
    CarelineError, ChannelBinding, ChannelTransport, DeliveryResult, HealthStatus, MessageId,
};
use tracing::{debug, warn};

/// Routes outbound messages to the transport serving a channel kind.
pub struct Dispatcher {
    transports: HashMap<String, Arc<dyn ChannelTransport>>,
    /// Bound per delivery attempt; an attempt that exceeds it counts as
    /// that channel's failure, never as cancellation of the whole send.
    attempt_timeout: Duration,
}

impl Dispatcher {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            transports: HashMap::new(),
            attempt_timeout,
        }
    }

    /// Registers a transport under its `kind()` tag, replacing any
    /// previous transport for that kind.
    pub fn register(&mut self, transport: Arc<dyn ChannelTransport>) {
        self.transports.insert(transport.kind().to_string(), transport);
    }

    pub fn transport(&self, kind: &str) -> Option<Arc<dyn ChannelTransport>> {
        self.transports.get(kind).cloned()
    }

    /// Registered channel kinds, sorted for stable logs and health output.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.transports.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Delivers to an end user over one channel kind.
    ///
    /// Users have no binding row; their address doubles as the endpoint
    /// identifier and the route-level credential applies.
    pub async fn send_to_user(
        &self,
        kind: &str,
        recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError> {
        let transport = self.transports.get(kind).ok_or_else(|| {
            CarelineError::Channel {
                message: format!("no transport registered for channel kind `{kind}`"),
                source: None,
            }
        })?;
        self.attempt(transport, recipient, None, recipient, content)
            .await
    }

    /// Delivers to a counsellor, trying bindings in the order given.
    ///
    /// The first successful send wins. Individual failures are logged and
    /// absorbed; only the overall outcome is reported.
    pub async fn send_to_counsellor(
        &self,
        bindings: &[ChannelBinding],
        content: &str,
    ) -> DeliveryResult {
        let mut attempts = 0;
        for binding in bindings {
            attempts += 1;
            let Some(transport) = self.transports.get(&binding.kind) else {
                warn!(
                    kind = binding.kind.as_str(),
                    counsellor_id = %binding.counsellor_id,
                    "no transport registered for counsellor channel"
                );
                continue;
            };
            match self
                .attempt(
                    transport,
                    &binding.channel_id,
                    binding.auth_key.as_deref(),
                    &binding.channel_id,
                    content,
                )
                .await
            {
                Ok(message_id) => {
                    debug!(
                        kind = binding.kind.as_str(),
                        counsellor_id = %binding.counsellor_id,
                        "counsellor delivery succeeded"
                    );
                    return DeliveryResult::Delivered {
                        channel: binding.kind.clone(),
                        message_id,
                    };
                }
                Err(e) => {
                    warn!(
                        kind = binding.kind.as_str(),
                        counsellor_id = %binding.counsellor_id,
                        error = %e,
                        "channel attempt failed, falling back"
                    );
                }
            }
        }
        DeliveryResult::Undeliverable { attempts }
    }

    async fn attempt(
        &self,
        transport: &Arc<dyn ChannelTransport>,
        channel_id: &str,
        auth_key: Option<&str>,
        recipient: &str,
        content: &str,
    ) -> Result<MessageId, CarelineError> {
        match tokio::time::timeout(
            self.attempt_timeout,
            transport.send(channel_id, auth_key, recipient, content),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CarelineError::Timeout {
                duration: self.attempt_timeout,
            }),
        }
    }

    /// Aggregated health over every registered transport. Any child issue
    /// degrades the whole dispatcher with the reasons joined.
    pub async fn health_check_all(&self) -> Result<HealthStatus, CarelineError> {
        let mut reasons = Vec::new();
        for kind in self.kinds() {
            let transport = &self.transports[&kind];
            match transport.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    reasons.push(format!("{kind}: {reason}"));
                }
            }
        }
        if reasons.is_empty() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(reasons.join("; ")))
        }
    }

    /// Shuts down every transport, logging rather than propagating
    /// individual failures.
    pub async fn shutdown_all(&self) {
        for (kind, transport) in &self.transports {
            if let Err(e) = transport.shutdown().await {
                warn!(kind = kind.as_str(), error = %e, "transport shutdown error");
            }
        }
    }
}
