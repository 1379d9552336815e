// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle contract shared by pluggable components.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::types::{AdapterType, HealthStatus};

/// Implemented by every pluggable component: channel transports, the
/// responder, and the store.
///
/// The gateway's health endpoint aggregates [`Adapter::health_check`]
/// across components, and `serve` calls [`Adapter::shutdown`] while
/// draining.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Name reported in health output and logs.
    fn name(&self) -> &str;

    /// Component version, independent of the crate version.
    fn version(&self) -> semver::Version;

    /// Which kind of component this is.
    fn adapter_type(&self) -> AdapterType;

    /// Probes the component's backing service.
    async fn health_check(&self) -> Result<HealthStatus, CarelineError>;

    /// Releases held resources. Called once while the service drains.
    async fn shutdown(&self) -> Result<(), CarelineError>;
}
