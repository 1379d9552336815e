// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Careline's pluggable seams.
//!
//! All adapters extend the [`Adapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod responder;
pub mod store;
pub mod transport;

// Re-export all traits at the traits module level for convenience.
pub use adapter::Adapter;
pub use responder::Responder;
pub use store::Store;
pub use transport::ChannelTransport;
