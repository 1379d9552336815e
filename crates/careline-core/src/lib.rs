// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Careline ticket routing engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Careline workspace: the error taxonomy
//! the routing engine recovers around, the User/Ticket/Counsellor/Channel/
//! Message data model, and the adapter seams (channel transport, bot
//! responder, persistence store) the engine is wired against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CarelineError;
pub use types::{
    AdapterType, ChannelBinding, ClassifierSignal, Counsellor, CounsellorId, DeliveryResult,
    Handler, HealthStatus, InboundMessage, MessageId, MessageKind, MessageRecord, NewMessage,
    SelectionStrategy, StoreStats, Ticket, TicketId, TicketStatus, User, UserId,
};

// Re-export all adapter traits at crate root.
pub use traits::{Adapter, ChannelTransport, Responder, Store};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn careline_error_has_all_variants() {
        // Verify all 9 error variants exist and can be constructed.
        let _not_found = CarelineError::NotFound {
            entity: "user",
            id: "u-1".into(),
        };
        let _conflict = CarelineError::Conflict("counsellor already bound".into());
        let _unreachable = CarelineError::Unreachable {
            target: "c-001".into(),
            attempts: 3,
        };
        let _storage = CarelineError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = CarelineError::Channel {
            message: "test".into(),
            source: None,
        };
        let _responder = CarelineError::Responder {
            message: "test".into(),
            source: None,
        };
        let _config = CarelineError::Config("test".into());
        let _timeout = CarelineError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = CarelineError::Internal("test".into());
    }

    #[test]
    fn conflict_predicate() {
        assert!(CarelineError::Conflict("lost the race".into()).is_conflict());
        assert!(!CarelineError::Internal("nope".into()).is_conflict());
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Channel, AdapterType::Responder, AdapterType::Storage] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).unwrap(), variant);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // Compile-time check that every adapter seam is reachable through
        // the public API.
        fn _assert_adapter<T: Adapter>() {}
        fn _assert_transport<T: ChannelTransport>() {}
        fn _assert_responder<T: Responder>() {}
        fn _assert_store<T: Store>() {}
    }
}
