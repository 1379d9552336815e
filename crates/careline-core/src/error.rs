// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Careline routing engine.

use thiserror::Error;

/// The primary error type used across all Careline adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CarelineError {
    /// A referenced user, ticket, counsellor, or channel does not exist.
    ///
    /// Never fatal at the webhook boundary: callers recover by creating the
    /// missing record or treating the work as queued.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A compare-and-set lost its race (counsellor already bound, ticket
    /// already transitioned). Recovered by retrying against the next candidate.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Every channel for a delivery target failed. For counsellors this
    /// triggers reassignment; for users it is surfaced as a delivery failure.
    #[error("target unreachable: {target} ({attempts} channel attempts)")]
    Unreachable { target: String, attempts: usize },

    /// Storage backend errors (database connection, query failure, serialization).
    ///
    /// Fatal for the current request. Store operations are single statements
    /// or transactions, so a failure leaves the pre-operation state intact.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel transport errors (connection failure, provider rejection, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bot responder errors (API failure, malformed completion).
    #[error("responder error: {message}")]
    Responder {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CarelineError {
    /// Wrap an arbitrary error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CarelineError::Storage {
            source: Box::new(source),
        }
    }

    /// True if this error is a compare-and-set loss the caller may retry around.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CarelineError::Conflict(_))
    }
}
