// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Careline engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a user (opaque, typically a phone-style address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a counsellor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounsellorId(pub String);

impl std::fmt::Display for CounsellorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Provider-assigned identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Routing mode currently serving a user: the automated responder or a human.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Handler {
    Bot,
    Counsellor,
}

/// Ticket lifecycle state. Transitions: `Open -> Assigned -> Closed`,
/// with `Open -> Closed` permitted as a cancellation path and
/// `Assigned -> Open` on counsellor reassignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Assigned,
    Closed,
}

impl TicketStatus {
    /// Open and assigned tickets are active; closed tickets are immutable history.
    pub fn is_active(self) -> bool {
        !matches!(self, TicketStatus::Closed)
    }
}

/// Wire-level kind of an inbound or outbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Reply,
    Media,
    Unknown,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Responder,
    Storage,
}

/// Counsellor-selection strategy used when ordering available candidates.
///
/// `LowestId` is the deterministic default; `RoundRobin` prefers the
/// counsellor assigned least recently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    LowestId,
    RoundRobin,
}

/// A user of the helpdesk. Created on first contact, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Current routing mode. Flips to `Counsellor` on escalation and back to
    /// `Bot` only when the active ticket is explicitly closed.
    pub handler: Handler,
    /// Detected language tag, e.g. `en` or `fr`.
    pub language: String,
    pub gender: Option<String>,
    pub age_range: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh user in the default bot-handled mode.
    pub fn new(id: UserId, language: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            handler: Handler::Bot,
            language: language.into(),
            gender: None,
            age_range: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A tracked support interaction between one user and at most one counsellor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    /// Routing mode active when the ticket was created (denormalized).
    pub handler: Handler,
    pub status: TicketStatus,
    /// Materialized conversation log, appended in message order.
    pub transcript: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A human counsellor. `current_ticket = None` means available; the base
/// policy enforces a hard capacity of one concurrent ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counsellor {
    pub id: CounsellorId,
    pub name: String,
    pub username: String,
    pub contact: String,
    pub current_ticket: Option<TicketId>,
    /// When this counsellor last won a bind; drives round-robin ordering.
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl Counsellor {
    pub fn is_available(&self) -> bool {
        self.current_ticket.is_none()
    }
}

/// A provider endpoint through which a counsellor can be reached.
///
/// A counsellor's bindings are tried in ascending `order_priority`
/// (lower = tried first) until one delivery succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub counsellor_id: CounsellorId,
    /// Channel type tag, e.g. `whatsapp` or `webchat`.
    pub kind: String,
    /// Provider-specific endpoint identifier (phone address, console room).
    pub channel_id: String,
    pub auth_key: Option<String>,
    pub order_priority: i64,
}

/// An immutable message log record. Append-only; never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    /// The end user whose conversation this message belongs to.
    pub user_id: UserId,
    pub sender: String,
    pub recipient: String,
    pub kind: MessageKind,
    /// Which channel delivered the message.
    pub source: String,
    pub content: String,
    /// Monotonically increasing per-conversation sequence; preserves
    /// transcript ordering under concurrent webhook delivery.
    pub seq: i64,
    pub timestamp: DateTime<Utc>,
}

/// A message to append to the log. Sequence and timestamp are assigned by
/// the store inside the append transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub user_id: UserId,
    pub sender: String,
    pub recipient: String,
    pub kind: MessageKind,
    pub source: String,
    pub content: String,
}

impl NewMessage {
    /// The line this message contributes to a ticket transcript.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.sender, self.content)
    }
}

/// Signal from the external intent classifier, carried alongside an
/// inbound message when the provider pipeline supplies one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSignal {
    pub intent: String,
    pub confidence: f64,
}

/// Canonical form of an inbound provider payload after channel-adapter
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Channel type tag the message arrived on.
    pub channel: String,
    /// Channel-specific sender identifier.
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    /// Provider-assigned message id, when one was present.
    pub provider_message_id: Option<String>,
    pub signal: Option<ClassifierSignal>,
}

/// Outcome of a dispatcher delivery. `Undeliverable` after exhausting a
/// counsellor's channels is the "counsellor unreachable" signal that
/// triggers reassignment; it is data, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryResult {
    Delivered {
        /// Channel type tag that accepted the message.
        channel: String,
        message_id: MessageId,
    },
    Undeliverable {
        /// How many channel attempts were made before giving up.
        attempts: usize,
    },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered { .. })
    }
}

/// Aggregate entity counts for the status command and admin stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub users: i64,
    pub counsellors: i64,
    pub available_counsellors: i64,
    pub open_tickets: i64,
    pub assigned_tickets: i64,
    pub closed_tickets: i64,
    pub messages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn handler_round_trips_through_strings() {
        for handler in [Handler::Bot, Handler::Counsellor] {
            let s = handler.to_string();
            assert_eq!(Handler::from_str(&s).unwrap(), handler);
        }
        assert_eq!(Handler::Bot.to_string(), "bot");
        assert_eq!(Handler::Counsellor.to_string(), "counsellor");
    }

    #[test]
    fn ticket_status_round_trips_through_strings() {
        for status in [TicketStatus::Open, TicketStatus::Assigned, TicketStatus::Closed] {
            let s = status.to_string();
            assert_eq!(TicketStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn active_statuses() {
        assert!(TicketStatus::Open.is_active());
        assert!(TicketStatus::Assigned.is_active());
        assert!(!TicketStatus::Closed.is_active());
    }

    #[test]
    fn new_user_defaults_to_bot() {
        let user = User::new(UserId("+237600000001".into()), "en");
        assert_eq!(user.handler, Handler::Bot);
        assert!(user.gender.is_none());
        assert!(user.age_range.is_none());
    }

    #[test]
    fn transcript_line_format() {
        let msg = NewMessage {
            user_id: UserId("+237600000001".into()),
            sender: "+237600000001".into(),
            recipient: "careline".into(),
            kind: MessageKind::Text,
            source: "whatsapp".into(),
            content: "hello".into(),
        };
        assert_eq!(msg.transcript_line(), "+237600000001: hello");
    }

    #[test]
    fn selection_strategy_parses_config_values() {
        assert_eq!(
            SelectionStrategy::from_str("lowest_id").unwrap(),
            SelectionStrategy::LowestId
        );
        assert_eq!(
            SelectionStrategy::from_str("round_robin").unwrap(),
            SelectionStrategy::RoundRobin
        );
        assert_eq!(SelectionStrategy::default(), SelectionStrategy::LowestId);
    }
}
