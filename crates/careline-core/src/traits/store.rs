// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence store trait for Careline's durable state.
//!
//! Each operation is atomic at the level described; multi-step flows
//! (create ticket + bind counsellor) are composed by the engine and must
//! not assume atomicity across calls. Routing correctness rests on two
//! compare-and-set points: `compare_and_set_counsellor_ticket` and
//! `update_ticket_status`.

use async_trait::async_trait;

use crate::error::CarelineError;
use crate::traits::adapter::Adapter;
use crate::types::{
    ChannelBinding, Counsellor, CounsellorId, Handler, MessageRecord, NewMessage,
    SelectionStrategy, StoreStats, Ticket, TicketId, TicketStatus, User, UserId,
};

/// Durable storage for User, Ticket, Counsellor, Channel, and Message
/// entities.
#[async_trait]
pub trait Store: Adapter {
    // --- Users ---

    /// Fetch a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, CarelineError>;

    /// Insert or update a user.
    ///
    /// Idempotent under concurrent first-contact races: when two calls race
    /// to create the same id, the uniqueness constraint makes one an update,
    /// and both return the stored row.
    async fn upsert_user(&self, user: &User) -> Result<User, CarelineError>;

    /// Persist a routing-mode change for a user.
    async fn set_user_handler(
        &self,
        id: &UserId,
        handler: Handler,
    ) -> Result<(), CarelineError>;

    // --- Tickets ---

    /// Create an `open` ticket for the user, or return the existing active
    /// one (enqueue-or-reuse). At most one `open`/`assigned` ticket may
    /// exist per user; a concurrent duplicate create resolves to the row
    /// that won.
    async fn create_ticket_if_absent(
        &self,
        user_id: &UserId,
        handler: Handler,
        transcript_seed: &str,
    ) -> Result<Ticket, CarelineError>;

    /// Fetch a ticket by id.
    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, CarelineError>;

    /// The user's `open` or `assigned` ticket, if any.
    async fn get_active_ticket_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, CarelineError>;

    /// Compare-and-set a ticket's status: the transition applies only if the
    /// current status is in `expected`. Returns whether a row transitioned.
    /// Transitioning to `Closed` also stamps `closed_at`.
    async fn update_ticket_status(
        &self,
        id: &TicketId,
        expected: &[TicketStatus],
        to: TicketStatus,
    ) -> Result<bool, CarelineError>;

    /// The `open` ticket waiting longest, for FIFO assignment draining.
    async fn oldest_open_ticket(&self) -> Result<Option<Ticket>, CarelineError>;

    /// Tickets filtered by status, newest first; all tickets when `None`.
    async fn list_tickets(
        &self,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, CarelineError>;

    // --- Messages ---

    /// Append a message to the immutable log, assigning the next
    /// per-conversation sequence number, and extend the owning user's
    /// active ticket transcript in the same transaction when one exists.
    async fn append_message(&self, msg: NewMessage) -> Result<MessageRecord, CarelineError>;

    /// The most recent messages in a user's conversation, oldest first.
    async fn recent_messages_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, CarelineError>;

    // --- Counsellors ---

    /// Register a counsellor. Fails with `Conflict` if the id is taken.
    async fn add_counsellor(&self, counsellor: &Counsellor) -> Result<(), CarelineError>;

    /// Remove a counsellor and their channel bindings. Returns whether a
    /// row was removed. Fails with `Conflict` while a ticket is bound.
    async fn remove_counsellor(&self, id: &CounsellorId) -> Result<bool, CarelineError>;

    /// Fetch a counsellor by id.
    async fn get_counsellor(
        &self,
        id: &CounsellorId,
    ) -> Result<Option<Counsellor>, CarelineError>;

    /// All counsellors, ordered by id.
    async fn list_counsellors(&self) -> Result<Vec<Counsellor>, CarelineError>;

    /// Counsellors with no bound ticket, ordered per the strategy. Candidate
    /// order is deterministic; an available counsellor is never omitted.
    async fn available_counsellors(
        &self,
        strategy: SelectionStrategy,
    ) -> Result<Vec<Counsellor>, CarelineError>;

    /// The counsellor currently bound to this ticket, if any.
    async fn counsellor_for_ticket(
        &self,
        ticket: &TicketId,
    ) -> Result<Option<Counsellor>, CarelineError>;

    /// Resolve an inbound sender to a counsellor via their channel bindings,
    /// for relaying counsellor replies back to their ticket's user.
    async fn counsellor_by_channel(
        &self,
        kind: &str,
        channel_id: &str,
    ) -> Result<Option<Counsellor>, CarelineError>;

    /// Atomic bind: set `current_ticket` only if it is still null. Returns
    /// whether this caller won; exactly one of N racing calls does. A win
    /// also stamps `last_assigned_at` for round-robin ordering.
    async fn compare_and_set_counsellor_ticket(
        &self,
        id: &CounsellorId,
        ticket: &TicketId,
    ) -> Result<bool, CarelineError>;

    /// Clear `current_ticket`. Idempotent: releasing an unbound counsellor
    /// is a no-op.
    async fn release_counsellor_ticket(&self, id: &CounsellorId)
        -> Result<(), CarelineError>;

    // --- Channels ---

    /// Attach a channel binding to a counsellor.
    async fn add_channel(&self, binding: &ChannelBinding) -> Result<(), CarelineError>;

    /// A counsellor's channel bindings in ascending `order_priority`.
    async fn get_counsellor_channels_ordered(
        &self,
        id: &CounsellorId,
    ) -> Result<Vec<ChannelBinding>, CarelineError>;

    // --- Operational ---

    /// Aggregate entity counts for status reporting.
    async fn stats(&self) -> Result<StoreStats, CarelineError>;
}
