// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Store trait.

use async_trait::async_trait;
use tracing::debug;

use careline_config::model::StorageConfig;
use careline_core::{
    Adapter, AdapterType, CarelineError, ChannelBinding, Counsellor, CounsellorId, Handler,
    HealthStatus, MessageRecord, NewMessage, SelectionStrategy, Store, StoreStats, Ticket,
    TicketId, TicketStatus, User, UserId,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query modules. Opening runs migrations, so a freshly opened store is
/// ready for traffic.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the store at the configured path.
    pub async fn open(config: &StorageConfig) -> Result<Self, CarelineError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store opened");
        Ok(Self { db })
    }

    /// Open an in-memory store. Used by tests.
    pub async fn open_in_memory() -> Result<Self, CarelineError> {
        let db = Database::open_in_memory().await?;
        Ok(Self { db })
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Adapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CarelineError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CarelineError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, CarelineError> {
        queries::users::get_user(&self.db, id).await
    }

    async fn upsert_user(&self, user: &User) -> Result<User, CarelineError> {
        queries::users::upsert_user(&self.db, user).await
    }

    async fn set_user_handler(
        &self,
        id: &UserId,
        handler: Handler,
    ) -> Result<(), CarelineError> {
        queries::users::set_user_handler(&self.db, id, handler).await
    }

    async fn create_ticket_if_absent(
        &self,
        user_id: &UserId,
        handler: Handler,
        transcript_seed: &str,
    ) -> Result<Ticket, CarelineError> {
        queries::tickets::create_ticket_if_absent(&self.db, user_id, handler, transcript_seed)
            .await
    }

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, CarelineError> {
        queries::tickets::get_ticket(&self.db, id).await
    }

    async fn get_active_ticket_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, CarelineError> {
        queries::tickets::get_active_ticket_for_user(&self.db, user_id).await
    }

    async fn update_ticket_status(
        &self,
        id: &TicketId,
        expected: &[TicketStatus],
        to: TicketStatus,
    ) -> Result<bool, CarelineError> {
        queries::tickets::update_ticket_status(&self.db, id, expected, to).await
    }

    async fn oldest_open_ticket(&self) -> Result<Option<Ticket>, CarelineError> {
        queries::tickets::oldest_open_ticket(&self.db).await
    }

    async fn list_tickets(
        &self,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, CarelineError> {
        queries::tickets::list_tickets(&self.db, status).await
    }

    async fn append_message(&self, msg: NewMessage) -> Result<MessageRecord, CarelineError> {
        queries::messages::append_message(&self.db, msg).await
    }

    async fn recent_messages_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, CarelineError> {
        queries::messages::recent_messages_for_user(&self.db, user_id, limit).await
    }

    async fn add_counsellor(&self, counsellor: &Counsellor) -> Result<(), CarelineError> {
        queries::counsellors::add_counsellor(&self.db, counsellor).await
    }

    async fn remove_counsellor(&self, id: &CounsellorId) -> Result<bool, CarelineError> {
        queries::counsellors::remove_counsellor(&self.db, id).await
    }

    async fn get_counsellor(
        &self,
        id: &CounsellorId,
    ) -> Result<Option<Counsellor>, CarelineError> {
        queries::counsellors::get_counsellor(&self.db, id).await
    }

    async fn list_counsellors(&self) -> Result<Vec<Counsellor>, CarelineError> {
        queries::counsellors::list_counsellors(&self.db).await
    }

    async fn available_counsellors(
        &self,
        strategy: SelectionStrategy,
    ) -> Result<Vec<Counsellor>, CarelineError> {
        queries::counsellors::available_counsellors(&self.db, strategy).await
    }

    async fn counsellor_for_ticket(
        &self,
        ticket: &TicketId,
    ) -> Result<Option<Counsellor>, CarelineError> {
        queries::counsellors::counsellor_for_ticket(&self.db, ticket).await
    }

    async fn counsellor_by_channel(
        &self,
        kind: &str,
        channel_id: &str,
    ) -> Result<Option<Counsellor>, CarelineError> {
        queries::counsellors::counsellor_by_channel(&self.db, kind, channel_id).await
    }

    async fn compare_and_set_counsellor_ticket(
        &self,
        id: &CounsellorId,
        ticket: &TicketId,
    ) -> Result<bool, CarelineError> {
        queries::counsellors::compare_and_set_counsellor_ticket(&self.db, id, ticket).await
    }

    async fn release_counsellor_ticket(
        &self,
        id: &CounsellorId,
    ) -> Result<(), CarelineError> {
        queries::counsellors::release_counsellor_ticket(&self.db, id).await
    }

    async fn add_channel(&self, binding: &ChannelBinding) -> Result<(), CarelineError> {
        queries::channels::add_channel(&self.db, binding).await
    }

    async fn get_counsellor_channels_ordered(
        &self,
        id: &CounsellorId,
    ) -> Result<Vec<ChannelBinding>, CarelineError> {
        queries::channels::get_counsellor_channels_ordered(&self.db, id).await
    }

    async fn stats(&self) -> Result<StoreStats, CarelineError> {
        queries::stats::stats(&self.db).await
    }
}
