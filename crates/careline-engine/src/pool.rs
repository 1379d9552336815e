// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counsellor pool: candidate selection and capacity compare-and-set.
//!
//! The pool never touches ticket state. Binding a counsellor is a CAS on
//! `current_ticket` at the store; the ticket-side transition and any
//! compensation on partial failure belong to the engine.

use std::sync::Arc;

use careline_core::{
    CarelineError, Counsellor, CounsellorId, SelectionStrategy, Store, TicketId,
};
use tracing::debug;

/// Selects available counsellors and claims capacity atomically.
pub struct CounsellorPool {
    store: Arc<dyn Store>,
    strategy: SelectionStrategy,
}

impl CounsellorPool {
    pub fn new(store: Arc<dyn Store>, strategy: SelectionStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Binds the first available candidate not in `exclude` to `ticket`.
    ///
    /// Candidates are tried in strategy order; a CAS loss moves on to the
    /// next candidate rather than failing. Returns `None` when every
    /// candidate is excluded, busy, or lost to a concurrent binder.
    pub async fn bind(
        &self,
        ticket: &TicketId,
        exclude: &[CounsellorId],
    ) -> Result<Option<Counsellor>, CarelineError> {
        let candidates = self.store.available_counsellors(self.strategy).await?;
        for candidate in candidates {
            if exclude.contains(&candidate.id) {
                continue;
            }
            if self
                .store
                .compare_and_set_counsellor_ticket(&candidate.id, ticket)
                .await?
            {
                return Ok(Some(candidate));
            }
            debug!(
                counsellor_id = %candidate.id,
                "lost bind race, trying next candidate"
            );
        }
        Ok(None)
    }

    /// Binds one specific counsellor, raising `Conflict` on a CAS loss.
    ///
    /// Used when the caller has already chosen the counsellor (operator
    /// action); concurrent claims for the same counsellor produce exactly
    /// one winner.
    pub async fn claim(
        &self,
        counsellor_id: &CounsellorId,
        ticket: &TicketId,
    ) -> Result<(), CarelineError> {
        if self
            .store
            .compare_and_set_counsellor_ticket(counsellor_id, ticket)
            .await?
        {
            Ok(())
        } else {
            Err(CarelineError::Conflict(format!(
                "counsellor {counsellor_id} already has an active ticket"
            )))
        }
    }

    /// Clears a counsellor's binding. Idempotent.
    pub async fn release(&self, counsellor_id: &CounsellorId) -> Result<(), CarelineError> {
        self.store.release_counsellor_ticket(counsellor_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::{Handler, UserId};
    use careline_storage::SqliteStore;

    async fn store_with_counsellors(ids: &[&str]) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        for id in ids {
            store
                .add_counsellor(&Counsellor {
                    id: CounsellorId((*id).into()),
                    name: format!("Counsellor {id}"),
                    username: (*id).into(),
                    contact: format!("{id}@careline.test"),
                    current_ticket: None,
                    last_assigned_at: None,
                })
                .await
                .unwrap();
        }
        store
    }

    async fn open_ticket(store: &Arc<SqliteStore>, user: &str) -> TicketId {
        store
            .upsert_user(&careline_core::User::new(UserId(user.into()), "en"))
            .await
            .unwrap();
        store
            .create_ticket_if_absent(&UserId(user.into()), Handler::Counsellor, "")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn bind_prefers_lowest_id() {
        let store = store_with_counsellors(&["c2", "c1", "c3"]).await;
        let ticket = open_ticket(&store, "+237600000001").await;
        let pool = CounsellorPool::new(store.clone(), SelectionStrategy::LowestId);

        let bound = pool.bind(&ticket, &[]).await.unwrap().unwrap();
        assert_eq!(bound.id.0, "c1");
    }

    #[tokio::test]
    async fn bind_skips_excluded_candidates() {
        let store = store_with_counsellors(&["c1", "c2"]).await;
        let ticket = open_ticket(&store, "+237600000001").await;
        let pool = CounsellorPool::new(store.clone(), SelectionStrategy::LowestId);

        let bound = pool
            .bind(&ticket, &[CounsellorId("c1".into())])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bound.id.0, "c2");
    }

    #[tokio::test]
    async fn bind_returns_none_when_pool_exhausted() {
        let store = store_with_counsellors(&["c1"]).await;
        let t1 = open_ticket(&store, "+237600000001").await;
        let t2 = open_ticket(&store, "+237600000002").await;
        let pool = CounsellorPool::new(store.clone(), SelectionStrategy::LowestId);

        assert!(pool.bind(&t1, &[]).await.unwrap().is_some());
        assert!(pool.bind(&t2, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_yield_one_winner_and_conflicts() {
        let store = store_with_counsellors(&["c1"]).await;
        let ticket = open_ticket(&store, "+237600000001").await;
        let pool = Arc::new(CounsellorPool::new(
            store.clone(),
            SelectionStrategy::LowestId,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let ticket = ticket.clone();
            handles.push(tokio::spawn(async move {
                pool.claim(&CounsellorId("c1".into()), &ticket).await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => wins += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = store_with_counsellors(&["c1"]).await;
        let ticket = open_ticket(&store, "+237600000001").await;
        let pool = CounsellorPool::new(store.clone(), SelectionStrategy::LowestId);

        pool.claim(&CounsellorId("c1".into()), &ticket).await.unwrap();
        pool.release(&CounsellorId("c1".into())).await.unwrap();
        pool.release(&CounsellorId("c1".into())).await.unwrap();

        let c = store
            .get_counsellor(&CounsellorId("c1".into()))
            .await
            .unwrap()
            .unwrap();
        assert!(c.is_available());
    }
}
