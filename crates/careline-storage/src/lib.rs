// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed [`Store`](careline_core::Store) implementation.
//!
//! One WAL-mode database holds users, tickets, counsellors, channel
//! bindings, and the message journal. All access funnels through a
//! single `tokio-rusqlite` connection, which serializes writers and
//! keeps the compare-and-set claim path atomic. Schema migrations are
//! embedded and run on open.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
