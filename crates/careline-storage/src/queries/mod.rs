// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod channels;
pub mod counsellors;
pub mod messages;
pub mod stats;
pub mod tickets;
pub mod users;
