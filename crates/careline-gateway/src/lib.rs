// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Careline routing engine, built on axum.
//!
//! Three route groups:
//!
//! - `POST /hook/messages` receives provider webhook envelopes. Receipt is
//!   always acknowledged with HTTP 200 once the body is authenticated and
//!   read, malformed payloads included, so the provider never enters a
//!   redelivery storm over a downstream failure.
//! - `GET /health` reports aggregated component health, unauthenticated.
//! - `/v1/*` is the bearer-authed administrative API over counsellors,
//!   tickets, users, and service stats.

pub mod admin;
pub mod auth;
pub mod server;
pub mod webhook;

pub use server::{router, serve, GatewayState};
