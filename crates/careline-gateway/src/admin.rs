// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-authed administrative API over counsellors, tickets, and users.
//!
//! Mirrors the counsellor CLI: both write the same store records, so a
//! counsellor added here is immediately eligible for assignment.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use careline_core::types::{
    ChannelBinding, Counsellor, CounsellorId, StoreStats, Ticket, TicketId, TicketStatus, User,
    UserId,
};
use careline_core::CarelineError;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request body for `POST /v1/counsellors`.
#[derive(Debug, Deserialize)]
pub struct CreateCounsellorRequest {
    pub id: String,
    pub name: String,
    /// Defaults to the id.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

/// Request body for `POST /v1/counsellors/{id}/channels`.
#[derive(Debug, Deserialize)]
pub struct AttachChannelRequest {
    pub kind: String,
    pub channel_id: String,
    /// Lower is tried first during failover.
    #[serde(default = "default_priority")]
    pub order_priority: i64,
    #[serde(default)]
    pub auth_key: Option<String>,
}

fn default_priority() -> i64 {
    1
}

/// Query parameters for `GET /v1/tickets`.
#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    /// `open`, `assigned`, or `closed`; omitted lists every ticket.
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for `POST /v1/tickets/{id}/close`.
#[derive(Debug, Default, Deserialize)]
pub struct CloseTicketRequest {
    /// Recorded as the closing actor; defaults to `operator`.
    #[serde(default)]
    pub closed_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CounsellorListResponse {
    pub counsellors: Vec<Counsellor>,
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub tickets: Vec<Ticket>,
}

/// Response body for `GET /v1/users/{id}`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
    pub active_ticket: Option<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub status: &'static str,
}

/// Maps engine and store errors onto admin API status codes.
fn error_status(e: &CarelineError) -> StatusCode {
    match e {
        CarelineError::NotFound { .. } => StatusCode::NOT_FOUND,
        CarelineError::Conflict(_) => StatusCode::CONFLICT,
        CarelineError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: CarelineError) -> Response {
    (
        error_status(&e),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// GET /v1/counsellors
pub async fn list_counsellors(State(state): State<GatewayState>) -> Response {
    match state.store.list_counsellors().await {
        Ok(counsellors) => Json(CounsellorListResponse { counsellors }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/counsellors
pub async fn create_counsellor(
    State(state): State<GatewayState>,
    Json(body): Json<CreateCounsellorRequest>,
) -> Response {
    if body.id.trim().is_empty() {
        return bad_request("counsellor id must not be empty");
    }

    let counsellor = Counsellor {
        id: CounsellorId(body.id.clone()),
        name: body.name,
        username: body.username.unwrap_or_else(|| body.id.clone()),
        contact: body.contact.unwrap_or_default(),
        current_ticket: None,
        last_assigned_at: None,
    };

    match state.store.add_counsellor(&counsellor).await {
        Ok(()) => {
            info!(counsellor_id = body.id.as_str(), "counsellor registered via admin API");
            (StatusCode::CREATED, Json(counsellor)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// DELETE /v1/counsellors/{id}
pub async fn delete_counsellor(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.remove_counsellor(&CounsellorId(id.clone())).await {
        Ok(true) => {
            info!(counsellor_id = id.as_str(), "counsellor removed via admin API");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("counsellor not found: {id}"),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/counsellors/{id}/channels
pub async fn attach_channel(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AttachChannelRequest>,
) -> Response {
    let counsellor_id = CounsellorId(id.clone());
    match state.store.get_counsellor(&counsellor_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("counsellor not found: {id}"),
                }),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    }

    let binding = ChannelBinding {
        counsellor_id,
        kind: body.kind,
        channel_id: body.channel_id,
        auth_key: body.auth_key,
        order_priority: body.order_priority,
    };

    match state.store.add_channel(&binding).await {
        Ok(()) => (StatusCode::CREATED, Json(binding)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/tickets
pub async fn list_tickets(
    State(state): State<GatewayState>,
    Query(query): Query<TicketQuery>,
) -> Response {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match TicketStatus::from_str(raw) {
            Ok(status) => Some(status),
            Err(_) => {
                return bad_request(format!(
                    "unknown ticket status `{raw}` (expected open, assigned, or closed)"
                ));
            }
        },
    };

    match state.store.list_tickets(status).await {
        Ok(tickets) => Json(TicketListResponse { tickets }).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/tickets/{id}/close
pub async fn close_ticket(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<CloseTicketRequest>,
) -> Response {
    let closed_by = body.closed_by.as_deref().unwrap_or("operator");
    match state.engine.close_ticket(&TicketId(id), closed_by).await {
        Ok(()) => Json(CloseResponse { status: "closed" }).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/users/{id}
pub async fn get_user(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    let user_id = UserId(id.clone());
    let user = match state.store.get_user(&user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("user not found: {id}"),
                }),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    };

    match state.store.get_active_ticket_for_user(&user_id).await {
        Ok(active_ticket) => Json(UserResponse {
            user,
            active_ticket,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/users/{id}/escalate
///
/// Operator override for routing a user to a human regardless of what
/// their messages look like.
pub async fn escalate_user(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.escalate_user(&UserId(id.clone())).await {
        Ok(ticket) => {
            info!(
                user_id = id.as_str(),
                ticket_id = %ticket.id,
                status = %ticket.status,
                "user escalated via admin API"
            );
            Json(ticket).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /v1/stats
pub async fn get_stats(State(state): State<GatewayState>) -> Response {
    match state.store.stats().await {
        Ok(stats) => Json::<StoreStats>(stats).into_response(),
        Err(e) => error_response(e),
    }
}
