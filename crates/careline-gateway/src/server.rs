// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server: route table, shared state, and the serve loop.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use careline_config::model::GatewayConfig;
use careline_core::types::HealthStatus;
use careline_core::{CarelineError, Responder, Store};
use careline_engine::{Dispatcher, RoutingEngine};

use crate::admin;
use crate::auth::{auth_middleware, AuthConfig};
use crate::webhook;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The routing engine webhook messages are driven through.
    pub engine: Arc<RoutingEngine>,
    /// Store handle for admin reads and writes.
    pub store: Arc<dyn Store>,
    /// Dispatcher handle for channel health reporting.
    pub dispatcher: Arc<Dispatcher>,
    /// Responder handle for health reporting.
    pub responder: Arc<dyn Responder>,
    /// Shared secret for webhook HMAC verification; `None` disables it.
    pub webhook_secret: Option<String>,
    /// Process start time for uptime reporting.
    pub started_at: Instant,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Worst component status: `ok`, `degraded`, or `unhealthy`.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

/// One component's health in the `GET /health` report.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// GET /health
///
/// Aggregates storage, responder, and channel transport health. Stays
/// unauthenticated so process supervisors can probe it.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let checks = [
        ("storage", state.store.health_check().await),
        ("responder", state.responder.health_check().await),
        ("channels", state.dispatcher.health_check_all().await),
    ];

    let mut components = Vec::with_capacity(checks.len());
    let mut worst = 0u8;
    for (name, result) in checks {
        let status = result.unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        let (label, rank, detail) = match status {
            HealthStatus::Healthy => ("healthy", 0, None),
            HealthStatus::Degraded(d) => ("degraded", 1, Some(d)),
            HealthStatus::Unhealthy(d) => ("unhealthy", 2, Some(d)),
        };
        worst = worst.max(rank);
        components.push(ComponentHealth {
            name: name.to_string(),
            status: label.to_string(),
            detail,
        });
    }

    Json(HealthResponse {
        status: match worst {
            0 => "ok",
            1 => "degraded",
            _ => "unhealthy",
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        components,
    })
}

/// Builds the full gateway route table.
///
/// Public: `GET /health`, `POST /hook/messages`. Bearer-authed: the
/// `/v1` admin API.
pub fn router(state: GatewayState, bearer_token: Option<String>) -> Router {
    let auth = AuthConfig { bearer_token };

    let public_routes = Router::new()
        .route("/health", get(get_health))
        .route("/hook/messages", post(webhook::post_hook_messages))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/v1/counsellors",
            get(admin::list_counsellors).post(admin::create_counsellor),
        )
        .route("/v1/counsellors/{id}", delete(admin::delete_counsellor))
        .route("/v1/counsellors/{id}/channels", post(admin::attach_channel))
        .route("/v1/tickets", get(admin::list_tickets))
        .route("/v1/tickets/{id}/close", post(admin::close_ticket))
        .route("/v1/users/{id}", get(admin::get_user))
        .route("/v1/users/{id}/escalate", post(admin::escalate_user))
        .route("/v1/stats", get(admin::get_stats))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds the configured address and serves until `cancel` fires.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CarelineError> {
    let app = router(state, config.bearer_token.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CarelineError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| CarelineError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            components: vec![ComponentHealth {
                name: "storage".to_string(),
                status: "healthy".to_string(),
                detail: None,
            }],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(!json.contains("detail"), "None detail should be skipped");
    }

    #[test]
    fn component_health_carries_detail() {
        let component = ComponentHealth {
            name: "responder".to_string(),
            status: "degraded".to_string(),
            detail: Some("no API key".to_string()),
        };
        let json = serde_json::to_string(&component).unwrap();
        assert!(json.contains("no API key"));
    }
}
