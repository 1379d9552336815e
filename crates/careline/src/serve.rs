// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `careline serve` command implementation.
//!
//! Starts the full routing service: SQLite store, outbound channel
//! transports, bot responder, routing engine with its assignment sweeper,
//! and the HTTP gateway. Supports graceful shutdown via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use careline_config::model::CarelineConfig;
use careline_core::CarelineError;
use careline_engine::shutdown;
use careline_engine::{Dispatcher, RoutingEngine};
use careline_gateway::GatewayState;
use careline_responder::ApiResponder;
use careline_storage::SqliteStore;
use careline_webchat::WebchatTransport;
use careline_whatsapp::WhatsAppTransport;
use tracing::{info, warn};

/// Runs the `careline serve` command.
///
/// Wires every subsystem, spawns the assignment sweeper, and serves the
/// gateway until SIGINT or SIGTERM.
pub async fn run_serve(config: CarelineConfig) -> Result<(), CarelineError> {
    // Initialize tracing subscriber.
    init_tracing(&config.service.log_level);

    info!(
        service = config.service.name.as_str(),
        "starting careline serve"
    );

    // Initialize storage. Opening runs migrations, so the store is ready
    // for traffic once this returns.
    let store = Arc::new(SqliteStore::open(&config.storage).await?);

    // Outbound transports, one per channel kind the dispatcher can reach.
    let mut dispatcher =
        Dispatcher::new(Duration::from_secs(config.routing.dispatch_timeout_secs));
    dispatcher.register(Arc::new(WhatsAppTransport::new(&config.routes.whatsapp)?));
    dispatcher.register(Arc::new(WebchatTransport::new(&config.routes.webchat)?));
    let dispatcher = Arc::new(dispatcher);

    if config.routes.whatsapp.api_token.is_none() {
        warn!("whatsapp route has no API token; outbound sends will fail until one is configured");
    }

    // Bot responder. An empty API key still starts: the responder serves
    // its configured fallback reply and reports itself degraded.
    let responder = Arc::new(ApiResponder::new(
        &config.responder,
        config.replies.fallback.clone(),
    )?);
    if config.responder.api_key.is_empty() {
        warn!("responder API key not configured; bot turns will use the fallback reply");
    }

    let engine = Arc::new(RoutingEngine::new(
        store.clone(),
        responder.clone(),
        dispatcher.clone(),
        &config,
    ));

    // Fail-closed admin API: without a bearer token every /v1 request is
    // rejected. The webhook and health routes stay open either way.
    if config.gateway.bearer_token.is_none() {
        warn!("gateway.bearer_token not set; admin API will reject every request");
    }

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();

    // Background sweeper. Its first pass runs immediately, repairing stale
    // bindings and draining tickets queued before a restart.
    let sweeper = tokio::spawn(engine.clone().run_sweeper(cancel.clone()));

    let state = GatewayState {
        engine,
        store: store.clone(),
        dispatcher: dispatcher.clone(),
        responder,
        webhook_secret: config.gateway.webhook_secret.clone(),
        started_at: Instant::now(),
    };

    careline_gateway::serve(&config.gateway, state, cancel.clone()).await?;

    // The gateway has drained its requests; the sweeper sees the same
    // cancelled token and stops on its own.
    if let Err(e) = sweeper.await {
        warn!(error = %e, "sweeper task did not shut down cleanly");
    }
    dispatcher.shutdown_all().await;

    info!("careline serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    // The configured level applies across the workspace; HTTP internals
    // stay at warn unless RUST_LOG says otherwise.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},hyper=warn,reqwest=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
