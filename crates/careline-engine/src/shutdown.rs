// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process shutdown signalling.
//!
//! `serve` owns one [`CancellationToken`] created here. SIGINT or SIGTERM
//! cancels it; the gateway's graceful-shutdown future and the assignment
//! sweeper watch the same token, so a single signal winds the whole
//! service down in order.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawns the signal listener and hands back the token it will cancel.
///
/// Must be called from within a Tokio runtime. The listener task exits
/// after the first signal.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let signal = wait_for_shutdown_signal().await;
        info!(signal, "shutting down");
        trigger.cancel();
    });

    token
}

/// Resolves with the signal name once the process receives SIGINT or,
/// on Unix, SIGTERM.
async fn wait_for_shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}
