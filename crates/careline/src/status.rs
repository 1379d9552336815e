// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `careline status` command implementation.
//!
//! Probes the gateway health endpoint for service state, uptime, and
//! component health, and the admin stats endpoint for entity counts and
//! queue depth when a bearer token is configured. Degrades gracefully
//! when the service is not running.

use std::io::IsTerminal;
use std::time::Duration;

use careline_config::model::CarelineConfig;
use careline_core::{CarelineError, StoreStats};
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    #[serde(default)]
    components: Vec<ComponentStatus>,
}

/// One component line in the health report.
#[derive(Debug, Deserialize)]
struct ComponentStatus {
    name: String,
    status: String,
    #[serde(default)]
    detail: Option<String>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
}

impl StatusResponse {
    fn offline(host: &str, port: u16) -> Self {
        Self {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            gateway_host: host.to_string(),
            gateway_port: port,
            stats: None,
        }
    }
}

/// What the probe learned about the service.
enum Probe {
    Running {
        health: HealthResponse,
        stats: Option<StoreStats>,
    },
    Offline,
}

/// Runs the `careline status` command.
///
/// `--json` emits [`StatusResponse`] for scripting; otherwise a short
/// human report. `--plain` (or a non-TTY stdout) disables colors.
pub async fn run_status(
    config: &CarelineConfig,
    json: bool,
    plain: bool,
) -> Result<(), CarelineError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| CarelineError::Internal(format!("failed to create HTTP client: {e}")))?;

    let use_color = !plain && std::io::stdout().is_terminal();

    match probe_gateway(&client, config).await? {
        Probe::Running { health, stats } => {
            let uptime = format_uptime(health.uptime_secs);
            if json {
                print_json(&StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime.clone()),
                    gateway_host: host.clone(),
                    gateway_port: port,
                    stats,
                });
            } else {
                render_running(&health, stats.as_ref(), &uptime, use_color);
            }
        }
        Probe::Offline => {
            if json {
                print_json(&StatusResponse::offline(host, port));
            } else {
                render_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

/// Hits `/health`, then `/v1/stats` when the health probe succeeds.
async fn probe_gateway(
    client: &reqwest::Client,
    config: &CarelineConfig,
) -> Result<Probe, CarelineError> {
    let url = format!(
        "http://{}:{}/health",
        config.gateway.host, config.gateway.port
    );

    let resp = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        _ => return Ok(Probe::Offline),
    };

    let health: HealthResponse = resp
        .json()
        .await
        .map_err(|e| CarelineError::Internal(format!("failed to parse health response: {e}")))?;
    let stats = fetch_stats(client, config).await;

    Ok(Probe::Running { health, stats })
}

/// Entity counts from the admin stats endpoint.
///
/// Needs the configured bearer token. Any failure degrades the report to
/// health-only output rather than erroring.
async fn fetch_stats(client: &reqwest::Client, config: &CarelineConfig) -> Option<StoreStats> {
    let token = config.gateway.bearer_token.as_ref()?;
    let url = format!(
        "http://{}:{}/v1/stats",
        config.gateway.host, config.gateway.port
    );
    let resp = client
        .get(&url)
        .header("authorization", format!("Bearer {token}"))
        .send()
        .await
        .ok()?;
    resp.error_for_status().ok()?.json().await.ok()
}

/// Renders seconds as `1d 2h 3m`, dropping leading zero parts.
fn format_uptime(secs: u64) -> String {
    const DAY: u64 = 86_400;
    const HOUR: u64 = 3_600;
    let (days, rem) = (secs / DAY, secs % DAY);
    let (hours, rem) = (rem / HOUR, rem % HOUR);
    let minutes = rem / 60;

    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h {minutes}m"),
    }
}

fn banner() {
    println!();
    println!("  careline status");
    println!("  {}", "-".repeat(35));
}

/// Color for a reported health state.
fn paint_state(status: &str) -> colored::ColoredString {
    match status {
        "ok" => status.green(),
        "degraded" => status.yellow(),
        _ => status.red(),
    }
}

fn render_running(
    health: &HealthResponse,
    stats: Option<&StoreStats>,
    uptime: &str,
    use_color: bool,
) {
    banner();

    if use_color {
        println!(
            "    State:       {} {} (uptime: {uptime})",
            "✓".green(),
            paint_state(&health.status)
        );
    } else {
        println!(
            "    State:       [{}] (uptime: {uptime})",
            health.status.to_uppercase()
        );
    }

    for component in &health.components {
        let label = format!("{}:", component.name);
        match &component.detail {
            Some(detail) => println!("    {label:<12} {} ({detail})", component.status),
            None => println!("    {label:<12} {}", component.status),
        }
    }

    if let Some(stats) = stats {
        println!();
        println!("    Users:       {}", stats.users);
        println!(
            "    Counsellors: {} ({} available)",
            stats.counsellors, stats.available_counsellors
        );
        println!(
            "    Tickets:     {} open / {} assigned / {} closed",
            stats.open_tickets, stats.assigned_tickets, stats.closed_tickets
        );
        println!("    Messages:    {}", stats.messages);
    }

    println!();
}

fn render_offline(host: &str, port: u16, use_color: bool) {
    banner();

    if use_color {
        println!("    State:       {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:       [FAIL] not running");
    }

    println!("    Endpoint:    http://{host}:{port}/health");
    println!();
    println!("  Start with: careline serve");
    println!();
}

fn print_json(resp: &StatusResponse) {
    println!(
        "{}",
        serde_json::to_string_pretty(resp).unwrap_or_else(|_| "{}".to_string())
    );
}
