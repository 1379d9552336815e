// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `careline doctor` command implementation.
//!
//! Diagnoses the service environment before or beside a running instance:
//! configuration, database, responder and route reachability, and the
//! local health endpoint. `--deep` adds storage-level checks.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use careline_config::model::{CarelineConfig, GatewayConfig, ResponderConfig, RouteConfig};
use careline_core::CarelineError;
use colored::Colorize;

/// Reachability probes give up after this long.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Verdict of one diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn plain_label(self) -> &'static str {
        match self {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        }
    }

    fn symbol(self) -> colored::ColoredString {
        match self {
            CheckStatus::Pass => "✓".green(),
            CheckStatus::Warn => "!".yellow(),
            CheckStatus::Fail => "✗".red(),
        }
    }
}

/// A named check with its verdict and elapsed time.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn pass(name: &'static str, message: impl Into<String>, started: Instant) -> Self {
        Self::verdict(name, CheckStatus::Pass, message, started)
    }

    fn warn(name: &'static str, message: impl Into<String>, started: Instant) -> Self {
        Self::verdict(name, CheckStatus::Warn, message, started)
    }

    fn fail(name: &'static str, message: impl Into<String>, started: Instant) -> Self {
        Self::verdict(name, CheckStatus::Fail, message, started)
    }

    fn verdict(
        name: &'static str,
        status: CheckStatus,
        message: impl Into<String>,
        started: Instant,
    ) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: started.elapsed(),
        }
    }
}

/// Run the `careline doctor` command.
pub async fn run_doctor(
    config: &CarelineConfig,
    deep: bool,
    plain: bool,
) -> Result<(), CarelineError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let mut results = vec![
        check_config().await,
        check_database(&config.storage.database_path).await,
        check_responder(&config.responder).await,
        check_route("WhatsApp route", &config.routes.whatsapp).await,
        check_route("Webchat route", &config.routes.webchat).await,
        check_health_endpoint(&config.gateway).await,
    ];

    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
        results.push(check_disk_space(&config.storage.database_path).await);
    }

    render_report(&results, deep, use_color);
    Ok(())
}

fn render_report(results: &[CheckResult], deep: bool, use_color: bool) {
    println!();
    println!("  careline doctor");
    println!("  {}", "-".repeat(52));

    let mut issues = 0usize;
    for check in results {
        if check.status != CheckStatus::Pass {
            issues += 1;
        }
        let elapsed = check.duration.as_millis();
        if use_color {
            let message = match check.status {
                CheckStatus::Pass => check.message.normal(),
                CheckStatus::Warn => check.message.yellow(),
                CheckStatus::Fail => check.message.red(),
            };
            println!(
                "    {} {:<16} {message} ({elapsed}ms)",
                check.status.symbol(),
                check.name
            );
        } else {
            println!(
                "    {} {:<16} {} ({elapsed}ms)",
                check.status.plain_label(),
                check.name,
                check.message
            );
        }
    }

    println!();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    if issues > 0 && !deep {
        println!("  Run with --deep for storage diagnostics.");
    }
    println!();
}

/// Configuration must load and validate through the real layer stack.
async fn check_config() -> CheckResult {
    let started = Instant::now();
    match careline_config::load_and_validate() {
        Ok(_) => CheckResult::pass("Configuration", "valid", started),
        Err(errors) => CheckResult::fail(
            "Configuration",
            format!("{} error(s)", errors.len()),
            started,
        ),
    }
}

/// The database file must open and answer a trivial query. A missing file
/// is only a warning; `serve` creates it.
async fn check_database(db_path: &str) -> CheckResult {
    let started = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::warn(
            "Database",
            format!("not found: {db_path} (will be created on first run)"),
            started,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => return CheckResult::fail("Database", format!("open failed: {e}"), started),
    };

    let probe: Result<(), tokio_rusqlite::Error> = conn
        .call(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await;

    match probe {
        Ok(()) => CheckResult::pass("Database", "connected", started),
        Err(e) => CheckResult::fail("Database", format!("query failed: {e}"), started),
    }
}

/// The responder runs keyless (fallback replies only), so a missing key
/// warns instead of failing.
async fn check_responder(responder: &ResponderConfig) -> CheckResult {
    let started = Instant::now();
    if responder.api_key.is_empty() {
        return CheckResult::warn(
            "Responder API",
            "no API key configured (fallback replies only)",
            started,
        );
    }
    probe_url("Responder API", &responder.api_url, started).await
}

/// A route with no URL or token cannot deliver. Both are warnings; the
/// other route may carry the traffic.
async fn check_route(name: &'static str, route: &RouteConfig) -> CheckResult {
    let started = Instant::now();
    if route.api_url.is_empty() {
        return CheckResult::warn(name, "no API URL configured", started);
    }
    if route.api_token.is_none() {
        return CheckResult::warn(name, "no API token configured", started);
    }
    probe_url(name, &route.api_url, started).await
}

/// HEAD probe. Any HTTP status proves the host answers; only
/// transport-level failures count against it.
async fn probe_url(name: &'static str, url: &str, started: Instant) -> CheckResult {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return CheckResult::fail(name, format!("HTTP client error: {e}"), started),
    };

    match client.head(url).send().await {
        Ok(_) => CheckResult::pass(name, "reachable", started),
        Err(e) if e.is_timeout() => CheckResult::fail(name, "timeout (5s)", started),
        Err(e) if e.is_connect() => CheckResult::fail(name, "connection refused", started),
        Err(e) => CheckResult::fail(name, format!("error: {e}"), started),
    }
}

/// Probe the local gateway. Not running is a warning, not a failure;
/// doctor is routinely used before the first `serve`.
async fn check_health_endpoint(gateway: &GatewayConfig) -> CheckResult {
    let started = Instant::now();
    let url = format!("http://{}:{}/health", gateway.host, gateway.port);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return CheckResult::fail("Health endpoint", format!("HTTP client error: {e}"), started)
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::pass("Health endpoint", "reachable", started)
        }
        Ok(resp) => {
            CheckResult::warn("Health endpoint", format!("status {}", resp.status()), started)
        }
        Err(_) => CheckResult::warn(
            "Health endpoint",
            format!("not reachable at {url} (service may not be running)"),
            started,
        ),
    }
}

/// Deep check: SQLite's own integrity verdict.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let started = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::warn("DB integrity", "database not found (skipped)", started);
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => return CheckResult::fail("DB integrity", format!("open failed: {e}"), started),
    };

    let verdicts: Result<Vec<String>, tokio_rusqlite::Error> = conn
        .call(|conn| {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await;

    match verdicts {
        Ok(rows) if rows == ["ok"] => CheckResult::pass("DB integrity", "ok", started),
        Ok(rows) => CheckResult::fail(
            "DB integrity",
            format!("{} issue(s) found", rows.len()),
            started,
        ),
        Err(e) => CheckResult::fail("DB integrity", format!("check failed: {e}"), started),
    }
}

/// Deep check: free-space reporting is platform specific, so report the
/// database size as the growth signal and fall back to directory access.
async fn check_disk_space(db_path: &str) -> CheckResult {
    let started = Instant::now();
    let path = Path::new(db_path);

    if let Ok(meta) = std::fs::metadata(path) {
        let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
        return CheckResult::pass("Disk space", format!("DB size: {size_mb:.1} MB"), started);
    }

    let parent = path.parent().unwrap_or(Path::new("."));
    match std::fs::metadata(parent) {
        Ok(_) => CheckResult::pass("Disk space", "directory accessible", started),
        Err(e) => CheckResult::warn("Disk space", format!("cannot access: {e}"), started),
    }
}
