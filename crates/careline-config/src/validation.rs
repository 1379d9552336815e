// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that run after deserialization.
//!
//! Covers constraints serde cannot express: bind addresses that parse,
//! paths and URLs that are present, thresholds inside their range.

use crate::diagnostic::ConfigError;
use crate::model::{
    CarelineConfig, GatewayConfig, ResponderConfig, RouteConfig, RoutingConfig, StorageConfig,
};

/// Checks every section of a deserialized configuration.
///
/// Collects all failures instead of stopping at the first, so one run of
/// `careline config validate` reports everything that needs fixing.
pub fn validate_config(config: &CarelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_gateway(&config.gateway, &mut errors);
    check_storage(&config.storage, &mut errors);
    check_routing(&config.routing, &mut errors);
    check_route("routes.whatsapp", &config.routes.whatsapp, &mut errors);
    check_route("routes.webchat", &config.routes.webchat, &mut errors);
    check_responder(&config.responder, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn flag(errors: &mut Vec<ConfigError>, message: String) {
    errors.push(ConfigError::Validation { message });
}

/// The host must parse as an IP address or at least read as a hostname.
fn plausible_host(host: &str) -> bool {
    host.parse::<std::net::IpAddr>().is_ok()
        || host
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':'))
}

fn check_gateway(gateway: &GatewayConfig, errors: &mut Vec<ConfigError>) {
    let host = gateway.host.trim();
    if host.is_empty() {
        flag(errors, "gateway.host must not be empty".to_string());
    } else if !plausible_host(host) {
        flag(
            errors,
            format!("gateway.host `{host}` is not a valid IP address or hostname"),
        );
    }

    if gateway.port == 0 {
        flag(errors, "gateway.port must be non-zero".to_string());
    }
}

fn check_storage(storage: &StorageConfig, errors: &mut Vec<ConfigError>) {
    if storage.database_path.trim().is_empty() {
        flag(errors, "storage.database_path must not be empty".to_string());
    }
}

fn check_routing(routing: &RoutingConfig, errors: &mut Vec<ConfigError>) {
    // The classifier threshold is compared against a confidence in [0, 1].
    if !(0.0..=1.0).contains(&routing.intent_threshold) {
        flag(
            errors,
            format!(
                "routing.intent_threshold must be within [0, 1], got {}",
                routing.intent_threshold
            ),
        );
    }

    if routing.dispatch_timeout_secs == 0 {
        flag(
            errors,
            "routing.dispatch_timeout_secs must be at least 1".to_string(),
        );
    }

    if routing.sweep_interval_secs == 0 {
        flag(
            errors,
            "routing.sweep_interval_secs must be at least 1".to_string(),
        );
    }

    for (i, keyword) in routing.escalation_keywords.iter().enumerate() {
        if keyword.trim().is_empty() {
            flag(
                errors,
                format!("routing.escalation_keywords[{i}] must not be empty"),
            );
        }
    }
}

fn check_route(name: &str, route: &RouteConfig, errors: &mut Vec<ConfigError>) {
    let url = route.api_url.trim();
    if url.is_empty() {
        flag(errors, format!("{name}.api_url must not be empty"));
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        flag(
            errors,
            format!("{name}.api_url must start with http:// or https://"),
        );
    }

    if route.timeout_secs == 0 {
        flag(errors, format!("{name}.timeout_secs must be at least 1"));
    }
}

fn check_responder(responder: &ResponderConfig, errors: &mut Vec<ConfigError>) {
    if responder.timeout_secs == 0 {
        flag(
            errors,
            "responder.timeout_secs must be at least 1".to_string(),
        );
    }
}
