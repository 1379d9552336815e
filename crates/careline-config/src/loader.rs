// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./careline.toml` > `~/.config/careline/careline.toml`
//! > `/etc/careline/careline.toml` with environment variable overrides via
//! `CARELINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CarelineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/careline/careline.toml` (system-wide)
/// 3. `~/.config/careline/careline.toml` (user XDG config)
/// 4. `./careline.toml` (local directory)
/// 5. `CARELINE_*` environment variables
pub fn load_config() -> Result<CarelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::file("/etc/careline/careline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("careline/careline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("careline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<CarelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CarelineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CARELINE_GATEWAY_BEARER_TOKEN` must map
/// to `gateway.bearer_token`, not `gateway.bearer.token`. Route sections are
/// mapped at two levels for the same reason.
fn env_provider() -> Env {
    Env::prefixed("CARELINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CARELINE_GATEWAY_BEARER_TOKEN -> "gateway_bearer_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("routes_whatsapp_", "routes.whatsapp.", 1)
            .replacen("routes_webchat_", "routes.webchat.", 1)
            .replacen("service_", "service.", 1)
            .replacen("replies_", "replies.", 1)
            .replacen("routing_", "routing.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("responder_", "responder.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_loader_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [service]
            name = "careline-test"

            [gateway]
            port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(config.service.name, "careline-test");
        assert_eq!(config.gateway.port, 9090);
        // Untouched sections keep their defaults.
        assert_eq!(config.routing.intent_threshold, 0.5);
    }

    #[test]
    fn nested_route_section_parses() {
        let config = load_config_from_str(
            r#"
            [routes.whatsapp]
            api_url = "https://wa.example.test"
            api_token = "tok"
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.routes.whatsapp.api_url, "https://wa.example.test");
        assert_eq!(config.routes.whatsapp.api_token.as_deref(), Some("tok"));
        assert_eq!(config.routes.whatsapp.max_retries, 1);
        // The sibling route keeps its default endpoint.
        assert_eq!(config.routes.webchat.api_url, "http://127.0.0.1:8081");
    }
}
