// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Careline configuration system.

use careline_config::diagnostic::{suggest_key, ConfigError};
use careline_config::model::CarelineConfig;
use careline_config::{load_and_validate_str, load_config_from_str};
use careline_core::SelectionStrategy;

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_careline_config() {
    let toml = r#"
[service]
name = "careline-test"
log_level = "debug"
language_default = "fr"

[routing]
escalation_keywords = ["help me", "counsellor"]
intent_threshold = 0.7
strategy = "round_robin"
dispatch_timeout_secs = 5
history_limit = 10

[storage]
database_path = "/tmp/careline-test.db"
wal_mode = false

[gateway]
host = "0.0.0.0"
port = 9099
bearer_token = "admin-token"
webhook_secret = "hook-secret"

[responder]
api_url = "https://llm.example.test/v1"
api_key = "sk-test"
model = "test-model"
max_tokens = 128

[routes.whatsapp]
api_url = "https://wa.example.test"
api_token = "wa-token"
timeout_secs = 4
max_retries = 2

[routes.webchat]
api_url = "http://console.example.test"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "careline-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.service.language_default, "fr");
    assert_eq!(config.routing.escalation_keywords, vec!["help me", "counsellor"]);
    assert_eq!(config.routing.intent_threshold, 0.7);
    assert_eq!(config.routing.strategy, SelectionStrategy::RoundRobin);
    assert_eq!(config.routing.dispatch_timeout_secs, 5);
    assert_eq!(config.storage.database_path, "/tmp/careline-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 9099);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("admin-token"));
    assert_eq!(config.gateway.webhook_secret.as_deref(), Some("hook-secret"));
    assert_eq!(config.responder.api_key, "sk-test");
    assert_eq!(config.responder.max_tokens, 128);
    assert_eq!(config.routes.whatsapp.api_token.as_deref(), Some("wa-token"));
    assert_eq!(config.routes.whatsapp.timeout_secs, 4);
    assert_eq!(config.routes.whatsapp.max_retries, 2);
    assert_eq!(config.routes.webchat.api_url, "http://console.example.test");
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "careline");
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.service.language_default, "en");
    assert!(config.gateway.bearer_token.is_none());
    assert!(config.gateway.webhook_secret.is_none());
    assert!(config.storage.database_path.ends_with("careline.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.routing.strategy, SelectionStrategy::LowestId);
    assert_eq!(config.routes.whatsapp.api_url, "https://gate.whapi.cloud");
    assert_eq!(config.routes.whatsapp.timeout_secs, 10);
}

/// Unknown field in [gateway] section produces an error.
#[test]
fn unknown_field_in_gateway_produces_error() {
    let toml = r#"
[gateway]
bearer_tken = "abc"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("bearer_tken"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Dot-notation overrides merge over TOML, as env vars do at runtime.
#[test]
fn dotted_override_beats_toml_value() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[service]
name = "from-toml"
"#;

    let config: CarelineConfig = Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("service.name", "from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.service.name, "from-env");
}

/// gateway.bearer_token maps as one key, not gateway.bearer.token.
#[test]
fn underscore_keys_stay_single_segments() {
    use figment::{providers::Serialized, Figment};

    let config: CarelineConfig = Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(("gateway.bearer_token", "tok-from-env"))
        .extract()
        .expect("should set bearer_token via dot notation");

    assert_eq!(config.gateway.bearer_token.as_deref(), Some("tok-from-env"));
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: CarelineConfig = Figment::new()
        .merge(Serialized::defaults(CarelineConfig::default()))
        .merge(Toml::file("/nonexistent/path/careline.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.service.name, "careline");
}

/// Unknown key "hodling" in [replies] suggests "holding".
#[test]
fn diagnostic_hodling_suggests_holding() {
    let valid_keys = &[
        "greeting_en",
        "greeting_fr",
        "holding",
        "connected",
        "fallback",
        "no_active_ticket",
    ];
    assert_eq!(suggest_key("hodling", valid_keys), Some("holding".to_string()));
}

/// Error output from load_and_validate_str carries the unknown key and suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[replies]
hodling = "please wait"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    assert!(!errors.is_empty(), "should have at least one error");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "hodling"
                && suggestion.as_deref() == Some("holding")
                && valid_keys.contains("holding")
        })
    });
    assert!(has_unknown_key, "expected an UnknownKey diagnostic with suggestion");
}

/// Semantic validation runs after deserialization and collects errors.
#[test]
fn validation_errors_surface_through_load_and_validate() {
    let toml = r#"
[routing]
intent_threshold = 3.0

[gateway]
port = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.len() >= 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// An invalid strategy value is rejected at deserialization time.
#[test]
fn invalid_strategy_value_rejected() {
    let toml = r#"
[routing]
strategy = "fastest_typist"
"#;

    assert!(load_config_from_str(toml).is_err());
}
