// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Careline routing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use careline_core::SelectionStrategy;
use serde::{Deserialize, Serialize};

/// Top-level Careline configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CarelineConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// User-facing reply texts.
    #[serde(default)]
    pub replies: RepliesConfig,

    /// Escalation and assignment policy settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Bot responder API settings.
    #[serde(default)]
    pub responder: ResponderConfig,

    /// Outbound channel route settings.
    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language assumed when detection finds no marker.
    #[serde(default = "default_language")]
    pub language_default: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            language_default: default_language(),
        }
    }
}

fn default_service_name() -> String {
    "careline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// User-facing reply texts, overridable per deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepliesConfig {
    /// First-contact greeting, English.
    #[serde(default = "default_greeting_en")]
    pub greeting_en: String,

    /// First-contact greeting, French.
    #[serde(default = "default_greeting_fr")]
    pub greeting_fr: String,

    /// Sent while a counsellor-handled ticket is still waiting in the queue.
    #[serde(default = "default_holding")]
    pub holding: String,

    /// Sent when a counsellor is bound during the same request.
    #[serde(default = "default_connected")]
    pub connected: String,

    /// Returned by the bot when the responder cannot produce a reply.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Sent to a counsellor who writes in without an active ticket.
    #[serde(default = "default_no_active_ticket")]
    pub no_active_ticket: String,

    /// Sent to the user when their ticket is closed and the bot takes over.
    #[serde(default = "default_closed")]
    pub closed: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            greeting_en: default_greeting_en(),
            greeting_fr: default_greeting_fr(),
            holding: default_holding(),
            connected: default_connected(),
            fallback: default_fallback(),
            no_active_ticket: default_no_active_ticket(),
            closed: default_closed(),
        }
    }
}

fn default_greeting_en() -> String {
    "Hello, welcome to Careline. You can talk to me here, and you can ask for a counsellor at any time.".to_string()
}

fn default_greeting_fr() -> String {
    "Bonjour, bienvenue sur Careline. Vous pouvez me parler ici, et demander un conseiller à tout moment.".to_string()
}

fn default_holding() -> String {
    "Thank you for reaching out. All our counsellors are busy right now; you are in the queue and the next available counsellor will answer you here.".to_string()
}

fn default_connected() -> String {
    "You are now connected to a counsellor. They can see your conversation so far and will reply shortly.".to_string()
}

fn default_fallback() -> String {
    "I'm sorry, I can't answer right now. If you would like to talk to a counsellor, just ask.".to_string()
}

fn default_no_active_ticket() -> String {
    "You have no active ticket at the moment. You will be notified here when a user is assigned to you.".to_string()
}

fn default_closed() -> String {
    "This conversation has been closed. You are back with the assistant; ask for a counsellor any time you need one.".to_string()
}

/// Escalation and assignment policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Keywords that escalate a conversation when found in a message.
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,

    /// Classifier intent label that requests escalation.
    #[serde(default = "default_intent_label")]
    pub intent_label: String,

    /// Minimum classifier confidence for the intent label to count.
    #[serde(default = "default_intent_threshold")]
    pub intent_threshold: f64,

    /// Counsellor selection strategy: `lowest_id` or `round_robin`.
    #[serde(default)]
    pub strategy: SelectionStrategy,

    /// Per-channel delivery attempt timeout, seconds.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// Background assignment sweep interval, seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How many recent messages seed a new ticket transcript and the
    /// responder's history window.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: default_escalation_keywords(),
            intent_label: default_intent_label(),
            intent_threshold: default_intent_threshold(),
            strategy: SelectionStrategy::default(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_escalation_keywords() -> Vec<String> {
    vec![
        "escalate".to_string(),
        "counsellor".to_string(),
        "conseiller".to_string(),
        "talk to a human".to_string(),
    ]
}

fn default_intent_label() -> String {
    "escalate".to_string()
}

fn default_intent_threshold() -> f64 {
    0.5
}

fn default_dispatch_timeout_secs() -> u64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    20
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("careline").join("careline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("careline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Bind port for the HTTP listener.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the admin API. When unset, admin routes reject
    /// every request (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Shared secret for webhook HMAC verification. When unset, webhook
    /// signatures are not checked.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            webhook_secret: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

/// Bot responder API configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// Base URL of the completions API.
    #[serde(default = "default_responder_api_url")]
    pub api_url: String,

    /// API key. Empty disables the responder (fallback replies only).
    #[serde(default)]
    pub api_key: String,

    /// Model identifier passed through to the API.
    #[serde(default = "default_responder_model")]
    pub model: String,

    /// Maximum tokens per completion.
    #[serde(default = "default_responder_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout, seconds.
    #[serde(default = "default_responder_timeout_secs")]
    pub timeout_secs: u64,

    /// System prompt framing every bot completion.
    #[serde(default = "default_responder_system_context")]
    pub system_context: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_url: default_responder_api_url(),
            api_key: String::new(),
            model: default_responder_model(),
            max_tokens: default_responder_max_tokens(),
            timeout_secs: default_responder_timeout_secs(),
            system_context: default_responder_system_context(),
        }
    }
}

fn default_responder_api_url() -> String {
    "https://api.together.xyz/v1".to_string()
}

fn default_responder_model() -> String {
    "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string()
}

fn default_responder_max_tokens() -> u32 {
    512
}

fn default_responder_timeout_secs() -> u64 {
    30
}

fn default_responder_system_context() -> String {
    "You are a calm, supportive helpline assistant. Answer briefly and kindly, and remind the person that they can ask for a human counsellor at any time.".to_string()
}

/// Outbound route settings per channel type.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// WhatsApp provider route.
    #[serde(default = "RouteConfig::default_whatsapp")]
    pub whatsapp: RouteConfig,

    /// Counselling console route.
    #[serde(default = "RouteConfig::default_webchat")]
    pub webchat: RouteConfig,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            whatsapp: RouteConfig::default_whatsapp(),
            webchat: RouteConfig::default_webchat(),
        }
    }
}

/// One outbound HTTP route: endpoint, credential, and retry behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Base URL of the provider API.
    #[serde(default)]
    pub api_url: String,

    /// Bearer token for the provider API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout, seconds.
    #[serde(default = "default_route_timeout_secs")]
    pub timeout_secs: u64,

    /// Transient-failure retries per send (0 disables retrying).
    #[serde(default = "default_route_max_retries")]
    pub max_retries: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_token: None,
            timeout_secs: default_route_timeout_secs(),
            max_retries: default_route_max_retries(),
        }
    }
}

impl RouteConfig {
    fn default_whatsapp() -> Self {
        Self {
            api_url: "https://gate.whapi.cloud".to_string(),
            ..Self::default()
        }
    }

    fn default_webchat() -> Self {
        Self {
            api_url: "http://127.0.0.1:8081".to_string(),
            ..Self::default()
        }
    }
}

fn default_route_timeout_secs() -> u64 {
    10
}

fn default_route_max_retries() -> u32 {
    3
}
