// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Careline routing service.
//!
//! TOML files merge across the XDG hierarchy with `CARELINE_`
//! environment overrides on top. Deserialization is strict
//! (`deny_unknown_fields`), semantic checks run after it, and failures
//! come back as miette diagnostics with source spans and typo
//! suggestions.
//!
//! # Usage
//!
//! ```no_run
//! let config = careline_config::load_and_validate().expect("config errors");
//! println!("serving on port {}", config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CarelineConfig;

/// Loads configuration from the XDG hierarchy and validates it.
///
/// The one entry point commands should use: Figment merge, then
/// [`validation::validate_config`], with Figment failures converted to
/// span-carrying diagnostics. Returns every error found, not just the
/// first.
pub fn load_and_validate() -> Result<CarelineConfig, Vec<ConfigError>> {
    validated(loader::load_config(), collect_toml_sources)
}

/// Loads configuration from a TOML string and validates it.
///
/// Used by tests and by callers that manage their own config text.
pub fn load_and_validate_str(toml_content: &str) -> Result<CarelineConfig, Vec<ConfigError>> {
    validated(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn validated(
    loaded: Result<CarelineConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<CarelineConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Reads whichever config files exist so diagnostics can point into them.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates: Vec<std::path::PathBuf> = Vec::new();

    // Same precedence as the loader: local file, then XDG, then /etc.
    match std::env::current_dir() {
        Ok(cwd) => candidates.push(cwd.join("careline.toml")),
        Err(_) => candidates.push("careline.toml".into()),
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("careline/careline.toml"));
    }
    candidates.push("/etc/careline/careline.toml".into());

    candidates
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
