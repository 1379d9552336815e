// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rich configuration diagnostics.
//!
//! Figment reports deserialization problems as a flat error chain; this
//! module lifts each one into a miette [`Diagnostic`] so the operator sees
//! the offending line of `careline.toml`, the set of keys the section
//! accepts, and a fuzzy-matched correction for probable typos.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler floor below which a candidate key is not offered as a
/// correction. At 0.75 `hodling` still maps to `holding` and
/// `bearer_tken` to `bearer_token`; unrelated keys score well under it.
const MIN_SIMILARITY: f64 = 0.75;

/// One operator-facing configuration problem.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key the section's model does not declare.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(careline::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest accepted key, when one scores above the similarity floor.
        suggestion: Option<String>,
        /// Comma-joined keys the section accepts, for the help line.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value whose TOML type does not match the model field.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(careline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key the model requires but no layer supplied.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(careline::config::missing_key),
        help("set `{key}` in careline.toml or via CARELINE_ environment variables")
    )]
    MissingKey { key: String },

    /// A semantic rule failed after deserialization succeeded.
    #[error("validation error: {message}")]
    #[diagnostic(code(careline::config::validation))]
    Validation { message: String },

    /// Anything figment reports that has no dedicated variant.
    #[error("configuration error: {0}")]
    #[diagnostic(code(careline::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    if let Some(candidate) = suggestion {
        format!("did you mean `{candidate}`? Valid keys: {valid_keys}")
    } else {
        format!("valid keys: {valid_keys}")
    }
}

/// Lift every entry of a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` pairs each loaded file path with its raw content so
/// unknown-key diagnostics can carry a source span into the real file.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|entry| match &entry.kind {
            Kind::UnknownField(field, accepted) => {
                unknown_field_error(&entry, field, accepted, toml_sources)
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted_path(&entry),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span: None,
                src: None,
            },
            _ => ConfigError::Other(entry.to_string()),
        })
        .collect()
}

fn unknown_field_error(
    entry: &figment::error::Error,
    field: &str,
    accepted: &[&str],
    toml_sources: &[(String, String)],
) -> ConfigError {
    let (span, src) = locate_in_sources(entry, field, toml_sources);
    ConfigError::UnknownKey {
        key: field.to_string(),
        suggestion: suggest_key(field, accepted),
        valid_keys: accepted.join(", "),
        span,
        src,
    }
}

fn dotted_path(entry: &figment::error::Error) -> String {
    entry
        .path
        .iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolve the file and byte span a bad key came from, when figment's
/// metadata names a file we actually loaded.
fn locate_in_sources(
    entry: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(path) = entry
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(p) => Some(p.display().to_string()),
            _ => None,
        })
    else {
        return (None, None);
    };

    let Some((_, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    let section: Vec<String> = entry.path.iter().map(|s| s.to_string()).collect();
    match find_key_offset(content, &section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` within `content`, scanning after the `[section]`
/// header named by the first path segment (or from the top for root keys).
///
/// The name must start a line (leading whitespace allowed) and be followed
/// by `=`, a space, or a tab, so `holding` never matches inside
/// `holding_extra`.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let scan_from = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut line_start = scan_from;
    for line in content[scan_from..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(field) {
            if matches!(rest.as_bytes().first(), Some(b' ') | Some(b'=') | Some(b'\t')) {
                return Some(line_start + (line.len() - trimmed.len()));
            }
        }
        line_start += line.len();
    }

    None
}

/// Best fuzzy match for `unknown` among `valid_keys`, or `None` when
/// nothing clears the similarity floor.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for &candidate in valid_keys {
        let score = strsim::jaro_winkler(unknown, candidate);
        if score > MIN_SIMILARITY && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}

/// Print every diagnostic to stderr through miette's graphical renderer.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    let mut report = String::new();
    for error in errors {
        report.clear();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_typo_earns_a_suggestion() {
        let keys = &["greeting_en", "greeting_fr", "holding", "connected"];
        assert_eq!(suggest_key("hodling", keys), Some("holding".to_string()));
        assert_eq!(
            suggest_key("bearer_tken", &["host", "port", "bearer_token"]),
            Some("bearer_token".to_string())
        );
    }

    #[test]
    fn garbage_key_earns_none() {
        assert_eq!(suggest_key("zzzzzz", &["host", "port", "bearer_token"]), None);
    }

    #[test]
    fn offset_lands_on_the_key_inside_its_section() {
        let content = "[gateway]\nport = 8080\n\n[replies]\nhodling = \"wait\"\n";
        let offset = find_key_offset(content, &["replies".to_string()], "hodling")
            .expect("key should be found");
        assert_eq!(&content[offset..offset + 7], "hodling");
    }

    #[test]
    fn prefix_of_a_longer_key_does_not_match() {
        let content = "[replies]\nholding_extra = \"x\"\nholding = \"wait\"\n";
        let offset = find_key_offset(content, &["replies".to_string()], "holding")
            .expect("exact key should be found");
        assert_eq!(&content[offset..offset + 7], "holding");
        assert!(content[..offset].contains("holding_extra"));
    }

    #[test]
    fn root_level_keys_scan_from_the_top() {
        let content = "stray = 1\n[service]\nname = \"careline\"\n";
        assert_eq!(find_key_offset(content, &[], "stray"), Some(0));
    }
}
