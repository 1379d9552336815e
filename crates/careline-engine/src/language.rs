// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-contact language detection.
//!
//! A marker-word heuristic, not a statistical detector: the service only
//! distinguishes French from the configured default, so a short list of
//! unambiguous French tokens is enough. Very short messages are never
//! classified.

/// Language tag returned for French-looking messages.
pub const FRENCH: &str = "fr";

/// Messages shorter than this (after trimming) are not classified.
const MIN_DETECTABLE_LEN: usize = 3;

/// French marker words matched as whole tokens, lowercase.
///
/// Tokens that are also common English words (`pour`, `aide`) are
/// deliberately absent.
const FRENCH_MARKERS: &[&str] = &[
    "bonjour",
    "bonsoir",
    "salut",
    "merci",
    "svp",
    "oui",
    "je",
    "suis",
    "vous",
    "pouvez",
    "besoin",
    "parler",
    "conseiller",
    "aidez",
    "avec",
    "ça",
    "être",
    "j'ai",
];

/// Returns `Some(FRENCH)` when the text carries a French marker word,
/// `None` when no marker is found or the text is too short to judge.
pub fn detect(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    if trimmed.len() < MIN_DETECTABLE_LEN {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    let has_marker = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .filter(|token| !token.is_empty())
        .any(|token| FRENCH_MARKERS.contains(&token));
    has_marker.then_some(FRENCH)
}

/// Detection with a caller-supplied fallback, mirroring how the engine
/// stores the result on a new user.
pub fn detect_or<'a>(text: &str, default: &'a str) -> &'a str {
    detect(text).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_words_detect_french() {
        assert_eq!(detect("Bonjour, j'ai besoin d'aide"), Some(FRENCH));
        assert_eq!(detect("salut"), Some(FRENCH));
        assert_eq!(detect("MERCI beaucoup"), Some(FRENCH));
    }

    #[test]
    fn english_text_is_not_classified() {
        assert_eq!(detect("Hello, I need some help"), None);
        assert_eq!(detect("can I talk to someone"), None);
    }

    #[test]
    fn markers_match_whole_tokens_only() {
        // "jeans" contains "je" but must not match.
        assert_eq!(detect("my jeans are torn"), None);
        // punctuation-adjacent markers still match
        assert_eq!(detect("merci!"), Some(FRENCH));
    }

    #[test]
    fn short_text_falls_through() {
        assert_eq!(detect("ok"), None);
        assert_eq!(detect("  "), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn detect_or_applies_default() {
        assert_eq!(detect_or("hello there", "en"), "en");
        assert_eq!(detect_or("bonjour", "en"), "fr");
    }
}
