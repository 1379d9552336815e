// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalation policy: when does a bot-handled conversation move to a human.
//!
//! The decision is a pure function behind the [`EscalationPolicy`] seam so
//! the classifier integration stays swappable and unit-testable. The
//! default [`KeywordPolicy`] combines configured keywords with the external
//! classifier signal carried on the inbound payload.

use careline_config::model::RoutingConfig;
use careline_core::ClassifierSignal;

/// Decides whether an inbound message requests a human counsellor.
///
/// Implementations must be pure: no suspension, no store access. The
/// engine persists the handler flip itself after a `true` verdict.
pub trait EscalationPolicy: Send + Sync {
    fn should_escalate(&self, content: &str, signal: Option<&ClassifierSignal>) -> bool;
}

/// Default policy: case-insensitive keyword match, or a classifier signal
/// with the configured intent label at or above the confidence threshold.
pub struct KeywordPolicy {
    /// Stored lowercase; matched as substrings of the lowered message.
    keywords: Vec<String>,
    intent_label: String,
    intent_threshold: f64,
}

impl KeywordPolicy {
    pub fn new(
        keywords: Vec<String>,
        intent_label: impl Into<String>,
        intent_threshold: f64,
    ) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            intent_label: intent_label.into(),
            intent_threshold,
        }
    }

    pub fn from_config(routing: &RoutingConfig) -> Self {
        Self::new(
            routing.escalation_keywords.clone(),
            routing.intent_label.clone(),
            routing.intent_threshold,
        )
    }
}

impl EscalationPolicy for KeywordPolicy {
    fn should_escalate(&self, content: &str, signal: Option<&ClassifierSignal>) -> bool {
        let lowered = content.to_lowercase();
        if self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return true;
        }
        signal.is_some_and(|s| {
            s.intent == self.intent_label && s.confidence >= self.intent_threshold
        })
    }
}
