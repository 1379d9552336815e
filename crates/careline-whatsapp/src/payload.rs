// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload parsing and normalization.
//!
//! The WhatsApp gateway posts batches of messages to the webhook. This
//! module deserializes that envelope leniently (unknown fields and types
//! are tolerated, never fatal) and normalizes each entry into the
//! channel-agnostic [`InboundMessage`] the routing engine consumes.

use careline_core::types::{ClassifierSignal, InboundMessage, MessageKind};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

/// Channel kind tag attached to every normalized message.
pub const CHANNEL_KIND: &str = "whatsapp";

/// Webhook envelope posted by the WhatsApp gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

/// One raw message entry in the webhook envelope.
///
/// Only the fields the router consumes are modeled; everything else in
/// the provider payload is ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// True for echoes of our own outbound sends.
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub reply: Option<ReplyBody>,
    #[serde(default)]
    pub document: Option<DocumentBody>,
    #[serde(default)]
    pub interactive: Option<InteractiveBody>,
    /// Optional enrichment added by the upstream intent classifier.
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub buttons_reply: Option<ButtonsReply>,
}

#[derive(Debug, Deserialize)]
pub struct ButtonsReply {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentBody {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveBody {
    #[serde(default)]
    pub body: Option<String>,
}

/// Normalizes a webhook envelope into routable inbound messages.
///
/// Entries that cannot be routed are skipped, never errors: echoes of our
/// own sends, entries without a sender, and message types with no
/// extractable content. The webhook acknowledges regardless of how many
/// entries survive.
pub fn normalize(payload: WebhookPayload) -> Vec<InboundMessage> {
    let mut inbound = Vec::new();
    for message in payload.messages {
        if message.from_me {
            debug!("skipping echo of our own send");
            continue;
        }
        let Some(sender_id) = message.chat_id.clone().or_else(|| message.from.clone()) else {
            warn!("webhook message without chat_id or from, skipping");
            continue;
        };
        let Some((kind, content)) = extract_content(&message) else {
            debug!(
                kind = message.kind.as_deref().unwrap_or("none"),
                "message type carries no routable content, skipping"
            );
            continue;
        };
        let signal = match (message.intent.clone(), message.confidence) {
            (Some(intent), Some(confidence)) => Some(ClassifierSignal { intent, confidence }),
            _ => None,
        };
        let timestamp = message
            .timestamp
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        inbound.push(InboundMessage {
            channel: CHANNEL_KIND.to_string(),
            sender_id,
            content,
            kind,
            timestamp,
            provider_message_id: message.id.clone(),
            signal,
        });
    }
    inbound
}

/// Extracts the routable content for one entry, per message type.
fn extract_content(message: &WebhookMessage) -> Option<(MessageKind, String)> {
    match message.kind.as_deref() {
        Some("text") => {
            let body = message.text.as_ref()?.body.trim();
            if body.is_empty() {
                return None;
            }
            Some((MessageKind::Text, body.to_string()))
        }
        Some("reply") => {
            let reply = message.reply.as_ref()?;
            if reply.kind.as_deref() != Some("buttons_reply") {
                return None;
            }
            let buttons = reply.buttons_reply.as_ref()?;
            // Button ids are "menu:selection"; the part after the colon is
            // the user's choice. Fall back to the button title.
            let content = buttons
                .id
                .as_deref()
                .and_then(|id| id.split_once(':').map(|(_, tail)| tail.to_string()))
                .or_else(|| buttons.title.clone())?;
            Some((MessageKind::Reply, content))
        }
        Some("document") => {
            let filename = message.document.as_ref()?.filename.clone()?;
            Some((MessageKind::Media, filename))
        }
        Some("interactive") => {
            let body = message.interactive.as_ref()?.body.clone()?;
            Some((MessageKind::Text, body))
        }
        _ => None,
    }
}
