// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook intake.
//!
//! `POST /hook/messages` acknowledges receipt with HTTP 200 once the body
//! is read, whatever happens downstream. Malformed JSON is logged and
//! acknowledged as ignored rather than rejected, since a non-2xx answer
//! would only make the provider redeliver the same broken payload.
//! Processing happens after the acknowledgment on a detached task,
//! sequentially per payload to preserve intra-payload ordering.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{error, warn};

use careline_whatsapp::{normalize, WebhookPayload};

use crate::server::GatewayState;

/// Signature header checked when a webhook secret is configured.
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Acknowledgment body for `POST /hook/messages`.
#[derive(Debug, Serialize)]
pub struct HookAck {
    /// `accepted` for a parsed envelope, `ignored` for malformed JSON.
    pub status: &'static str,
    /// Messages extracted from the envelope and queued for routing.
    pub received: usize,
}

/// POST /hook/messages
pub async fn post_hook_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref secret) = state.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, signature, &body) {
            warn!("webhook signature verification failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "ignoring malformed webhook payload");
            return (
                StatusCode::OK,
                Json(HookAck {
                    status: "ignored",
                    received: 0,
                }),
            )
                .into_response();
        }
    };

    let messages = normalize(payload);
    let received = messages.len();

    if received > 0 {
        let engine = state.engine.clone();
        tokio::spawn(async move {
            for inbound in messages {
                let sender = inbound.sender_id.clone();
                if let Err(e) = engine.handle_inbound(inbound).await {
                    error!(
                        sender = sender.as_str(),
                        error = %e,
                        "webhook message processing failed"
                    );
                }
            }
        });
    }

    (
        StatusCode::OK,
        Json(HookAck {
            status: "accepted",
            received,
        }),
    )
        .into_response()
}

/// Verifies `sha256=<hex>` HMAC-SHA256 signatures over the raw body.
fn verify_signature(secret: &str, header: &str, body: &[u8]) -> bool {
    let Some(digest_hex) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"messages":[]}"#;
        let header = sign("hush", body);
        assert!(verify_signature("hush", &header, body));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = br#"{"messages":[]}"#;
        let header = sign("other", body);
        assert!(!verify_signature("hush", &header, body));
    }

    #[test]
    fn tampered_body_fails() {
        let header = sign("hush", br#"{"messages":[]}"#);
        assert!(!verify_signature("hush", &header, br#"{"messages":[1]}"#));
    }

    #[test]
    fn missing_prefix_fails() {
        let body = b"payload";
        assert!(!verify_signature("hush", "deadbeef", body));
        assert!(!verify_signature("hush", "", body));
    }

    #[test]
    fn non_hex_digest_fails() {
        assert!(!verify_signature("hush", "sha256=not-hex!", b"payload"));
    }

    #[test]
    fn ack_serializes_with_count() {
        let ack = HookAck {
            status: "accepted",
            received: 3,
        };
        let json = serde_json::to_string(&ack).unwrap();
        assert!(json.contains("\"status\":\"accepted\""));
        assert!(json.contains("\"received\":3"));
    }
}
