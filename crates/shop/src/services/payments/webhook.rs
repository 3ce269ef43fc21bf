//! Stripe webhook signature verification and event parsing.
//!
//! The `Stripe-Signature` header looks like `t=1492774577,v1=5257a8...`.
//! The signed payload is `"{t}.{raw body}"` under HMAC-SHA256 with the
//! endpoint secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const TOLERANCE_SECONDS: i64 = 300;

/// Webhook verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing or malformed signature header")]
    MalformedHeader,

    #[error("no matching signature")]
    SignatureMismatch,

    #[error("timestamp outside the tolerance window")]
    Expired,

    #[error("invalid payload: {0}")]
    Payload(String),
}

/// A webhook event, reduced to what the shop reacts to.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventObject {
    pub id: String,
}

impl WebhookEvent {
    /// The intent id when this event reports a successful payment.
    #[must_use]
    pub fn succeeded_intent(&self) -> Option<&str> {
        (self.event_type == "payment_intent.succeeded").then_some(self.data.object.id.as_str())
    }
}

/// Verify `header` against `payload` and parse the event.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns a `WebhookError` describing why the webhook was rejected.
pub fn verify_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<WebhookEvent, WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    if (now - timestamp).abs() > TOLERANCE_SECONDS {
        return Err(WebhookError::Expired);
    }

    serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] =
        br#"{"type": "payment_intent.succeeded", "data": {"object": {"id": "pi_123"}}}"#;

    fn sign(timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(body);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let header = sign(1_700_000_000, BODY);
        let event = verify_event(BODY, &header, SECRET, 1_700_000_010).unwrap();
        assert_eq!(event.succeeded_intent(), Some("pi_123"));
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let header = format!("{},v1=deadbeef", sign(1_700_000_000, BODY));
        assert!(verify_event(BODY, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(1_700_000_000, BODY);
        let tampered = br#"{"type": "payment_intent.succeeded", "data": {"object": {"id": "pi_999"}}}"#;
        assert_eq!(
            verify_event(tampered, &header, SECRET, 1_700_000_000).unwrap_err(),
            WebhookError::SignatureMismatch
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign(1_700_000_000, BODY);
        assert_eq!(
            verify_event(BODY, &header, SECRET, 1_700_000_000 + TOLERANCE_SECONDS + 1)
                .unwrap_err(),
            WebhookError::Expired
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert_eq!(
            verify_event(BODY, "v1=abc", SECRET, 0).unwrap_err(),
            WebhookError::MalformedHeader
        );
        assert_eq!(
            verify_event(BODY, "t=5", SECRET, 5).unwrap_err(),
            WebhookError::MalformedHeader
        );
    }

    #[test]
    fn test_other_events_are_ignored() {
        let body = br#"{"type": "charge.refunded", "data": {"object": {"id": "ch_1"}}}"#;
        let header = sign(10, body);
        let event = verify_event(body, &header, SECRET, 10).unwrap();
        assert_eq!(event.succeeded_intent(), None);
    }
}
