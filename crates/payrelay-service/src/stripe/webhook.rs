//! Inbound webhook event verification.
//!
//! The processor signs each delivery with an HMAC over the raw body:
//! the `stripe-signature` header carries `t=<unix>,v1=<hex>[,v1=<hex>...]`,
//! and the signature is HMAC-SHA256 of `"{t}.{body}"` under the shared
//! webhook secret. Verification is pure: no I/O, all outcomes come back
//! through the returned `Result`.
//!
//! Order matters: the signature is checked against the raw body *before*
//! the body is parsed, so a tampered payload surfaces as
//! [`WebhookError::SignatureMismatch`], never as a parse error.

use chrono::Utc;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

use super::types::WebhookEvent;

/// Webhook verification failure.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The signature header was missing its timestamp or any `v1` entry.
    #[error("malformed signature header")]
    MalformedHeader,

    /// No `v1` candidate matched the computed signature.
    #[error("webhook signature mismatch")]
    SignatureMismatch,

    /// The signed timestamp is outside the tolerance window.
    #[error("webhook timestamp outside tolerance window")]
    TimestampOutOfTolerance,

    /// The body passed verification but is not a valid event envelope.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Verify a webhook delivery and decode it into a typed event.
///
/// # Errors
///
/// Returns a [`WebhookError`] when the signature header is malformed, no
/// signature candidate matches, the timestamp is older or newer than
/// `tolerance_seconds`, or the verified body fails to parse.
pub fn construct_event(
    payload: &str,
    signature_header: &str,
    secret: &str,
    tolerance_seconds: i64,
) -> Result<WebhookEvent, WebhookError> {
    construct_event_at(
        payload,
        signature_header,
        secret,
        tolerance_seconds,
        Utc::now().timestamp(),
    )
}

/// [`construct_event`] with an explicit clock, for deterministic tests.
pub fn construct_event_at(
    payload: &str,
    signature_header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now_unix: i64,
) -> Result<WebhookEvent, WebhookError> {
    let header = SignatureHeader::parse(signature_header)?;

    let signed_payload = format!("{}.{payload}", header.timestamp);
    let expected = hmac_sha256_hex(secret, signed_payload.as_bytes());

    let valid = header
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(&expected, candidate));
    if !valid {
        return Err(WebhookError::SignatureMismatch);
    }

    let timestamp: i64 = header
        .timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedHeader)?;
    if (now_unix - timestamp).abs() > tolerance_seconds {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    serde_json::from_str(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}

/// The parsed `stripe-signature` header.
struct SignatureHeader<'a> {
    timestamp: &'a str,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", ts)) => timestamp = Some(ts),
                Some(("v1", sig)) => signatures.push(sig),
                // Unknown schemes (v0, ...) are ignored, as the processor
                // may add new ones.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Build a valid `stripe-signature` header for `payload`. Test-support
/// only; the service never signs anything.
#[must_use]
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={signature}")
}
