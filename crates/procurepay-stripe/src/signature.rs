//! # Webhook Signature Verification
//!
//! Stripe signs each webhook with HMAC-SHA256 over `"{timestamp}.{body}"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1492774577,v1=5257a869...,v1=...,v0=...
//! ```
//!
//! Verification must run over the raw body bytes exactly as received.

use chrono::Utc;
use hmac::{Hmac, Mac};
use procurepay_core::{PaymentError, PaymentResult};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default tolerance for signature timestamps (5 minutes)
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const EXPECTED_SCHEME: &str = "v1";

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            EXPECTED_SCHEME => {
                // a malformed entry can never match, skip it
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed(
            "Unable to extract timestamp and signatures from header".to_string(),
        )
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No signatures found with expected scheme".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex-encoded `v1` signature for a payload
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a complete `Stripe-Signature` header value.
///
/// Used to sign test fixtures and local replays.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    Ok(format!(
        "t={},{}={}",
        timestamp,
        EXPECTED_SCHEME,
        compute_signature(secret, timestamp, payload)?
    ))
}

/// Verifies `Stripe-Signature` headers against a signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verify against the current clock
    pub fn verify(&self, payload: &[u8], header: &str) -> PaymentResult<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify against an explicit `now` (unix seconds).
    ///
    /// A non-positive tolerance disables the timestamp check.
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> PaymentResult<()> {
        let parsed = parse_signature_header(header)?;
        let mac = mac_for(&self.secret, parsed.timestamp, payload)?;

        // verify_slice compares in constant time
        let matched = parsed
            .signatures
            .iter()
            .any(|sig| mac.clone().verify_slice(sig).is_ok());

        if !matched {
            return Err(PaymentError::WebhookVerificationFailed(
                "No signatures found matching the expected signature for payload".to_string(),
            ));
        }

        if self.tolerance_secs > 0
            && now.saturating_sub(parsed.timestamp) > self.tolerance_secs
        {
            return Err(PaymentError::WebhookVerificationFailed(
                "Timestamp outside the tolerance zone".to_string(),
            ));
        }

        Ok(())
    }
}
