//! # Stripe Webhook Events
//!
//! Decodes verified Stripe event payloads into the provider-neutral
//! [`WebhookEvent`]. Only call [`parse_event`] after the signature has
//! been checked.

use chrono::{DateTime, Utc};
use procurepay_core::{EventKind, PaymentError, PaymentIntentSnapshot, PaymentResult, WebhookEvent};
use serde::Deserialize;
use tracing::debug;

/// Events that should be enabled on the Stripe webhook endpoint
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
];

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

fn snapshot(event_type: &str, object: serde_json::Value) -> PaymentResult<PaymentIntentSnapshot> {
    serde_json::from_value(object).map_err(|e| {
        PaymentError::WebhookParseError(format!(
            "Invalid payment intent in {} event: {}",
            event_type, e
        ))
    })
}

/// Parse a verified Stripe event payload
pub fn parse_event(payload: &[u8]) -> PaymentResult<WebhookEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!(event_id = %event.id, event_type = %event.event_type, "Decoding Stripe event");

    let kind = match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            EventKind::PaymentSucceeded(snapshot(&event.event_type, event.data.object)?)
        }
        "payment_intent.payment_failed" => {
            EventKind::PaymentFailed(snapshot(&event.event_type, event.data.object)?)
        }
        _ => EventKind::Unhandled(event.event_type),
    };

    Ok(WebhookEvent {
        id: event.id,
        kind,
        livemode: event.livemode,
        created: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}
