//! # Webhook Events
//!
//! Provider-neutral view of the webhook events this backend acts on.
//! Anything outside the closed set lands in [`EventKind::Unhandled`].

use crate::intent::PROCUREMENT_ID_KEY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why the most recent payment attempt failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payment intent as it looked when the event fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentSnapshot {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

impl PaymentIntentSnapshot {
    /// Correlation id placed on the intent when it was created
    pub fn procurement_id(&self) -> Option<&str> {
        self.metadata.get(PROCUREMENT_ID_KEY).map(|s| s.as_str())
    }
}

/// The event kinds this backend handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Funds were captured (`payment_intent.succeeded`)
    PaymentSucceeded(PaymentIntentSnapshot),
    /// The payment attempt failed (`payment_intent.payment_failed`)
    PaymentFailed(PaymentIntentSnapshot),
    /// Any other event type, kept by name
    Unhandled(String),
}

impl EventKind {
    /// Provider wire name for this kind
    pub fn name(&self) -> &str {
        match self {
            EventKind::PaymentSucceeded(_) => "payment_intent.succeeded",
            EventKind::PaymentFailed(_) => "payment_intent.payment_failed",
            EventKind::Unhandled(name) => name,
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Provider event id, unique per state transition
    pub id: String,
    pub kind: EventKind,
    pub livemode: bool,
    pub created: DateTime<Utc>,
}

impl WebhookEvent {
    /// Snapshot of the payment intent, if this kind carries one
    pub fn payment_intent(&self) -> Option<&PaymentIntentSnapshot> {
        match &self.kind {
            EventKind::PaymentSucceeded(pi) | EventKind::PaymentFailed(pi) => Some(pi),
            EventKind::Unhandled(_) => None,
        }
    }
}

/// Handed to the system of record when a payment succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub event_id: String,
    pub payment_intent_id: String,
    pub procurement_id: Option<String>,
    pub amount: i64,
    pub currency: String,
}

impl Settlement {
    pub fn from_snapshot(event_id: &str, pi: &PaymentIntentSnapshot) -> Self {
        Self {
            event_id: event_id.to_string(),
            payment_intent_id: pi.id.clone(),
            procurement_id: pi.procurement_id().map(String::from),
            amount: pi.amount,
            currency: pi.currency.clone(),
        }
    }
}

/// Handed to the system of record when a payment fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    pub event_id: String,
    pub payment_intent_id: String,
    pub procurement_id: Option<String>,
    pub amount: i64,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

impl PaymentFailure {
    pub fn from_snapshot(event_id: &str, pi: &PaymentIntentSnapshot) -> Self {
        let error = pi.last_payment_error.clone().unwrap_or_default();
        Self {
            event_id: event_id.to_string(),
            payment_intent_id: pi.id.clone(),
            procurement_id: pi.procurement_id().map(String::from),
            amount: pi.amount,
            failure_code: error.decline_code.or(error.code),
            failure_message: error.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PaymentIntentSnapshot {
        PaymentIntentSnapshot {
            id: "pi_123".into(),
            amount: 150_000,
            currency: "usd".into(),
            status: "requires_payment_method".into(),
            metadata: HashMap::from([("procurement_id".to_string(), "PO-42".to_string())]),
            last_payment_error: Some(LastPaymentError {
                code: Some("card_declined".into()),
                decline_code: Some("insufficient_funds".into()),
                message: Some("Your card has insufficient funds.".into()),
            }),
        }
    }

    #[test]
    fn test_procurement_id_from_metadata() {
        assert_eq!(snapshot().procurement_id(), Some("PO-42"));

        let mut pi = snapshot();
        pi.metadata.clear();
        assert_eq!(pi.procurement_id(), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            EventKind::PaymentSucceeded(snapshot()).name(),
            "payment_intent.succeeded"
        );
        assert_eq!(
            EventKind::Unhandled("charge.refunded".into()).name(),
            "charge.refunded"
        );
    }

    #[test]
    fn test_failure_prefers_decline_code() {
        let failure = PaymentFailure::from_snapshot("evt_1", &snapshot());
        assert_eq!(failure.failure_code.as_deref(), Some("insufficient_funds"));
        assert_eq!(failure.procurement_id.as_deref(), Some("PO-42"));
        assert_eq!(failure.event_id, "evt_1");
    }

    #[test]
    fn test_failure_without_error_detail() {
        let mut pi = snapshot();
        pi.last_payment_error = None;
        let failure = PaymentFailure::from_snapshot("evt_2", &pi);
        assert!(failure.failure_code.is_none());
        assert!(failure.failure_message.is_none());
    }
}
