//! # Payment Strategy Trait
//!
//! Seam between the HTTP handlers and a hosted payment provider.
//! The Stripe implementation lives in `procurepay-stripe`; tests use fakes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentStrategy (trait)                  │
//! │  ├── create_intent()                                        │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!                  │ StripeIntent      │
//!                  │   Strategy        │
//!                  └───────────────────┘
//! ```

use crate::error::PaymentResult;
use crate::event::WebhookEvent;
use crate::intent::{IntentRequest, PaymentIntentReference};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Create a payment intent and return its client-usable reference.
    ///
    /// The request has already been validated; implementations make a
    /// single attempt and surface provider failures unchanged.
    async fn create_intent(&self, request: &IntentRequest) -> PaymentResult<PaymentIntentReference>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes, exactly as received
    /// * `signature` - Signature header from the request
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment strategy (dynamic dispatch)
pub type BoxedPaymentStrategy = Arc<dyn PaymentStrategy>;
