//! # procurepay-stripe
//!
//! Stripe payment strategy for procurepay.
//!
//! **StripeIntentStrategy** wraps the PaymentIntents API:
//! - one intent per procurement checkout, amount in cents, USD only
//! - automatic payment methods (cards + wallets)
//! - `procurement_id` carried as metadata and echoed back in webhooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procurepay_stripe::StripeIntentStrategy;
//! use procurepay_core::PaymentStrategy;
//!
//! let strategy = StripeIntentStrategy::from_env()?;
//! let reference = strategy.create_intent(&request).await?;
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! // In your webhook endpoint, with the untouched request body:
//! let event = strategy.verify_webhook(&body, signature)?;
//! dispatcher.dispatch(&event).await?;
//! ```

pub mod config;
pub mod intents;
pub mod signature;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use intents::StripeIntentStrategy;
pub use signature::{signature_header, WebhookVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
pub use webhook::{parse_event, REQUIRED_WEBHOOK_EVENTS};
