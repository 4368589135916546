//! # procurepay-core
//!
//! Core types and traits for the procurepay payment backend.
//!
//! This crate provides:
//! - `CheckoutRequest` validation into an `IntentRequest`
//! - `PaymentStrategy` trait for hosted payment providers
//! - `WebhookEvent` with a closed `EventKind` variant
//! - `ProcurementLedger` trait for the system of record
//! - `EventStore` and `WebhookDispatcher` for idempotent event handling
//! - `RedeliveryQueue` for ledger calls that fail after acknowledgment
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use procurepay_core::{CheckoutRequest, IntentRequest, MerchantProfile, PaymentStrategy};
//!
//! let checkout = CheckoutRequest::new(150_000, "PO-42");
//! let request = IntentRequest::from_checkout(checkout, &MerchantProfile::default())?;
//! let reference = strategy.create_intent(&request).await?;
//!
//! // Hand reference.client_secret to the browser
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod intent;
pub mod ledger;
pub mod redelivery;
pub mod strategy;

// Re-exports for convenience
pub use dispatch::{DispatchOutcome, WebhookDispatcher};
pub use error::{PaymentError, PaymentResult};
pub use event::{
    EventKind, LastPaymentError, PaymentFailure, PaymentIntentSnapshot, Settlement, WebhookEvent,
};
pub use idempotency::{EventStore, MemoryEventStore, DEFAULT_EVENT_STORE_CAPACITY};
pub use intent::{
    CaptureMethod, CheckoutRequest, IntentRequest, MerchantProfile, PaymentIntentReference,
    SetupFutureUsage, CURRENCY,
};
pub use ledger::{LoggingLedger, ProcurementLedger, SharedLedger};
pub use redelivery::{Delegation, RedeliveryPolicy, RedeliveryQueue, RedeliveryWorker};
pub use strategy::{BoxedPaymentStrategy, PaymentStrategy};
