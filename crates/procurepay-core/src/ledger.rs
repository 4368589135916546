//! # Procurement Ledger
//!
//! The system of record that learns about payment outcomes.
//! Implement this trait to mark procurements paid, notify buyers,
//! release goods and so on.

use crate::error::PaymentResult;
use crate::event::{PaymentFailure, Settlement};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait ProcurementLedger: Send + Sync {
    /// Called once per distinct succeeded event
    async fn mark_paid(&self, settlement: &Settlement) -> PaymentResult<()>;

    /// Called once per distinct failed event
    async fn mark_failed(&self, failure: &PaymentFailure) -> PaymentResult<()>;
}

pub type SharedLedger = Arc<dyn ProcurementLedger>;

/// Default ledger that only logs outcomes
pub struct LoggingLedger;

#[async_trait]
impl ProcurementLedger for LoggingLedger {
    async fn mark_paid(&self, settlement: &Settlement) -> PaymentResult<()> {
        info!(
            event_id = %settlement.event_id,
            payment_intent_id = %settlement.payment_intent_id,
            procurement_id = settlement.procurement_id.as_deref().unwrap_or("unknown"),
            amount = settlement.amount,
            "Payment succeeded"
        );
        Ok(())
    }

    async fn mark_failed(&self, failure: &PaymentFailure) -> PaymentResult<()> {
        warn!(
            event_id = %failure.event_id,
            payment_intent_id = %failure.payment_intent_id,
            procurement_id = failure.procurement_id.as_deref().unwrap_or("unknown"),
            failure_code = failure.failure_code.as_deref().unwrap_or("none"),
            failure_message = failure.failure_message.as_deref().unwrap_or(""),
            "Payment failed"
        );
        Ok(())
    }
}
