//! # Webhook Dispatch
//!
//! Routes verified webhook events to the procurement ledger.
//!
//! Each handled event id is claimed in the [`EventStore`] first, so
//! redeliveries and concurrent duplicates reach the ledger at most once.
//! A failing ledger call never fails the dispatch; it is handed to the
//! [`RedeliveryQueue`] instead.

use crate::error::PaymentResult;
use crate::event::{EventKind, PaymentFailure, Settlement, WebhookEvent};
use crate::idempotency::EventStore;
use crate::ledger::SharedLedger;
use crate::redelivery::{Delegation, RedeliveryQueue};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to a dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The ledger accepted the update
    Delivered,
    /// The ledger failed; the update is queued for redelivery
    Deferred,
    /// The ledger failed and the redelivery worker is gone; the update is lost
    Dropped,
    /// This event id was already claimed
    Duplicate,
    /// Event kind is not one this backend acts on
    Ignored,
}

pub struct WebhookDispatcher {
    ledger: SharedLedger,
    store: Arc<dyn EventStore>,
    redelivery: RedeliveryQueue,
}

impl WebhookDispatcher {
    pub fn new(
        ledger: SharedLedger,
        store: Arc<dyn EventStore>,
        redelivery: RedeliveryQueue,
    ) -> Self {
        Self {
            ledger,
            store,
            redelivery,
        }
    }

    /// Dispatch a verified event.
    ///
    /// Only an event store failure is returned as an error; nothing has
    /// been delegated in that case, so the provider may safely redeliver.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.kind.name()))]
    pub async fn dispatch(&self, event: &WebhookEvent) -> PaymentResult<DispatchOutcome> {
        let delegation = match &event.kind {
            EventKind::PaymentSucceeded(pi) => {
                Delegation::Paid(Settlement::from_snapshot(&event.id, pi))
            }
            EventKind::PaymentFailed(pi) => {
                Delegation::Failed(PaymentFailure::from_snapshot(&event.id, pi))
            }
            EventKind::Unhandled(name) => {
                debug!(event_type = %name, "Ignoring unhandled webhook event");
                return Ok(DispatchOutcome::Ignored);
            }
        };

        if !self.store.claim(&event.id).await? {
            info!("Duplicate webhook event, already processed");
            return Ok(DispatchOutcome::Duplicate);
        }

        if delegation.procurement_id().is_none() {
            warn!("Payment intent carries no procurement_id metadata");
        }

        match delegation.deliver(&self.ledger).await {
            Ok(()) => Ok(DispatchOutcome::Delivered),
            Err(e) => {
                warn!(error = %e, "Ledger update failed, queueing for redelivery");
                if self.redelivery.enqueue(delegation, 1) {
                    Ok(DispatchOutcome::Deferred)
                } else {
                    Ok(DispatchOutcome::Dropped)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaymentError;
    use crate::event::PaymentIntentSnapshot;
    use crate::idempotency::MemoryEventStore;
    use crate::ledger::ProcurementLedger;
    use crate::redelivery::{RedeliveryPolicy, RedeliveryWorker};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLedger {
        paid: Mutex<Vec<Settlement>>,
        failed: Mutex<Vec<PaymentFailure>>,
        broken: bool,
    }

    #[async_trait]
    impl ProcurementLedger for RecordingLedger {
        async fn mark_paid(&self, settlement: &Settlement) -> PaymentResult<()> {
            self.paid.lock().unwrap().push(settlement.clone());
            if self.broken {
                return Err(PaymentError::Delegation("ledger offline".into()));
            }
            Ok(())
        }

        async fn mark_failed(&self, failure: &PaymentFailure) -> PaymentResult<()> {
            self.failed.lock().unwrap().push(failure.clone());
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl EventStore for BrokenStore {
        async fn claim(&self, _event_id: &str) -> PaymentResult<bool> {
            Err(PaymentError::Internal("store unavailable".into()))
        }
    }

    fn snapshot() -> PaymentIntentSnapshot {
        PaymentIntentSnapshot {
            id: "pi_1".into(),
            amount: 150_000,
            currency: "usd".into(),
            status: "succeeded".into(),
            metadata: HashMap::from([("procurement_id".to_string(), "PO-42".to_string())]),
            last_payment_error: None,
        }
    }

    fn event(id: &str, kind: EventKind) -> WebhookEvent {
        WebhookEvent {
            id: id.into(),
            kind,
            livemode: false,
            created: Utc::now(),
        }
    }

    fn dispatcher(ledger: Arc<RecordingLedger>) -> (WebhookDispatcher, RedeliveryWorker) {
        let (queue, worker) = RedeliveryQueue::new(ledger.clone(), RedeliveryPolicy::default());
        (
            WebhookDispatcher::new(ledger, Arc::new(MemoryEventStore::default()), queue),
            worker,
        )
    }

    #[tokio::test]
    async fn test_succeeded_marks_paid_once() {
        let ledger = Arc::new(RecordingLedger::default());
        let (dispatcher, _worker) = dispatcher(ledger.clone());
        let evt = event("evt_1", EventKind::PaymentSucceeded(snapshot()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Delivered);
        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Duplicate);
        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Duplicate);

        let paid = ledger.paid.lock().unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].procurement_id.as_deref(), Some("PO-42"));
        assert_eq!(paid[0].payment_intent_id, "pi_1");
    }

    #[tokio::test]
    async fn test_failed_marks_failed() {
        let ledger = Arc::new(RecordingLedger::default());
        let (dispatcher, _worker) = dispatcher(ledger.clone());
        let evt = event("evt_2", EventKind::PaymentFailed(snapshot()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Delivered);
        assert_eq!(ledger.failed.lock().unwrap().len(), 1);
        assert!(ledger.paid.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_is_ignored() {
        let ledger = Arc::new(RecordingLedger::default());
        let (dispatcher, _worker) = dispatcher(ledger.clone());
        let evt = event("evt_3", EventKind::Unhandled("charge.refunded".into()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Ignored);
        assert!(ledger.paid.lock().unwrap().is_empty());
        assert!(ledger.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_is_deferred() {
        let ledger = Arc::new(RecordingLedger {
            broken: true,
            ..Default::default()
        });
        let (dispatcher, _worker) = dispatcher(ledger.clone());
        let evt = event("evt_4", EventKind::PaymentSucceeded(snapshot()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Deferred);
        // redelivered copy from the provider must not hit the ledger again
        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Duplicate);
        assert_eq!(ledger.paid.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_without_worker_is_dropped() {
        let ledger = Arc::new(RecordingLedger {
            broken: true,
            ..Default::default()
        });
        let (dispatcher, worker) = dispatcher(ledger.clone());
        drop(worker);
        let evt = event("evt_6", EventKind::PaymentSucceeded(snapshot()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Dropped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_update_reaches_ledger_through_worker() {
        let ledger = Arc::new(RecordingLedger {
            broken: true,
            ..Default::default()
        });
        let (dispatcher, worker) = dispatcher(ledger.clone());
        let evt = event("evt_7", EventKind::PaymentSucceeded(snapshot()));

        assert_eq!(dispatcher.dispatch(&evt).await.unwrap(), DispatchOutcome::Deferred);
        drop(dispatcher);
        worker.run().await;

        // first attempt inline, then every retry up to the policy limit
        assert_eq!(
            ledger.paid.lock().unwrap().len(),
            RedeliveryPolicy::default().max_attempts as usize
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let ledger = Arc::new(RecordingLedger::default());
        let (queue, _worker) = RedeliveryQueue::new(ledger.clone(), RedeliveryPolicy::default());
        let dispatcher = WebhookDispatcher::new(ledger.clone(), Arc::new(BrokenStore), queue);
        let evt = event("evt_5", EventKind::PaymentSucceeded(snapshot()));

        assert!(dispatcher.dispatch(&evt).await.is_err());
        assert!(ledger.paid.lock().unwrap().is_empty());
    }
}
