//! # Redelivery Queue
//!
//! Ledger calls that fail after a webhook has been acknowledged are queued
//! here and retried by a background worker, out of band from the webhook
//! response.

use crate::error::PaymentResult;
use crate::event::{PaymentFailure, Settlement};
use crate::ledger::SharedLedger;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// A single call owed to the system of record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegation {
    Paid(Settlement),
    Failed(PaymentFailure),
}

impl Delegation {
    pub fn event_id(&self) -> &str {
        match self {
            Delegation::Paid(s) => &s.event_id,
            Delegation::Failed(f) => &f.event_id,
        }
    }

    pub fn procurement_id(&self) -> Option<&str> {
        match self {
            Delegation::Paid(s) => s.procurement_id.as_deref(),
            Delegation::Failed(f) => f.procurement_id.as_deref(),
        }
    }

    /// Invoke the matching ledger method
    pub async fn deliver(&self, ledger: &SharedLedger) -> PaymentResult<()> {
        match self {
            Delegation::Paid(settlement) => ledger.mark_paid(settlement).await,
            Delegation::Failed(failure) => ledger.mark_failed(failure).await,
        }
    }
}

/// Retry limits for the redelivery worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Total attempts including the one made while handling the webhook
    pub max_attempts: u32,
    /// Base delay; the n-th retry waits `backoff * n`
    pub backoff: Duration,
    /// How long shutdown waits for in-flight retries before abandoning them
    pub drain_timeout: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct Pending {
    delegation: Delegation,
    attempts: u32,
}

/// Sending half of the queue; cheap to clone
#[derive(Clone)]
pub struct RedeliveryQueue {
    tx: mpsc::UnboundedSender<Pending>,
}

impl RedeliveryQueue {
    /// Create a queue together with the worker that drains it
    pub fn new(ledger: SharedLedger, policy: RedeliveryPolicy) -> (Self, RedeliveryWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            RedeliveryWorker {
                rx,
                ledger,
                policy,
            },
        )
    }

    /// Queue a delegation that has already failed `attempts` times.
    ///
    /// Returns `false` if the worker is gone.
    pub fn enqueue(&self, delegation: Delegation, attempts: u32) -> bool {
        let event_id = delegation.event_id().to_string();
        match self.tx.send(Pending {
            delegation,
            attempts,
        }) {
            Ok(()) => true,
            Err(_) => {
                error!(event_id = %event_id, "Redelivery worker stopped, delegation dropped");
                false
            }
        }
    }
}

/// Background task retrying queued delegations
pub struct RedeliveryWorker {
    rx: mpsc::UnboundedReceiver<Pending>,
    ledger: SharedLedger,
    policy: RedeliveryPolicy,
}

impl RedeliveryWorker {
    /// Run until every [`RedeliveryQueue`] handle is dropped and all
    /// in-flight retries have finished.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but once `shutdown` resolves stop taking
    /// new work and give in-flight retries `drain_timeout` to finish.
    /// Whatever is still pending after that is abandoned and logged.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            max_attempts = self.policy.max_attempts,
            backoff_secs = self.policy.backoff.as_secs(),
            "Redelivery worker started"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut in_flight = JoinSet::new();
        let mut stopping = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(pending) => {
                        in_flight.spawn(retry(
                            pending,
                            self.ledger.clone(),
                            self.policy,
                            stop_rx.clone(),
                        ));
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                () = &mut shutdown, if !stopping => {
                    stopping = true;
                    // buffered items are still handed out before `None`
                    self.rx.close();
                }
            }
        }

        if !stopping {
            loop {
                tokio::select! {
                    joined = in_flight.join_next() => {
                        if joined.is_none() {
                            break;
                        }
                    }
                    () = &mut shutdown => {
                        stopping = true;
                        break;
                    }
                }
            }
        }

        if stopping && !in_flight.is_empty() {
            info!(
                pending = in_flight.len(),
                drain_secs = self.policy.drain_timeout.as_secs(),
                "Draining ledger redeliveries"
            );

            let drained = tokio::time::timeout(self.policy.drain_timeout, async {
                while in_flight.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                let _ = stop_tx.send(true);
                while in_flight.join_next().await.is_some() {}
            }
        }

        info!("Redelivery worker stopped");
    }
}

async fn retry(
    mut pending: Pending,
    ledger: SharedLedger,
    policy: RedeliveryPolicy,
    mut stop: watch::Receiver<bool>,
) {
    let event_id = pending.delegation.event_id().to_string();
    let procurement_id = pending
        .delegation
        .procurement_id()
        .unwrap_or("unknown")
        .to_string();

    while pending.attempts < policy.max_attempts {
        let delay = policy.backoff * pending.attempts;
        let outcome = tokio::select! {
            outcome = async {
                tokio::time::sleep(delay).await;
                pending.delegation.deliver(&ledger).await
            } => outcome,
            _ = stop.changed() => {
                error!(
                    event_id = %event_id,
                    procurement_id = %procurement_id,
                    attempts = pending.attempts,
                    "Shutting down, abandoning ledger delegation"
                );
                return;
            }
        };
        pending.attempts += 1;

        match outcome {
            Ok(()) => {
                info!(
                    event_id = %event_id,
                    procurement_id = %procurement_id,
                    attempt = pending.attempts,
                    "Redelivered to ledger"
                );
                return;
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    procurement_id = %procurement_id,
                    attempt = pending.attempts,
                    error = %e,
                    "Ledger redelivery failed"
                );
            }
        }
    }

    error!(
        event_id = %event_id,
        procurement_id = %procurement_id,
        attempts = pending.attempts,
        "Giving up on ledger delegation"
    );
}
