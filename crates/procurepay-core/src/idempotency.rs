//! # Seen-Event Store
//!
//! Webhooks arrive at-least-once. Before acting on an event the dispatcher
//! claims its id here; only the first claim proceeds.

use crate::error::PaymentResult;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Mutex;

/// Default number of event ids remembered by [`MemoryEventStore`]
pub const DEFAULT_EVENT_STORE_CAPACITY: usize = 10_000;

/// Records which webhook event ids have been acted on
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Atomically record `event_id` as seen.
    ///
    /// Returns `true` for the first claim, `false` if it was already seen.
    async fn claim(&self, event_id: &str) -> PaymentResult<bool>;
}

#[derive(Default)]
struct Seen {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// Bounded in-memory store; evicts the oldest ids once full.
pub struct MemoryEventStore {
    capacity: usize,
    seen: Mutex<Seen>,
}

impl MemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: Mutex::new(Seen::default()),
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_STORE_CAPACITY)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn claim(&self, event_id: &str) -> PaymentResult<bool> {
        let mut seen = self.seen.lock().await;
        if seen.ids.contains(event_id) {
            return Ok(false);
        }

        while seen.order.len() >= self.capacity {
            match seen.order.pop_front() {
                Some(oldest) => {
                    seen.ids.remove(&oldest);
                }
                None => break,
            }
        }

        seen.ids.insert(event_id.to_string());
        seen.order.push_back(event_id.to_string());
        Ok(true)
    }
}
