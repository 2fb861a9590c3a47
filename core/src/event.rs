// Production event bus
use crate::item::ProductionItem;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Which pause a countdown belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    /// Provider quota exhausted; the same item is retried afterwards
    RateLimit,
    /// Fixed delay after a transient failure
    RetryDelay,
    /// Spacing between two successive items
    Pacing,
}

/// State transitions observable while a run is active.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductionEvent {
    RunStarted {
        run_id: Uuid,
        items: usize,
    },
    ItemUpdated {
        item: ProductionItem,
    },
    Countdown {
        item_id: Uuid,
        kind: CooldownKind,
        remaining_secs: u64,
    },
    CountdownFinished {
        item_id: Uuid,
        kind: CooldownKind,
    },
    RunFinished {
        run_id: Uuid,
        completed: usize,
        failed: usize,
        cancelled: bool,
    },
    ItemsCleared,
}

/// Event bus statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventBusStats {
    pub total_published: u64,
    pub total_delivered: u64,
}

/// Fan-out of production events to any number of observers.
///
/// Publishing never blocks the producer; a lagging subscriber loses the
/// oldest events and can re-read the item store to resynchronize.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProductionEvent>,
    published: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn publish(&self, event: ProductionEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(event) {
            Ok(n) => {
                self.delivered.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(_) => trace!(target = "event_bus", "No subscribers for production event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProductionEvent> {
        self.tx.subscribe()
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_published: self.published.load(Ordering::Relaxed),
            total_delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
