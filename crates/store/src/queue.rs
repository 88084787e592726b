//! Work queue with lease-based redelivery.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::OrderId;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::Result;

/// How often a blocked consumer re-checks for expired leases when no
/// enqueue wakes it up.
const RECLAIM_POLL: Duration = Duration::from_millis(25);

/// A queued reference to fulfillment work still to be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// The order this work targets.
    pub order_id: OrderId,
}

impl WorkItem {
    /// Creates a work item for the given order.
    pub fn for_order(order_id: OrderId) -> Self {
        Self { order_id }
    }
}

/// Opaque handle identifying one delivery of a work item.
///
/// Acknowledging a receipt completes that delivery; a receipt whose lease
/// has already expired is silently ignored because the item went back to
/// the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Receipt(Uuid);

/// One delivery of a work item to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The delivered item.
    pub item: WorkItem,
    /// Handle to acknowledge this delivery.
    pub receipt: Receipt,
    /// How many times this item has been delivered, this one included.
    pub attempt: u32,
}

/// A FIFO queue of [`WorkItem`]s with at-least-once delivery.
///
/// `enqueue` never waits for a consumer — that separation is the pipeline's
/// core latency guarantee. A delivery that is not acknowledged within its
/// lease becomes eligible for redelivery to another consumer with the
/// attempt count incremented; consumers bound redelivery themselves by
/// checking [`Delivery::attempt`].
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Appends an item to the queue and wakes one waiting consumer.
    async fn enqueue(&self, item: WorkItem) -> Result<()>;

    /// Takes the next item, waiting until one is available. The returned
    /// delivery must be acknowledged within `lease` or the item is
    /// redelivered.
    async fn dequeue(&self, lease: Duration) -> Result<Delivery>;

    /// Completes a delivery so the item is never redelivered.
    async fn ack(&self, receipt: Receipt) -> Result<()>;

    /// Number of items ready for delivery.
    async fn len(&self) -> usize;

    /// Number of deliveries currently out on lease.
    async fn in_flight(&self) -> usize;
}

#[derive(Debug)]
struct Leased {
    item: WorkItem,
    attempt: u32,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Ready items with the number of deliveries already made.
    ready: VecDeque<(WorkItem, u32)>,
    leased: HashMap<Receipt, Leased>,
}

impl QueueState {
    /// Moves expired leases back to the front of the ready queue.
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<Receipt> = self
            .leased
            .iter()
            .filter(|(_, l)| l.deadline <= now)
            .map(|(r, _)| *r)
            .collect();
        for receipt in expired {
            if let Some(lease) = self.leased.remove(&receipt) {
                tracing::warn!(order_id = %lease.item.order_id, attempt = lease.attempt,
                    "lease expired, requeueing work item");
                metrics::counter!("work_queue_redeliveries_total").increment(1);
                self.ready.push_front((lease.item, lease.attempt));
            }
        }
    }
}

/// In-memory work queue.
///
/// Models the external broker a deployment would use. Consumers that find
/// the queue empty park on a [`Notify`] and additionally wake on a short
/// poll interval so expired leases are reclaimed even when nothing new is
/// enqueued.
#[derive(Clone, Default)]
pub struct InMemoryWorkQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryWorkQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.ready.push_back((item, 0));
        }
        metrics::counter!("work_queue_enqueued_total").increment(1);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, lease: Duration) -> Result<Delivery> {
        loop {
            {
                let now = Instant::now();
                let mut state = self.state.lock().await;
                state.reclaim_expired(now);
                if let Some((item, prior_deliveries)) = state.ready.pop_front() {
                    let attempt = prior_deliveries + 1;
                    let receipt = Receipt(Uuid::new_v4());
                    state.leased.insert(
                        receipt,
                        Leased {
                            item,
                            attempt,
                            deadline: now + lease,
                        },
                    );
                    return Ok(Delivery {
                        item,
                        receipt,
                        attempt,
                    });
                }
            }
            // Wake on enqueue, or after a poll interval to reclaim leases.
            let _ = tokio::time::timeout(RECLAIM_POLL, self.notify.notified()).await;
        }
    }

    async fn ack(&self, receipt: Receipt) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.leased.remove(&receipt).is_none() {
            tracing::debug!("ack for unknown or expired receipt, ignoring");
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    async fn in_flight(&self) -> usize {
        self.state.lock().await.leased.len()
    }
}
