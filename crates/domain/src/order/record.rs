//! The order record.

use chrono::{DateTime, Utc};
use common::{Identity, ItemId, Money, OrderId};
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// An order as admitted by the pipeline.
///
/// Created only in `pending` after a successful reservation; moved exactly
/// once to a terminal status by whichever of {worker, cancellation path}
/// wins the conditional transition, and never mutated after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// Who placed the order.
    pub identity: Identity,

    /// The purchased item.
    pub item_id: ItemId,

    /// Item name captured at purchase time.
    pub item_name: String,

    /// Units purchased.
    pub quantity: u32,

    /// Unit price at time of purchase.
    pub unit_price: Money,

    /// `unit_price × quantity`.
    pub total: Money,

    /// Current status; owned by the order store.
    pub status: OrderStatus,

    /// When the order was admitted.
    pub created_at: DateTime<Utc>,

    /// When a terminal status was reached, if it has been.
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new pending order priced at `unit_price`.
    pub fn new(
        identity: Identity,
        item_id: ItemId,
        item_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: OrderId::new(),
            identity,
            item_id,
            item_name: item_name.into(),
            quantity,
            unit_price,
            total: unit_price.times(quantity),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            finalized_at: None,
        }
    }

    /// Age of the order relative to `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
