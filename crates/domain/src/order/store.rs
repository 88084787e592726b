//! Order store with conditional status transitions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Identity, Money, OrderId};
use store::{Result, StoreError};
use tokio::sync::RwLock;

use super::{Order, OrderStatus};

/// Storage for orders, including the conditional-transition operation that
/// arbitrates races on the terminal status.
///
/// `transition` is the single mechanism by which a status ever changes: it
/// succeeds only if the stored status equals the expected one, so at most
/// one caller can win the move out of `Pending` no matter how deliveries
/// and cancellations interleave.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with [`StoreError::Duplicate`] if the
    /// ID is already present.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Loads an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns the identity's orders, newest first.
    async fn list_for(&self, identity: &Identity) -> Result<Vec<Order>>;

    /// Conditionally moves the order from `from` to `to`, stamping
    /// `finalized_at` when `to` is terminal. Returns whether this caller
    /// won the transition; fails with [`StoreError::MissingKey`] if the
    /// order does not exist.
    async fn transition(&self, id: OrderId, from: OrderStatus, to: OrderStatus) -> Result<bool>;

    /// Number of orders currently in the given status.
    async fn count_by_status(&self, status: OrderStatus) -> Result<usize>;

    /// Sum of totals over confirmed orders.
    async fn confirmed_revenue(&self) -> Result<Money>;
}

/// In-memory order store.
///
/// Stands in for the external document store; the write lock held across
/// the check-and-set in `transition` is the moral equivalent of that
/// store's conditional update.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true if no orders are stored.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::duplicate(order.id.to_string()));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_for(&self, identity: &Identity) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| &o.identity == identity)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn transition(&self, id: OrderId, from: OrderStatus, to: OrderStatus) -> Result<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing(id.to_string()))?;

        if order.status != from {
            return Ok(false);
        }

        order.status = to;
        if to.is_terminal() {
            order.finalized_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<usize> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| o.status == status).count())
    }

    async fn confirmed_revenue(&self) -> Result<Money> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Confirmed)
            .map(|o| o.total)
            .sum())
    }
}
