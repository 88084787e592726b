//! Atomic inventory reservation with rollback.

use common::ItemId;
use store::{CounterStore, StoreError};
use thiserror::Error;

/// Errors from inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Quantity must be at least one.
    #[error("Invalid quantity: must be at least 1")]
    InvalidQuantity,

    /// No stock counter has ever been seeded for this item.
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// Not enough units left to satisfy the reservation.
    #[error("Out of stock: {0}")]
    OutOfStock(ItemId),

    /// Counter store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-item stock counters, the sole gate between "may purchase" and
/// "must reject".
///
/// Reservation decrements the counter first and checks the result after:
/// a negative result means the claim lost, and the decrement is undone with
/// a matching increment. Both steps are single atomic counter operations,
/// so concurrent callers never act on an intermediate value and no lock is
/// held across application logic. The counter may dip negative for the
/// instant between decrement and undo, but that excursion is never
/// observable as a granted reservation.
#[derive(Clone)]
pub struct Inventory<C: CounterStore> {
    counters: C,
}

impl<C: CounterStore> Inventory<C> {
    /// Creates an inventory service over the given counter store.
    pub fn new(counters: C) -> Self {
        Self { counters }
    }

    fn stock_key(item: &ItemId) -> String {
        format!("stock:{item}")
    }

    /// Sets an item's stock counter, creating it if needed.
    pub async fn seed(&self, item: &ItemId, count: u32) -> Result<(), InventoryError> {
        self.counters
            .put(&Self::stock_key(item), i64::from(count))
            .await?;
        Ok(())
    }

    /// Adds units to an existing item's stock and returns the new count.
    pub async fn restock(&self, item: &ItemId, quantity: u32) -> Result<i64, InventoryError> {
        match self
            .counters
            .incr_by(&Self::stock_key(item), i64::from(quantity))
            .await
        {
            Ok(count) => Ok(count),
            Err(StoreError::MissingKey { .. }) => Err(InventoryError::UnknownItem(item.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the item's current stock count.
    pub async fn stock(&self, item: &ItemId) -> Result<i64, InventoryError> {
        self.counters
            .get(&Self::stock_key(item))
            .await?
            .ok_or_else(|| InventoryError::UnknownItem(item.clone()))
    }

    /// Atomically claims `quantity` units of the item's stock.
    ///
    /// The caller owes exactly one [`release`](Self::release) of the same
    /// quantity if the associated order does not reach `confirmed`.
    #[tracing::instrument(skip(self), fields(item = %item))]
    pub async fn reserve(&self, item: &ItemId, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let key = Self::stock_key(item);
        let delta = i64::from(quantity);

        // Existence check before touching the counter: reserving against an
        // unknown item must not create one.
        if self.counters.get(&key).await?.is_none() {
            return Err(InventoryError::UnknownItem(item.clone()));
        }

        let remaining = self.counters.incr_by(&key, -delta).await?;
        if remaining < 0 {
            // Lost the claim; undo the decrement.
            self.counters.incr_by(&key, delta).await?;
            metrics::counter!("reservations_rejected_total").increment(1);
            return Err(InventoryError::OutOfStock(item.clone()));
        }

        metrics::counter!("reservations_granted_total").increment(1);
        tracing::debug!(remaining, "reservation granted");
        Ok(())
    }

    /// Returns `quantity` units to the item's stock.
    ///
    /// The compensating half of a reservation; called at most once per
    /// granted reservation, by whichever path (failed fulfillment or
    /// cancellation) won the order's terminal transition.
    #[tracing::instrument(skip(self), fields(item = %item))]
    pub async fn release(&self, item: &ItemId, quantity: u32) -> Result<(), InventoryError> {
        self.counters
            .incr_by(&Self::stock_key(item), i64::from(quantity))
            .await?;
        metrics::counter!("reservations_released_total").increment(1);
        Ok(())
    }
}
