//! Business components of the flash-sale transaction core.
//!
//! - [`order`] — the [`Order`] record, its [`OrderStatus`] state machine,
//!   and the [`OrderStore`] whose conditional transition arbitrates the
//!   worker-confirm vs. user-cancel race.
//! - [`Inventory`] — atomic stock reservation with rollback.
//! - [`RateLimiter`] — fixed-window request budgets per (identity, action).
//! - [`Catalog`] — the pricing collaborator consulted at order creation.

mod catalog;
mod inventory;
pub mod order;
mod ratelimit;

pub use catalog::{Catalog, InMemoryCatalog, Priced, Product};
pub use inventory::{Inventory, InventoryError};
pub use order::{InMemoryOrderStore, Order, OrderStatus, OrderStore};
pub use ratelimit::{Admission, RateLimitConfig, RateLimiter};
