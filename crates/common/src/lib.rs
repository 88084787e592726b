//! Shared types used across the flash-sale transaction core.
//!
//! Newtype identifiers prevent mixing up the various string/UUID keys the
//! system passes around, and [`Money`] keeps all amounts in integer cents.

mod ids;
mod money;

pub use ids::{Identity, ItemId, OrderId};
pub use money::Money;
