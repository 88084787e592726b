//! Order record, status state machine, and the order store.

mod record;
mod status;
mod store;

pub use record::Order;
pub use status::OrderStatus;
pub use store::{InMemoryOrderStore, OrderStore};
