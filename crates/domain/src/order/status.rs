//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           ├──► Failed
///           └──► Cancelled
/// ```
///
/// All three targets are terminal; nothing ever leaves a terminal status.
/// Which transition wins is arbitrated by the order store's conditional
/// update, not by a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Admitted and enqueued, awaiting fulfillment.
    #[default]
    Pending,

    /// Fulfillment completed (terminal).
    Confirmed,

    /// Fulfillment failed and the reservation was released (terminal).
    Failed,

    /// Cancelled by the requester inside the cancellation window (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
