//! Order state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Paid ──► Shipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order was placed, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed.
    Paid,

    /// Order handed to the carrier (terminal state).
    Shipped,
}

impl OrderStatus {
    /// Returns true if the transition table allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid) | (OrderStatus::Paid, OrderStatus::Shipped)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// How `mark_paid` / `mark_shipped` treat the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Overwrite the status whatever it currently is. Replaying a transition
    /// re-sets the same value and emits the event again.
    #[default]
    Unguarded,

    /// Only `Pending → Paid` and `Paid → Shipped` are accepted; everything
    /// else, including repeating a transition, is rejected.
    Guarded,
}

impl TransitionPolicy {
    /// Returns true if moving from `from` to `to` is allowed under this policy.
    pub fn permits(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Unguarded => true,
            TransitionPolicy::Guarded => from.can_transition_to(to),
        }
    }
}
