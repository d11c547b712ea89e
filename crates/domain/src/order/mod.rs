//! Order entity, state machine and lifecycle events.

mod entity;
mod events;
mod state;
mod value_objects;

pub use entity::Order;
pub use events::{OrderCreated, OrderPaid, OrderShipped};
pub use state::{OrderStatus, TransitionPolicy};
pub use value_objects::{LineItem, PaymentDetails, ShipmentDetails};

use common::{Money, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// A required field is empty.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price {price} for product {product_id} (must not be negative)")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// The order total does not fit the money type.
    #[error("Order total overflows")]
    TotalOverflow,

    /// Status transition rejected by the transition table.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl OrderError {
    /// Returns true if the error describes a malformed request.
    pub fn is_validation(&self) -> bool {
        !matches!(self, OrderError::InvalidTransition { .. })
    }
}
