//! Per-product inventory ledger.
//!
//! `quantity` is the on-hand stock and `reserved` the part of it promised to
//! orders that have not shipped. The ledger keeps `0 <= reserved <= quantity`
//! after every operation.

mod record;

pub use record::{Adjustment, InventoryOp, InventoryRecord};

use common::ProductId;
use thiserror::Error;

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough unreserved stock for the requested amount.
    #[error(
        "Insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A record was built with more reserved than on hand.
    #[error("Reserved {reserved} exceeds quantity {quantity} for product {product_id}")]
    ReservedExceedsQuantity {
        product_id: ProductId,
        quantity: u32,
        reserved: u32,
    },

    /// An administrative quantity update would drop below what is reserved.
    #[error("Quantity {quantity} for product {product_id} is below reserved amount {reserved}")]
    QuantityBelowReserved {
        product_id: ProductId,
        quantity: u32,
        reserved: u32,
    },
}
