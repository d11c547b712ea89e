use common::{OrderId, ProductId};
use domain::InventoryError;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    Duplicate(OrderId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No inventory record exists for the product.
    #[error("Product not found in inventory: {0}")]
    ProductNotFound(ProductId),

    /// The order changed between load and save.
    #[error("Concurrent update of order {order_id}")]
    Conflict { order_id: OrderId },

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// A stored row could not be mapped back to the domain.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
