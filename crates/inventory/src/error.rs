use common::ProductId;
use domain::InventoryError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by inventory operations.
#[derive(Debug, Error)]
pub enum InventoryServiceError {
    /// No record exists for the product.
    #[error("Product not found in inventory: {0}")]
    NotFound(ProductId),

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] InventoryError),

    /// The inventory store failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl InventoryServiceError {
    /// Returns true for insufficient stock.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(
            self,
            InventoryServiceError::Ledger(InventoryError::InsufficientStock { .. })
        )
    }
}

impl From<StoreError> for InventoryServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => InventoryServiceError::NotFound(id),
            StoreError::Inventory(e) => InventoryServiceError::Ledger(e),
            other => InventoryServiceError::Store(other),
        }
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryServiceError>;
