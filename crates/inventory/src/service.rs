use common::ProductId;
use domain::{Adjustment, InventoryOp, InventoryRecord};
use store::InventoryStore;

use crate::{InventoryServiceError, Result};

/// Service for reading and adjusting stock levels.
#[derive(Clone)]
pub struct InventoryService<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> InventoryService<S> {
    /// Creates a new inventory service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the record of one product.
    #[tracing::instrument(skip(self))]
    pub async fn get_inventory(&self, product_id: &ProductId) -> Result<InventoryRecord> {
        self.store
            .get(product_id)
            .await?
            .ok_or_else(|| InventoryServiceError::NotFound(product_id.clone()))
    }

    /// Lists every record, sorted by product ID.
    pub async fn list_inventory(&self) -> Result<Vec<InventoryRecord>> {
        Ok(self.store.list().await?)
    }

    /// Creates the record of a product with `quantity` on hand, or sets the
    /// quantity of an existing one. Existing reservations are kept, and a
    /// quantity below them is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn upsert_inventory(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryRecord> {
        let record = self.store.upsert(&product_id, quantity).await?;
        tracing::info!(
            %product_id,
            quantity,
            reserved = record.reserved(),
            "inventory record stored"
        );
        Ok(record)
    }

    /// Replaces the on-hand quantity, keeping existing reservations.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryRecord> {
        Ok(self.store.set_quantity(product_id, quantity).await?)
    }

    /// Reserves stock of one product.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: &ProductId, amount: u32) -> Result<InventoryRecord> {
        self.adjust(product_id, InventoryOp::Reserve(amount)).await
    }

    /// Returns reserved stock of one product to the available pool.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: &ProductId, amount: u32) -> Result<InventoryRecord> {
        self.adjust(product_id, InventoryOp::Release(amount)).await
    }

    /// Removes shipped stock of one product.
    #[tracing::instrument(skip(self))]
    pub async fn decrease_quantity(
        &self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<InventoryRecord> {
        self.adjust(product_id, InventoryOp::DecreaseQuantity(amount))
            .await
    }

    async fn adjust(&self, product_id: &ProductId, op: InventoryOp) -> Result<InventoryRecord> {
        let (record, adjustment) = self.store.apply(product_id, op).await?;
        log_clamp(product_id, op, adjustment);
        Ok(record)
    }
}

/// Clamped releases and decreases point at a bookkeeping mismatch upstream.
pub(crate) fn log_clamp(product_id: &ProductId, op: InventoryOp, adjustment: Adjustment) {
    if adjustment.is_clamped() {
        metrics::counter!("inventory_clamped_adjustments_total").increment(1);
        tracing::warn!(
            %product_id,
            ?op,
            requested = adjustment.requested,
            applied = adjustment.applied,
            "inventory adjustment clamped at zero"
        );
    }
}
