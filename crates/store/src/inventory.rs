use async_trait::async_trait;
use common::ProductId;
use domain::{Adjustment, InventoryOp, InventoryRecord};

use crate::Result;

/// Ledger operations applied together: all of them or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationBatch {
    ops: Vec<(ProductId, InventoryOp)>,
}

impl ReservationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation. Operations run in the order they are pushed.
    pub fn push(&mut self, product_id: ProductId, op: InventoryOp) {
        self.ops.push((product_id, op));
    }

    pub fn ops(&self) -> &[(ProductId, InventoryOp)] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Distinct products touched by the batch, sorted. This is the order in
    /// which stores take their row locks.
    pub fn lock_order(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.ops.iter().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl FromIterator<(ProductId, InventoryOp)> for ReservationBatch {
    fn from_iter<T: IntoIterator<Item = (ProductId, InventoryOp)>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Result of an idempotent batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The batch ran; one adjustment per operation, in batch order.
    Applied(Vec<Adjustment>),

    /// A batch with the same key already ran; nothing changed.
    AlreadyApplied,
}

/// Persistence for the inventory ledger.
///
/// Every mutating call is atomic per product; calls touching disjoint
/// products do not wait on each other.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Loads one record.
    async fn get(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>>;

    /// Loads all records, sorted by product ID.
    async fn list(&self) -> Result<Vec<InventoryRecord>>;

    /// Creates a record with nothing reserved, or sets the quantity of an
    /// existing one keeping its reservations. A quantity below the reserved
    /// amount is rejected.
    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord>;

    /// Replaces the on-hand quantity of an existing record.
    async fn set_quantity(&self, product_id: &ProductId, quantity: u32)
    -> Result<InventoryRecord>;

    /// Applies one operation to one record.
    async fn apply(
        &self,
        product_id: &ProductId,
        op: InventoryOp,
    ) -> Result<(InventoryRecord, Adjustment)>;

    /// Applies a batch in a single transaction.
    ///
    /// Operations run in batch order; the first missing product or failing
    /// operation aborts the batch and leaves every record untouched.
    async fn apply_batch(&self, batch: &ReservationBatch) -> Result<Vec<Adjustment>>;

    /// Like [`apply_batch`](Self::apply_batch), but records `key` in the same
    /// transaction and skips batches whose key was already recorded.
    /// A failed batch does not record its key.
    async fn apply_batch_once(&self, key: &str, batch: &ReservationBatch) -> Result<BatchOutcome>;
}
