use std::collections::{BTreeMap, HashMap, HashSet, VecDeque, hash_map::Entry};
use std::sync::Arc;

use async_trait::async_trait;
use common::{MessageId, OrderId, ProductId, UserId};
use domain::{Adjustment, InventoryOp, InventoryRecord, Order, OrderStatus};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    BatchOutcome, InventoryStore, OrderStore, OutboxEntry, OutboxStore, ReservationBatch, Result,
    StoreError,
};

#[derive(Default)]
struct OrderState {
    orders: HashMap<OrderId, Order>,
    /// Undispatched entries in write order. Dispatched entries are dropped.
    outbox: VecDeque<OutboxEntry>,
    dispatched: usize,
}

/// In-memory order store with an attached outbox.
///
/// Orders and outbox entries share one lock, which gives the same
/// all-or-nothing write as the PostgreSQL transaction.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the outbox entries not yet dispatched, oldest first.
    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.iter().cloned().collect()
    }

    /// Returns how many outbox entries have been dispatched.
    pub async fn dispatched_count(&self) -> usize {
        self.state.read().await.dispatched
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order, event: OutboxEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::Duplicate(order.id()));
        }
        state.orders.insert(order.id(), order.clone());
        state.outbox.push_back(event);
        Ok(())
    }

    async fn update(
        &self,
        order: &Order,
        expected: OrderStatus,
        event: OutboxEntry,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;
        if stored.status() != expected {
            return Err(StoreError::Conflict {
                order_id: order.id(),
            });
        }
        *stored = order.clone();
        state.outbox.push_back(event);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }
}

#[async_trait]
impl OutboxStore for InMemoryOrderStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state.outbox.iter().take(limit).cloned().collect())
    }

    async fn mark_dispatched(&self, id: MessageId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(position) = state.outbox.iter().position(|entry| entry.id == id) {
            state.outbox.remove(position);
            state.dispatched += 1;
        }
        Ok(())
    }
}

type RecordHandle = Arc<Mutex<InventoryRecord>>;

/// In-memory inventory ledger.
///
/// Each record sits behind its own mutex, so operations on one product are
/// serialized while disjoint products proceed in parallel. Batches lock
/// their products in sorted order.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    records: Arc<RwLock<HashMap<ProductId, RecordHandle>>>,
    processed: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given records.
    pub fn with_records(records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.product_id().clone(), Arc::new(Mutex::new(r))))
            .collect();
        Self {
            records: Arc::new(RwLock::new(records)),
            processed: Arc::default(),
        }
    }

    async fn handle(&self, product_id: &ProductId) -> Result<RecordHandle> {
        self.records
            .read()
            .await
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }

    /// Locks every existing product of the batch, in sorted order.
    async fn lock_batch(
        &self,
        batch: &ReservationBatch,
    ) -> BTreeMap<ProductId, OwnedMutexGuard<InventoryRecord>> {
        let handles: Vec<(ProductId, RecordHandle)> = {
            let records = self.records.read().await;
            batch
                .lock_order()
                .into_iter()
                .filter_map(|id| records.get(&id).cloned().map(|handle| (id, handle)))
                .collect()
        };

        let mut guards = BTreeMap::new();
        for (id, handle) in handles {
            guards.insert(id, handle.lock_owned().await);
        }
        guards
    }
}

/// Runs the batch against copies of the locked records and writes them back
/// only if every operation succeeded.
fn run_batch(
    guards: &mut BTreeMap<ProductId, OwnedMutexGuard<InventoryRecord>>,
    batch: &ReservationBatch,
) -> Result<Vec<Adjustment>> {
    let mut working: BTreeMap<ProductId, InventoryRecord> = guards
        .iter()
        .map(|(id, guard)| (id.clone(), (**guard).clone()))
        .collect();

    let mut adjustments = Vec::with_capacity(batch.ops().len());
    for (product_id, op) in batch.ops() {
        let record = working
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        adjustments.push(record.apply(*op)?);
    }

    for (id, record) in working {
        if let Some(guard) = guards.get_mut(&id) {
            **guard = record;
        }
    }
    Ok(adjustments)
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        match self.handle(product_id).await {
            Ok(handle) => Ok(Some(handle.lock().await.clone())),
            Err(StoreError::ProductNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<InventoryRecord>> {
        let handles: Vec<RecordHandle> = self.records.read().await.values().cloned().collect();
        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            records.push(handle.lock().await.clone());
        }
        records.sort_by(|a, b| a.product_id().cmp(b.product_id()));
        Ok(records)
    }

    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord> {
        let existing = match self.records.write().await.entry(product_id.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let record = InventoryRecord::new(product_id.clone(), quantity);
                entry.insert(Arc::new(Mutex::new(record.clone())));
                return Ok(record);
            }
        };
        let mut record = existing.lock().await;
        record.set_quantity(quantity)?;
        Ok(record.clone())
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryRecord> {
        let handle = self.handle(product_id).await?;
        let mut record = handle.lock().await;
        record.set_quantity(quantity)?;
        Ok(record.clone())
    }

    async fn apply(
        &self,
        product_id: &ProductId,
        op: InventoryOp,
    ) -> Result<(InventoryRecord, Adjustment)> {
        let handle = self.handle(product_id).await?;
        let mut record = handle.lock().await;
        let adjustment = record.apply(op)?;
        Ok((record.clone(), adjustment))
    }

    async fn apply_batch(&self, batch: &ReservationBatch) -> Result<Vec<Adjustment>> {
        let mut guards = self.lock_batch(batch).await;
        run_batch(&mut guards, batch)
    }

    async fn apply_batch_once(&self, key: &str, batch: &ReservationBatch) -> Result<BatchOutcome> {
        // Record locks before the key set: the key set is never held while
        // waiting on a record.
        let mut guards = self.lock_batch(batch).await;
        let mut processed = self.processed.lock().await;
        if processed.contains(key) {
            return Ok(BatchOutcome::AlreadyApplied);
        }
        let adjustments = run_batch(&mut guards, batch)?;
        processed.insert(key.to_string());
        Ok(BatchOutcome::Applied(adjustments))
    }
}
