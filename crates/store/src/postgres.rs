use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MessageId, Money, OrderId, ProductId, UserId};
use domain::{Adjustment, InventoryOp, InventoryRecord, LineItem, Order, OrderStatus};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    BatchOutcome, InventoryStore, OrderStore, OutboxEntry, OutboxStore, ReservationBatch, Result,
    StoreError,
};

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed order store and outbox.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items: Vec<LineItem> = serde_json::from_value(row.try_get("items")?)?;
        let status: String = row.try_get("status")?;
        let status = status.parse::<OrderStatus>().map_err(StoreError::Corrupt)?;

        Ok(Order::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            UserId::new(row.try_get::<String, _>("user_id")?),
            items,
            Money::from_cents(row.try_get("total_cents")?),
            status,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}

async fn insert_outbox(conn: &mut PgConnection, entry: &OutboxEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox (id, routing_key, payload, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(&entry.routing_key)
    .bind(&entry.payload)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order, event: OutboxEntry) -> Result<()> {
        let items = serde_json::to_value(order.items())?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_str())
        .bind(items)
        .bind(order.total_amount().cents())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
            {
                return StoreError::Duplicate(order.id());
            }
            StoreError::Database(e)
        })?;

        insert_outbox(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        order: &Order,
        expected: OrderStatus,
        event: OutboxEntry,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET status = $2, updated_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.updated_at())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(order.id().as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict {
                    order_id: order.id(),
                },
                None => StoreError::OrderNotFound(order.id()),
            });
        }

        insert_outbox(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl OutboxStore for PostgresOrderStore {
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, routing_key, payload, created_at
            FROM outbox
            WHERE dispatched_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OutboxEntry {
                    id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    routing_key: row.try_get("routing_key")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }

    async fn mark_dispatched(&self, id: MessageId) -> Result<()> {
        sqlx::query("UPDATE outbox SET dispatched_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// PostgreSQL-backed inventory ledger.
///
/// Mutations lock the affected rows with `SELECT ... FOR UPDATE`, ordered by
/// product ID, and run the ledger arithmetic in Rust before writing back.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_record(row: PgRow) -> Result<InventoryRecord> {
    let product_id: String = row.try_get("product_id")?;
    let quantity = to_u32(row.try_get("quantity")?, &product_id)?;
    let reserved = to_u32(row.try_get("reserved")?, &product_id)?;
    Ok(InventoryRecord::with_reserved(product_id, quantity, reserved)?)
}

fn to_u32(value: i64, product_id: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("quantity {value} out of range for {product_id}")))
}

async fn lock_records(
    conn: &mut PgConnection,
    product_ids: &[ProductId],
) -> Result<BTreeMap<ProductId, InventoryRecord>> {
    let ids: Vec<String> = product_ids.iter().map(|id| id.as_str().to_string()).collect();
    let rows = sqlx::query(
        r#"
        SELECT product_id, quantity, reserved
        FROM inventory
        WHERE product_id = ANY($1)
        ORDER BY product_id
        FOR UPDATE
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|row| row_to_record(row).map(|r| (r.product_id().clone(), r)))
        .collect()
}

async fn save_record(conn: &mut PgConnection, record: &InventoryRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE inventory SET quantity = $2, reserved = $3, updated_at = NOW()
        WHERE product_id = $1
        "#,
    )
    .bind(record.product_id().as_str())
    .bind(i64::from(record.quantity()))
    .bind(i64::from(record.reserved()))
    .execute(conn)
    .await?;
    Ok(())
}

async fn run_batch(conn: &mut PgConnection, batch: &ReservationBatch) -> Result<Vec<Adjustment>> {
    let mut working = lock_records(&mut *conn, &batch.lock_order()).await?;

    let mut adjustments = Vec::with_capacity(batch.ops().len());
    for (product_id, op) in batch.ops() {
        let record = working
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        adjustments.push(record.apply(*op)?);
    }

    for record in working.values() {
        save_record(&mut *conn, record).await?;
    }
    Ok(adjustments)
}

impl PostgresInventoryStore {
    async fn locked_one(
        conn: &mut PgConnection,
        product_id: &ProductId,
    ) -> Result<InventoryRecord> {
        lock_records(conn, std::slice::from_ref(product_id))
            .await?
            .remove(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(
            "SELECT product_id, quantity, reserved FROM inventory WHERE product_id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn list(&self) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity, reserved FROM inventory ORDER BY product_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, quantity, reserved, updated_at)
            VALUES ($1, $2, 0, NOW())
            ON CONFLICT (product_id) DO NOTHING
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&mut *tx)
        .await?;

        let mut record = Self::locked_one(&mut tx, product_id).await?;
        record.set_quantity(quantity)?;
        save_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryRecord> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::locked_one(&mut tx, product_id).await?;
        record.set_quantity(quantity)?;
        save_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn apply(
        &self,
        product_id: &ProductId,
        op: InventoryOp,
    ) -> Result<(InventoryRecord, Adjustment)> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::locked_one(&mut tx, product_id).await?;
        let adjustment = record.apply(op)?;
        save_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok((record, adjustment))
    }

    async fn apply_batch(&self, batch: &ReservationBatch) -> Result<Vec<Adjustment>> {
        let mut tx = self.pool.begin().await?;
        let adjustments = run_batch(&mut tx, batch).await?;
        tx.commit().await?;
        Ok(adjustments)
    }

    async fn apply_batch_once(&self, key: &str, batch: &ReservationBatch) -> Result<BatchOutcome> {
        let mut tx = self.pool.begin().await?;

        // Blocks behind a concurrent transaction holding the same key.
        let inserted = sqlx::query(
            "INSERT INTO processed_reservations (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!(key, "reservation batch already applied");
            return Ok(BatchOutcome::AlreadyApplied);
        }

        let adjustments = run_batch(&mut tx, batch).await?;
        tx.commit().await?;
        Ok(BatchOutcome::Applied(adjustments))
    }
}
