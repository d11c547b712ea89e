use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MessageId, OrderId, UserId};
use domain::{Order, OrderEvent, OrderStatus};

use crate::Result;

/// A lifecycle event waiting to be handed to the broker.
///
/// Written in the same transaction as the order change that produced it, so
/// an accepted change is never lost even if the broker is down.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: MessageId,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Serializes a lifecycle event into an outbox entry.
    pub fn from_event(event: &OrderEvent) -> Result<Self> {
        Ok(Self {
            id: MessageId::new(),
            routing_key: event.routing_key().to_string(),
            payload: event.to_payload()?,
            created_at: Utc::now(),
        })
    }
}

/// Persistence for orders.
///
/// Every write carries the outbox entry for the event it produces; the order
/// row and the entry are stored atomically.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order.
    ///
    /// Fails with `Duplicate` if the ID is taken.
    async fn insert(&self, order: &Order, event: OutboxEntry) -> Result<()>;

    /// Saves a status change.
    ///
    /// `expected` is the status the order was loaded with; if the stored
    /// status differs, nothing is written and `Conflict` is returned.
    async fn update(&self, order: &Order, expected: OrderStatus, event: OutboxEntry)
    -> Result<()>;

    /// Loads an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads all orders of a user, oldest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>>;
}

/// Read side of the outbox, used by the relay.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` undispatched entries, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Marks an entry as handed to the broker.
    async fn mark_dispatched(&self, id: MessageId) -> Result<()>;
}
