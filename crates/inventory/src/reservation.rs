//! Consumer that reserves stock for newly created orders.

use async_trait::async_trait;
use domain::{DomainEvent, InventoryOp, OrderCreated};
use messaging::{HandlerError, Message, MessageHandler};
use store::{BatchOutcome, InventoryStore, ReservationBatch, StoreError};

use crate::service::log_clamp;
use crate::{InventoryServiceError, Result};

/// Queue the reservation consumer drains.
pub const RESERVATION_QUEUE: &str = "inventory.order-created";

/// What a reservation attempt did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Every line item was reserved.
    Reserved { lines: usize },

    /// The order was reserved by an earlier delivery; nothing changed.
    Duplicate,
}

/// Reserves the full item list of an `order.created` event in one batch.
///
/// Either every line item is reserved or none is. With deduplication on, the
/// order ID is the idempotency key, so a redelivered event reserves nothing;
/// with it off, every delivery reserves again.
pub struct ReservationHandler<S: InventoryStore> {
    store: S,
    deduplicate: bool,
}

impl<S: InventoryStore> ReservationHandler<S> {
    pub const QUEUE: &'static str = RESERVATION_QUEUE;

    pub fn new(store: S) -> Self {
        Self {
            store,
            deduplicate: true,
        }
    }

    /// Turns reservation deduplication on or off.
    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Reserves every line of `event`, in payload order.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id))]
    pub async fn reserve_order(&self, event: &OrderCreated) -> Result<ReservationOutcome> {
        let batch: ReservationBatch = event
            .items
            .iter()
            .map(|item| (item.product_id.clone(), InventoryOp::Reserve(item.quantity)))
            .collect();

        let adjustments = if self.deduplicate {
            match self
                .store
                .apply_batch_once(&event.order_id.to_string(), &batch)
                .await
            {
                Ok(BatchOutcome::Applied(adjustments)) => adjustments,
                Ok(BatchOutcome::AlreadyApplied) => {
                    tracing::info!("order already reserved, skipping");
                    return Ok(ReservationOutcome::Duplicate);
                }
                Err(e) => return Err(self.failed(e)),
            }
        } else {
            self.store
                .apply_batch(&batch)
                .await
                .map_err(|e| self.failed(e))?
        };

        for ((product_id, op), adjustment) in batch.ops().iter().zip(adjustments) {
            log_clamp(product_id, *op, adjustment);
        }

        metrics::counter!("inventory_reservations_total").increment(1);
        tracing::info!(lines = batch.ops().len(), "inventory reserved for order");
        Ok(ReservationOutcome::Reserved {
            lines: batch.ops().len(),
        })
    }

    fn failed(&self, e: StoreError) -> InventoryServiceError {
        let e = InventoryServiceError::from(e);
        let reason = match &e {
            InventoryServiceError::NotFound(_) => "product_not_found",
            InventoryServiceError::Ledger(_) => "insufficient_stock",
            InventoryServiceError::Store(_) => "store",
        };
        metrics::counter!("inventory_reservation_failures_total", "reason" => reason).increment(1);
        e
    }
}

#[async_trait]
impl<S: InventoryStore + 'static> MessageHandler for ReservationHandler<S> {
    fn name(&self) -> &'static str {
        "inventory-reservation"
    }

    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
        if message.routing_key != OrderCreated::ROUTING_KEY {
            return Err(HandlerError::reject(format!(
                "unexpected routing key {}",
                message.routing_key
            )));
        }
        let event: OrderCreated = message
            .decode()
            .map_err(|e| HandlerError::reject(format!("malformed OrderCreated: {e}")))?;

        match self.reserve_order(&event).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(order_id = %event.order_id, error = %e, "inventory reservation failed");
                Err(HandlerError::retry(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, OrderId, ProductId, UserId};
    use domain::LineItem;
    use serde_json::json;
    use store::InMemoryInventoryStore;

    async fn stocked(levels: &[(&str, u32)]) -> InMemoryInventoryStore {
        let store = InMemoryInventoryStore::new();
        for (id, quantity) in levels {
            store
                .upsert(&ProductId::new(*id), *quantity)
                .await
                .unwrap();
        }
        store
    }

    fn created(items: &[(&str, u32)]) -> OrderCreated {
        OrderCreated {
            order_id: OrderId::new(),
            user_id: UserId::new("user123"),
            items: items
                .iter()
                .map(|(id, qty)| LineItem::new(*id, "Widget", *qty, Money::from_cents(100)))
                .collect(),
            total_amount: Money::from_cents(100),
            created_at: Utc::now(),
        }
    }

    fn message(event: &OrderCreated) -> Message {
        Message::builder()
            .routing_key(OrderCreated::ROUTING_KEY)
            .payload(event)
            .unwrap()
            .try_build()
            .unwrap()
    }

    async fn reserved(store: &InMemoryInventoryStore, id: &str) -> u32 {
        store
            .get(&ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
            .reserved()
    }

    #[tokio::test]
    async fn test_reserves_every_line() {
        let store = stocked(&[("P1", 10), ("P2", 5)]).await;
        let handler = ReservationHandler::new(store.clone());

        let outcome = handler
            .reserve_order(&created(&[("P1", 2), ("P2", 3)]))
            .await
            .unwrap();

        assert_eq!(outcome, ReservationOutcome::Reserved { lines: 2 });
        assert_eq!(reserved(&store, "P1").await, 2);
        assert_eq!(reserved(&store, "P2").await, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_earlier_lines() {
        let store = stocked(&[("P1", 10), ("P2", 1)]).await;
        let handler = ReservationHandler::new(store.clone());

        let err = handler
            .reserve_order(&created(&[("P1", 2), ("P2", 3)]))
            .await
            .unwrap_err();

        assert!(err.is_insufficient_stock());
        assert_eq!(reserved(&store, "P1").await, 0);
        assert_eq!(reserved(&store, "P2").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_whole_event() {
        let store = stocked(&[("P1", 10)]).await;
        let handler = ReservationHandler::new(store.clone());

        let err = handler
            .reserve_order(&created(&[("P1", 2), ("GHOST", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, InventoryServiceError::NotFound(ref id) if id.as_str() == "GHOST"));
        assert_eq!(reserved(&store, "P1").await, 0);
    }

    #[tokio::test]
    async fn test_redelivery_is_ignored_with_deduplication() {
        let store = stocked(&[("P1", 10)]).await;
        let handler = ReservationHandler::new(store.clone());
        let event = created(&[("P1", 2)]);

        handler.reserve_order(&event).await.unwrap();
        let second = handler.reserve_order(&event).await.unwrap();

        assert_eq!(second, ReservationOutcome::Duplicate);
        assert_eq!(reserved(&store, "P1").await, 2);
    }

    #[tokio::test]
    async fn test_redelivery_reserves_twice_without_deduplication() {
        let store = stocked(&[("P1", 10)]).await;
        let handler = ReservationHandler::new(store.clone()).deduplicate(false);
        let event = created(&[("P1", 2)]);

        handler.reserve_order(&event).await.unwrap();
        handler.reserve_order(&event).await.unwrap();

        assert_eq!(reserved(&store, "P1").await, 4);
    }

    #[tokio::test]
    async fn test_failed_attempt_does_not_consume_the_key() {
        let store = stocked(&[("P1", 1)]).await;
        let handler = ReservationHandler::new(store.clone());
        let event = created(&[("P1", 2)]);

        assert!(handler.reserve_order(&event).await.is_err());

        store.set_quantity(&ProductId::new("P1"), 5).await.unwrap();
        let outcome = handler.reserve_order(&event).await.unwrap();
        assert_eq!(outcome, ReservationOutcome::Reserved { lines: 1 });
        assert_eq!(reserved(&store, "P1").await, 2);
    }

    #[tokio::test]
    async fn test_handle_maps_domain_failures_to_retry() {
        let store = stocked(&[("P1", 1)]).await;
        let handler = ReservationHandler::new(store);

        let result = handler.handle(&message(&created(&[("P1", 2)]))).await;
        assert!(matches!(result, Err(HandlerError::Retry(_))));
    }

    #[tokio::test]
    async fn test_handle_rejects_malformed_payload() {
        let handler = ReservationHandler::new(stocked(&[]).await);
        let malformed = Message::builder()
            .routing_key(OrderCreated::ROUTING_KEY)
            .payload_raw(json!({ "orderId": "not-a-uuid", "items": "none" }))
            .try_build()
            .unwrap();

        let result = handler.handle(&malformed).await;
        assert!(matches!(result, Err(HandlerError::Reject(_))));
    }

    #[tokio::test]
    async fn test_handle_rejects_other_routing_keys() {
        let handler = ReservationHandler::new(stocked(&[]).await);
        let mut wrong = message(&created(&[("P1", 1)]));
        wrong.routing_key = "order.paid".to_string();

        let result = handler.handle(&wrong).await;
        assert!(matches!(result, Err(HandlerError::Reject(_))));
    }
}
