//! Order service: the synchronous order API.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{
    LineItem, Order, OrderError, OrderEvent, PaymentDetails, ShipmentDetails, TransitionPolicy,
};
use store::{OrderStore, OutboxEntry, OutboxStore, StoreError};

use crate::{OrderServiceError, OutboxRelay, Result};

/// Attempts made when a concurrent writer changes the order in between.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Settings for the order service.
#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    /// How `mark_paid`/`mark_shipped` treat the current status.
    pub transition_policy: TransitionPolicy,

    /// Payment method tag stamped on `OrderPaid`.
    pub payment_method: String,

    /// Carrier tag stamped on `OrderShipped`.
    pub carrier: String,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Unguarded,
            payment_method: "CREDIT_CARD".to_string(),
            carrier: "UPS".to_string(),
        }
    }
}

/// Service for managing orders.
///
/// Each operation stores the order and the outbox entry of its event in one
/// write, then asks the relay to publish. Publishing is fire-and-forget: if
/// the broker is down the call still succeeds and the relay loop delivers the
/// event later.
pub struct OrderService<S: OrderStore + OutboxStore> {
    store: S,
    config: OrderServiceConfig,
    relay: Option<Arc<OutboxRelay<S>>>,
}

impl<S: OrderStore + OutboxStore> OrderService<S> {
    /// Creates a service that only writes to the outbox.
    pub fn new(store: S, config: OrderServiceConfig) -> Self {
        Self {
            store,
            config,
            relay: None,
        }
    }

    /// Flushes the outbox through `relay` after every write.
    pub fn with_relay(mut self, relay: Arc<OutboxRelay<S>>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    /// Places an order in `Pending` status and emits `OrderCreated`.
    ///
    /// A rejected order stores nothing and emits nothing.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_order(&self, user_id: UserId, items: Vec<LineItem>) -> Result<Order> {
        let order = Order::place(OrderId::new(), user_id, items, Utc::now())?;
        let entry = OutboxEntry::from_event(&OrderEvent::from(order.created_event()))?;

        self.store.insert(&order, entry).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            total = %order.total_amount(),
            "order created"
        );

        self.dispatch().await;
        Ok(order)
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound(order_id))
    }

    /// Loads all orders of a user, oldest first. Unknown users have none.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_by_user(user_id).await?)
    }

    /// Marks an order as paid and emits `OrderPaid`.
    #[tracing::instrument(skip(self, payment_id))]
    pub async fn mark_paid(&self, order_id: OrderId, payment_id: impl Into<String>) -> Result<Order> {
        let payment = PaymentDetails::new(payment_id, self.config.payment_method.clone());
        self.transition(order_id, |order, policy, now| {
            order
                .mark_paid(payment.clone(), policy, now)
                .map(OrderEvent::from)
        })
        .await
    }

    /// Marks an order as shipped and emits `OrderShipped`.
    #[tracing::instrument(skip(self, tracking_number))]
    pub async fn mark_shipped(
        &self,
        order_id: OrderId,
        tracking_number: impl Into<String>,
    ) -> Result<Order> {
        let shipment = ShipmentDetails::new(tracking_number, self.config.carrier.clone());
        self.transition(order_id, |order, policy, now| {
            order
                .mark_shipped(shipment.clone(), policy, now)
                .map(OrderEvent::from)
        })
        .await
    }

    async fn transition<F>(&self, order_id: OrderId, mut apply: F) -> Result<Order>
    where
        F: FnMut(&mut Order, TransitionPolicy, DateTime<Utc>) -> std::result::Result<OrderEvent, OrderError>
            + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut order = self.get_order(order_id).await?;
            let from = order.status();
            let event = apply(&mut order, self.config.transition_policy, Utc::now())?;
            let entry = OutboxEntry::from_event(&event)?;

            match self.store.update(&order, from, entry).await {
                Ok(()) => {
                    metrics::counter!("order_transitions_total", "to" => order.status().as_str())
                        .increment(1);
                    tracing::info!(%order_id, %from, to = %order.status(), "order status changed");
                    self.dispatch().await;
                    return Ok(order);
                }
                Err(StoreError::Conflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    tracing::debug!(%order_id, attempt, "order changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn dispatch(&self) {
        let Some(relay) = &self.relay else {
            return;
        };
        if let Err(e) = relay.flush().await {
            metrics::counter!("outbox_dispatch_failures_total").increment(1);
            tracing::warn!(error = %e, "event left in outbox for the relay loop");
        }
    }
}
