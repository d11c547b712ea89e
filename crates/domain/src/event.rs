//! Lifecycle event trait and the routed event union.

use common::OrderId;
use serde::{Serialize, de::DeserializeOwned};

use crate::order::{OrderCreated, OrderPaid, OrderShipped};

/// Routing labels under the order exchange.
pub mod routing {
    /// Published when an order is placed.
    pub const ORDER_CREATED: &str = "order.created";
    /// Published when payment for an order is confirmed.
    pub const ORDER_PAID: &str = "order.paid";
    /// Published when an order leaves the warehouse.
    pub const ORDER_SHIPPED: &str = "order.shipped";
}

/// Trait for events published by the order lifecycle.
///
/// Events are immutable facts named in past tense. Each carries everything a
/// consumer needs, so no consumer has to call back into the order service.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Routing label the event is published under.
    const ROUTING_KEY: &'static str;

    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the order the event is about.
    fn order_id(&self) -> OrderId;
}

/// Any lifecycle event, as produced by an order transition.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Created(OrderCreated),
    Paid(OrderPaid),
    Shipped(OrderShipped),
}

impl OrderEvent {
    /// Returns the routing label for this event.
    pub fn routing_key(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => OrderCreated::ROUTING_KEY,
            OrderEvent::Paid(_) => OrderPaid::ROUTING_KEY,
            OrderEvent::Shipped(_) => OrderShipped::ROUTING_KEY,
        }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(e) => e.event_type(),
            OrderEvent::Paid(e) => e.event_type(),
            OrderEvent::Shipped(e) => e.event_type(),
        }
    }

    /// Returns the order the event is about.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Created(e) => e.order_id(),
            OrderEvent::Paid(e) => e.order_id(),
            OrderEvent::Shipped(e) => e.order_id(),
        }
    }

    /// Serializes the event body.
    ///
    /// The body is the bare event object; its type is carried by the routing key.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            OrderEvent::Created(e) => serde_json::to_value(e),
            OrderEvent::Paid(e) => serde_json::to_value(e),
            OrderEvent::Shipped(e) => serde_json::to_value(e),
        }
    }

    /// Decodes an event body received under `routing_key`.
    ///
    /// Returns `None` for routing keys that are not lifecycle events.
    pub fn from_payload(
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Option<Result<Self, serde_json::Error>> {
        let event = match routing_key {
            routing::ORDER_CREATED => serde_json::from_value(payload).map(OrderEvent::Created),
            routing::ORDER_PAID => serde_json::from_value(payload).map(OrderEvent::Paid),
            routing::ORDER_SHIPPED => serde_json::from_value(payload).map(OrderEvent::Shipped),
            _ => return None,
        };
        Some(event)
    }
}

impl From<OrderCreated> for OrderEvent {
    fn from(event: OrderCreated) -> Self {
        OrderEvent::Created(event)
    }
}

impl From<OrderPaid> for OrderEvent {
    fn from(event: OrderPaid) -> Self {
        OrderEvent::Paid(event)
    }
}

impl From<OrderShipped> for OrderEvent {
    fn from(event: OrderShipped) -> Self {
        OrderEvent::Shipped(event)
    }
}
