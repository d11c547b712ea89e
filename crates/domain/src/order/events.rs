//! Order lifecycle events.
//!
//! Field names are camelCase on the wire and amounts are decimal numbers of
//! dollars, the shape of the shared event schema.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::event::{DomainEvent, routing};

use super::LineItem;

/// An order was placed. Carries the full line-item list for stock reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// Payment for an order was confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaid {
    pub order_id: OrderId,
    pub payment_id: String,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
}

/// An order was handed to a carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShipped {
    pub order_id: OrderId,
    pub tracking_number: String,
    pub carrier: String,
    pub shipped_at: DateTime<Utc>,
}

impl DomainEvent for OrderCreated {
    const ROUTING_KEY: &'static str = routing::ORDER_CREATED;

    fn event_type(&self) -> &'static str {
        "OrderCreated"
    }

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl DomainEvent for OrderPaid {
    const ROUTING_KEY: &'static str = routing::ORDER_PAID;

    fn event_type(&self) -> &'static str {
        "OrderPaid"
    }

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl DomainEvent for OrderShipped {
    const ROUTING_KEY: &'static str = routing::ORDER_SHIPPED;

    fn event_type(&self) -> &'static str {
        "OrderShipped"
    }

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}
