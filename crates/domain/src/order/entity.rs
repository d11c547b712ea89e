//! Order entity.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    LineItem, OrderCreated, OrderError, OrderPaid, OrderShipped, OrderStatus, PaymentDetails,
    ShipmentDetails, TransitionPolicy,
};

/// An order placed by a user.
///
/// Line items and the total are fixed when the order is placed; only the
/// status moves afterwards, through [`Order::mark_paid`] and
/// [`Order::mark_shipped`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<LineItem>,
    total_amount: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Query methods
impl Order {
    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the owning user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the line items in the order they were submitted.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Returns the total computed when the order was placed.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns when the order was placed.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the status last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

// Lifecycle methods
impl Order {
    /// Places a new order in `Pending` status.
    ///
    /// Rejects a blank user, an empty item list, and any line failing its
    /// field constraints. The total is Σ quantity × unit price.
    pub fn place(
        id: OrderId,
        user_id: UserId,
        items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if user_id.is_blank() {
            return Err(OrderError::MissingField { field: "userId" });
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut total_amount = Money::zero();
        for item in &items {
            item.validate()?;
            total_amount = item
                .subtotal()
                .and_then(|subtotal| total_amount.checked_add(subtotal))
                .ok_or(OrderError::TotalOverflow)?;
        }

        Ok(Self {
            id,
            user_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from persisted fields without re-validating.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        items: Vec<LineItem>,
        total_amount: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            items,
            total_amount,
            status,
            created_at,
            updated_at,
        }
    }

    /// Returns the event announcing this order, with the full item list.
    pub fn created_event(&self) -> OrderCreated {
        OrderCreated {
            order_id: self.id,
            user_id: self.user_id.clone(),
            items: self.items.clone(),
            total_amount: self.total_amount,
            created_at: self.created_at,
        }
    }

    /// Moves the order to `Paid` and returns the event to publish.
    pub fn mark_paid(
        &mut self,
        payment: PaymentDetails,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<OrderPaid, OrderError> {
        self.transition(OrderStatus::Paid, policy, now)?;
        Ok(OrderPaid {
            order_id: self.id,
            payment_id: payment.payment_id,
            payment_method: payment.payment_method,
            paid_at: now,
        })
    }

    /// Moves the order to `Shipped` and returns the event to publish.
    pub fn mark_shipped(
        &mut self,
        shipment: ShipmentDetails,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<OrderShipped, OrderError> {
        self.transition(OrderStatus::Shipped, policy, now)?;
        Ok(OrderShipped {
            order_id: self.id,
            tracking_number: shipment.tracking_number,
            carrier: shipment.carrier,
            shipped_at: now,
        })
    }

    fn transition(
        &mut self,
        to: OrderStatus,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !policy.permits(self.status, to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
