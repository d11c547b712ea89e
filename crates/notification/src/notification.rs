//! Notification formatting.

use std::fmt;

use common::OrderId;
use domain::OrderEvent;

/// Which lifecycle step a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    OrderCreated,
    OrderPaid,
    OrderShipped,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => "Order Created",
            NotificationKind::OrderPaid => "Order Paid",
            NotificationKind::OrderShipped => "Order Shipped",
        }
    }

    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => "order_created",
            NotificationKind::OrderPaid => "order_paid",
            NotificationKind::OrderShipped => "order_shipped",
        }
    }

    /// Customer-facing sentence.
    pub fn message(&self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => "Your order has been created successfully!",
            NotificationKind::OrderPaid => "Your payment has been processed successfully!",
            NotificationKind::OrderShipped => "Your order has been shipped!",
        }
    }
}

/// A human-readable message about one order event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub order_id: OrderId,
    /// Labelled values shown to the customer, in display order.
    pub details: Vec<(&'static str, String)>,
}

impl Notification {
    pub fn from_event(event: &OrderEvent) -> Self {
        match event {
            OrderEvent::Created(e) => Self {
                kind: NotificationKind::OrderCreated,
                order_id: e.order_id,
                details: vec![
                    ("Order ID", e.order_id.to_string()),
                    ("User ID", e.user_id.to_string()),
                    ("Total Amount", e.total_amount.to_string()),
                ],
            },
            OrderEvent::Paid(e) => Self {
                kind: NotificationKind::OrderPaid,
                order_id: e.order_id,
                details: vec![
                    ("Order ID", e.order_id.to_string()),
                    ("Payment ID", e.payment_id.clone()),
                ],
            },
            OrderEvent::Shipped(e) => Self {
                kind: NotificationKind::OrderShipped,
                order_id: e.order_id,
                details: vec![
                    ("Order ID", e.order_id.to_string()),
                    ("Tracking Number", e.tracking_number.clone()),
                    ("Carrier", e.carrier.clone()),
                ],
            },
        }
    }

    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    /// Returns the value shown under `label`, if any.
    pub fn detail(&self, label: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NOTIFICATION: {}", self.kind.title())?;
        for (label, value) in &self.details {
            writeln!(f, "{label}: {value}")?;
        }
        write!(f, "Message: {}", self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, UserId};
    use domain::{LineItem, OrderCreated, OrderPaid, OrderShipped};

    #[test]
    fn test_created_notification_shows_user_and_total() {
        let event = OrderCreated {
            order_id: OrderId::new(),
            user_id: UserId::new("user123"),
            items: vec![LineItem::new("P1", "Widget", 2, Money::from_cents(5000))],
            total_amount: Money::from_cents(10000),
            created_at: Utc::now(),
        };

        let notification = Notification::from_event(&OrderEvent::from(event.clone()));
        assert_eq!(notification.kind, NotificationKind::OrderCreated);
        assert_eq!(notification.detail("User ID"), Some("user123"));
        assert_eq!(notification.detail("Total Amount"), Some("$100.00"));
        assert_eq!(
            notification.message(),
            "Your order has been created successfully!"
        );
    }

    #[test]
    fn test_paid_notification_shows_payment_id() {
        let event = OrderPaid {
            order_id: OrderId::new(),
            payment_id: "payment123".to_string(),
            payment_method: "CREDIT_CARD".to_string(),
            paid_at: Utc::now(),
        };

        let notification = Notification::from_event(&OrderEvent::from(event));
        assert_eq!(notification.detail("Payment ID"), Some("payment123"));
        assert_eq!(notification.detail("Carrier"), None);
    }

    #[test]
    fn test_shipped_notification_renders_all_lines() {
        let order_id = OrderId::new();
        let event = OrderShipped {
            order_id,
            tracking_number: "1Z999AA1".to_string(),
            carrier: "UPS".to_string(),
            shipped_at: Utc::now(),
        };

        let rendered = Notification::from_event(&OrderEvent::from(event)).to_string();
        let expected = format!(
            "NOTIFICATION: Order Shipped\nOrder ID: {order_id}\nTracking Number: 1Z999AA1\nCarrier: UPS\nMessage: Your order has been shipped!"
        );
        assert_eq!(rendered, expected);
    }
}
