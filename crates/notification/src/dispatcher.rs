//! Consumer that turns lifecycle events into notifications.

use async_trait::async_trait;
use domain::{OrderEvent, routing};
use messaging::{HandlerError, Message, MessageHandler, QueueSpec};

use crate::{Notification, Notifier};

/// One queue per event type, each bound to its routing label.
pub const QUEUES: [(&str, &str); 3] = [
    ("notification.order-created", routing::ORDER_CREATED),
    ("notification.order-paid", routing::ORDER_PAID),
    ("notification.order-shipped", routing::ORDER_SHIPPED),
];

/// Queue declarations the dispatcher consumes from.
pub fn queue_specs() -> Vec<QueueSpec> {
    QUEUES
        .iter()
        .map(|(queue, key)| QueueSpec::new(*queue).bind(*key))
        .collect()
}

/// Formats every lifecycle event and sends it through a [`Notifier`].
pub struct NotificationDispatcher<N: Notifier> {
    notifier: N,
}

impl<N: Notifier> NotificationDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self { notifier }
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id(), event_type = event.event_type()))]
    pub async fn dispatch(&self, event: &OrderEvent) -> crate::Result<Notification> {
        let notification = Notification::from_event(event);
        self.notifier.send(&notification).await?;
        metrics::counter!("notifications_sent_total", "kind" => notification.kind.as_str())
            .increment(1);
        Ok(notification)
    }
}

#[async_trait]
impl<N: Notifier> MessageHandler for NotificationDispatcher<N> {
    fn name(&self) -> &'static str {
        "notification-dispatcher"
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event = OrderEvent::from_payload(&message.routing_key, message.payload.clone())
            .ok_or_else(|| {
                HandlerError::reject(format!("unexpected routing key {}", message.routing_key))
            })?
            .map_err(|e| HandlerError::reject(format!("malformed event payload: {e}")))?;

        self.dispatch(&event).await.map(|_| ()).map_err(|e| {
            tracing::warn!(order_id = %event.order_id(), error = %e, "notification not sent");
            HandlerError::retry(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationKind, RecordingNotifier};
    use chrono::Utc;
    use common::OrderId;
    use domain::OrderPaid;
    use serde_json::json;

    fn paid_message() -> Message {
        let event = OrderPaid {
            order_id: OrderId::new(),
            payment_id: "payment123".to_string(),
            payment_method: "CREDIT_CARD".to_string(),
            paid_at: Utc::now(),
        };
        Message::builder()
            .routing_key(routing::ORDER_PAID)
            .payload(&event)
            .unwrap()
            .try_build()
            .unwrap()
    }

    #[test]
    fn test_queue_specs_bind_one_label_each() {
        let specs = queue_specs();
        assert_eq!(specs.len(), 3);
        assert!(specs[0].accepts("order.created"));
        assert!(!specs[0].accepts("order.paid"));
        assert!(specs[2].accepts("order.shipped"));
    }

    #[tokio::test]
    async fn test_handle_sends_one_notification() {
        let notifier = RecordingNotifier::new();
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        dispatcher.handle(&paid_message()).await.unwrap();

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::OrderPaid);
    }

    #[tokio::test]
    async fn test_channel_failure_is_retried() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        let result = dispatcher.handle(&paid_message()).await;
        assert!(matches!(result, Err(HandlerError::Retry(_))));
        assert!(notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let dispatcher = NotificationDispatcher::new(RecordingNotifier::new());
        let message = Message::builder()
            .routing_key(routing::ORDER_SHIPPED)
            .payload_raw(json!({ "orderId": OrderId::new(), "carrier": "UPS" }))
            .try_build()
            .unwrap();

        let result = dispatcher.handle(&message).await;
        assert!(matches!(result, Err(HandlerError::Reject(_))));
    }

    #[tokio::test]
    async fn test_unknown_routing_key_is_rejected() {
        let dispatcher = NotificationDispatcher::new(RecordingNotifier::new());
        let message = Message::builder()
            .routing_key("order.cancelled")
            .payload_raw(json!({}))
            .try_build()
            .unwrap();

        let result = dispatcher.handle(&message).await;
        assert!(matches!(result, Err(HandlerError::Reject(_))));
    }
}
