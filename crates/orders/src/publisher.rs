use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::MessageId;
use domain::OrderEvent;
use messaging::{Message, MessagePublisher};
use store::OutboxEntry;

use crate::PublishError;

const EVENT_TYPE_HEADER: &str = "event_type";

/// Serializes lifecycle events into routed messages.
#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn MessagePublisher>,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn MessagePublisher>) -> Self {
        Self { broker }
    }

    /// Publishes an event directly, bypassing the outbox.
    #[tracing::instrument(skip_all, fields(routing_key = event.routing_key(), order_id = %event.order_id()))]
    pub async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let message = Message {
            message_id: MessageId::new(),
            routing_key: event.routing_key().to_string(),
            payload: event.to_payload()?,
            published_at: Utc::now(),
            headers: HashMap::from([(
                EVENT_TYPE_HEADER.to_string(),
                serde_json::json!(event.event_type()),
            )]),
        };
        self.broker.publish(message).await?;
        Ok(())
    }

    /// Publishes a stored outbox entry. The message ID is the entry ID, so a
    /// relay retry produces a message consumers can recognise as the same.
    pub async fn publish_entry(&self, entry: &OutboxEntry) -> Result<(), PublishError> {
        let message = Message {
            message_id: entry.id,
            routing_key: entry.routing_key.clone(),
            payload: entry.payload.clone(),
            published_at: entry.created_at,
            headers: HashMap::new(),
        };
        self.broker.publish(message).await?;
        Ok(())
    }
}
