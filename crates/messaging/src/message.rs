use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::MessageId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A message on the exchange.
///
/// The payload is the JSON body of one lifecycle event; the routing key
/// decides which queues receive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, stable across redeliveries.
    pub message_id: MessageId,

    /// The routing key (e.g., "order.created").
    pub routing_key: String,

    /// The message body as JSON.
    pub payload: serde_json::Value,

    /// When the message was first published.
    pub published_at: DateTime<Utc>,

    /// Additional headers.
    pub headers: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a new message builder.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Decodes the payload into a typed body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: Option<MessageId>,
    routing_key: Option<String>,
    payload: Option<serde_json::Value>,
    headers: HashMap<String, serde_json::Value>,
}

impl MessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Sets the routing key.
    pub fn routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a header.
    pub fn header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    /// Builds the message, returning None if the routing key or payload is missing.
    pub fn try_build(self) -> Option<Message> {
        Some(Message {
            message_id: self.message_id.unwrap_or_default(),
            routing_key: self.routing_key?,
            payload: self.payload?,
            published_at: Utc::now(),
            headers: self.headers,
        })
    }
}
