use async_trait::async_trait;

use crate::{Message, QueueSpec, Result};

/// A message handed to a consumer, awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Identifies this delivery to `ack`/`nack`.
    pub tag: u64,

    /// The queue it was taken from.
    pub queue: String,

    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,

    pub message: Message,
}

/// Publishing side of a broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Routes a message to every queue with a matching binding.
    ///
    /// Returns once the broker has accepted the message; from then on it is
    /// held in durable queues until consumed.
    async fn publish(&self, message: Message) -> Result<()>;
}

/// A topic-exchange broker with durable queues.
#[async_trait]
pub trait MessageBroker: MessagePublisher {
    /// Declares a queue, its bindings and its dead-letter queue.
    /// Declaring an existing queue adds the new bindings.
    async fn declare_queue(&self, spec: QueueSpec) -> Result<()>;

    /// Waits for the next message on `queue`.
    async fn receive(&self, queue: &str) -> Result<Delivery>;

    /// Confirms a delivery was processed.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Rejects a delivery. With `requeue` it is redelivered after a backoff
    /// unless it has used up its attempts; otherwise it is dead-lettered.
    async fn nack(&self, delivery: Delivery, requeue: bool) -> Result<()>;
}
