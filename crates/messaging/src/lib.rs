//! Messaging for lifecycle events.
//!
//! Publishers hand [`Message`]s to a [`MessageBroker`], which routes them by
//! routing key into durable queues bound with topic patterns. A [`Consumer`]
//! runs a pool of workers that pull deliveries from one queue and hand them
//! to a [`MessageHandler`]. Delivery is at-least-once: a delivery that is not
//! acknowledged comes back, and after too many attempts it is moved to the
//! queue's dead-letter queue.

pub mod broker;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod topology;

pub use broker::{Delivery, MessageBroker, MessagePublisher};
pub use consumer::{Consumer, ConsumerHandle, MessageHandler};
pub use error::{BrokerError, HandlerError, Result};
pub use memory::{BrokerConfig, InMemoryBroker};
pub use message::{Message, MessageBuilder};
pub use topology::{QueueSpec, dead_letter_queue, pattern_matches};
