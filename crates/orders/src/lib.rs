//! Order lifecycle service.
//!
//! [`OrderService`] is the only writer of order status. Every change is
//! stored together with an outbox entry for its lifecycle event; the
//! [`OutboxRelay`] hands those entries to the broker through the
//! [`EventPublisher`].

pub mod error;
pub mod publisher;
pub mod relay;
pub mod service;

pub use error::{OrderServiceError, PublishError, RelayError, Result};
pub use publisher::EventPublisher;
pub use relay::OutboxRelay;
pub use service::{OrderService, OrderServiceConfig};
