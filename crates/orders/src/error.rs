use common::OrderId;
use domain::OrderError;
use messaging::BrokerError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with the same ID already exists.
    #[error("Order already exists: {0}")]
    Duplicate(OrderId),

    /// The request or transition was rejected by the order rules.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The order store failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl OrderServiceError {
    /// Returns true if the caller sent a malformed request.
    pub fn is_validation(&self) -> bool {
        matches!(self, OrderServiceError::Order(e) if e.is_validation())
    }
}

impl From<StoreError> for OrderServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => OrderServiceError::NotFound(id),
            StoreError::Duplicate(id) => OrderServiceError::Duplicate(id),
            other => OrderServiceError::Store(other),
        }
    }
}

/// Errors raised while handing an event to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the outbox relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Outbox read failed: {0}")]
    Store(#[from] StoreError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Result type for order service operations.
pub type Result<T> = std::result::Result<T, OrderServiceError>;
