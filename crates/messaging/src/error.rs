use thiserror::Error;

/// Errors raised by a broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The broker cannot be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker was shut down.
    #[error("Broker closed")]
    Closed,

    /// The queue was never declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The delivery was already acknowledged or rejected.
    #[error("Unknown delivery tag {0}")]
    UnknownDelivery(u64),
}

impl BrokerError {
    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Unavailable(_))
    }
}

/// How a handler failed to process a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Processing failed; the delivery should come back later.
    #[error("Retry: {0}")]
    Retry(String),

    /// The message can never be processed; dead-letter it now.
    #[error("Reject: {0}")]
    Reject(String),
}

impl HandlerError {
    pub fn retry(reason: impl ToString) -> Self {
        HandlerError::Retry(reason.to_string())
    }

    pub fn reject(reason: impl ToString) -> Self {
        HandlerError::Reject(reason.to_string())
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
