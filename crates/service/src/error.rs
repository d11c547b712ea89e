use messaging::BrokerError;
use thiserror::Error;

/// Errors raised while starting the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
