use thiserror::Error;

/// Errors raised while delivering a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The delivery channel refused or lost the notification.
    #[error("Notification channel failed: {0}")]
    Channel(String),
}

/// Result type for notification delivery.
pub type Result<T> = std::result::Result<T, NotifyError>;
