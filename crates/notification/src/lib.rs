//! Customer notifications for order lifecycle events.
//!
//! The [`NotificationDispatcher`] consumes `order.created`, `order.paid` and
//! `order.shipped`, formats one [`Notification`] per event and hands it to a
//! [`Notifier`]. Nothing here writes back to orders or inventory.

pub mod dispatcher;
pub mod error;
pub mod notification;
pub mod notifier;

pub use dispatcher::NotificationDispatcher;
pub use error::{NotifyError, Result};
pub use notification::{Notification, NotificationKind};
pub use notifier::{LogNotifier, Notifier, RecordingNotifier};
