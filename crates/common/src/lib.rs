//! Shared identifiers and value types used across the order platform.

mod money;
mod types;

pub use money::Money;
pub use types::{MessageId, OrderId, ProductId, UserId};
