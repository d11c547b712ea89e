//! Domain layer for the order platform.
//!
//! This crate is free of I/O and provides:
//! - the [`Order`] entity with its `Pending → Paid → Shipped` state machine
//! - the [`InventoryRecord`] ledger with reserve/release/decrease arithmetic
//! - the lifecycle events exchanged between services ([`OrderCreated`],
//!   [`OrderPaid`], [`OrderShipped`])

pub mod event;
pub mod inventory;
pub mod order;

pub use common::{Money, OrderId, ProductId, UserId};
pub use event::{DomainEvent, OrderEvent, routing};
pub use inventory::{Adjustment, InventoryError, InventoryOp, InventoryRecord};
pub use order::{
    LineItem, Order, OrderCreated, OrderError, OrderPaid, OrderShipped, OrderStatus,
    PaymentDetails, ShipmentDetails, TransitionPolicy,
};
