//! Inventory ledger service and the reservation consumer.
//!
//! [`InventoryService`] is the synchronous inventory API.
//! [`ReservationHandler`] consumes `order.created` and reserves stock for
//! every line item of the order in one transaction.

pub mod error;
pub mod reservation;
pub mod service;

pub use error::{InventoryServiceError, Result};
pub use reservation::{RESERVATION_QUEUE, ReservationHandler, ReservationOutcome};
pub use service::InventoryService;
