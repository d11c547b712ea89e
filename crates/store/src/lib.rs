//! Persistence for orders, the outbox and the inventory ledger.
//!
//! Each store is a trait with an in-memory implementation (tests, local runs)
//! and a PostgreSQL implementation.

pub mod error;
pub mod inventory;
pub mod memory;
pub mod order;
pub mod postgres;

pub use error::{Result, StoreError};
pub use inventory::{BatchOutcome, InventoryStore, ReservationBatch};
pub use memory::{InMemoryInventoryStore, InMemoryOrderStore};
pub use order::{OrderStore, OutboxEntry, OutboxStore};
pub use postgres::{PostgresInventoryStore, PostgresOrderStore, run_migrations};
