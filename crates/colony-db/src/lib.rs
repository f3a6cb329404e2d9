//! Settlement persistence for the Colony simulation.
//!
//! The engine consumes persistence through two traits: [`SettlementStore`]
//! for listing, reading and founding settlements plus scheduler bookkeeping,
//! and [`SettlementTxn`] for atomic multi-field updates of one settlement.
//! [`InMemoryStore`] implements both with per-settlement locks and
//! optimistic versioning, and can round-trip through a JSON snapshot file.
//!
//! ```text
//! Player command / tick processor
//!     |
//!     +-- begin(id) ----------> per-settlement lock + working copy
//!     |     mutate record_mut()
//!     +-- commit() -----------> version check, write back, version += 1
//!
//! Scheduler
//!     +-- record_fired() -----> last-fired window per subsystem
//! ```
//!
//! # Modules
//!
//! - [`error`] -- Shared error type
//! - [`memory`] -- The in-memory store
//! - [`snapshot`] -- Snapshot files
//! - [`store`] -- The store and transaction traits

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryStore, MemoryTxn};
pub use snapshot::{StoreSnapshot, read_snapshot, write_snapshot};
pub use store::{FiredWindows, SettlementStore, SettlementTxn};
