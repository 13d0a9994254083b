//! Backing store for aeroschema
//!
//! The schema core talks to a document store through the [`Session`],
//! [`Store`] and [`Transaction`] traits: named collections, idempotent
//! index creation, per-collection validators, whole-document writes and
//! multi-document transactions. [`LocalStore`] is the bundled
//! implementation.

mod errors;
mod index;
mod local;
mod session;

pub use errors::{StoreError, StoreResult};
pub use index::{IndexDirection, IndexSpec};
pub use local::{LocalStore, LocalTransaction, StoreStats, CATALOG_FILE};
pub use session::{run_in_transaction, Session, Store, Transaction};
