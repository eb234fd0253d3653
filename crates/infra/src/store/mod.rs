//! Persistence boundary.
//!
//! The relational contract (unique constraints, composite membership keys,
//! cascade deletes, unit-of-work transactions) expressed as traits, plus an
//! in-memory implementation.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryStore, InMemoryTransaction};
pub use r#trait::{Store, StoreError, StoreResult, Transaction};
