//! SQLite backend for the Remand record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The write path (session commits and
//! release inference) is built from three layers: the matcher resolves
//! incoming entities to master rows, the snapshot writer maintains the
//! `[valid_from, valid_to)` history chain, and the session controller walks
//! the entity graph inside one transaction.

mod encode;
mod matcher;
mod release;
mod schema;
mod session;
mod snapshot;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
