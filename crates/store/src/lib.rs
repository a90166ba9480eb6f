//! An abstraction layer for the data stores that agents query.
//!
//! A store is described to the planner by a textual schema, and queried
//! with opaque query text. The agent never interprets the query or the
//! rows it gets back, it only moves them between the planner and the store,
//! so this crate only fixes the shape of that exchange.
//!
//! Like the model protocol, types in this crate don't define any behavior.
//! Backends implement [`Store`] in their own crates.

#![deny(missing_docs)]

mod error;
mod record;

pub use error::*;
pub use record::*;

/// A data store that hands out sessions for running queries.
///
/// The store itself is shared by every agent run, while sessions are not:
/// each run opens its own session and drops it when the run ends. Backends
/// with connection pools should return the connection to the pool when the
/// session is dropped.
pub trait Store: Send + Sync + 'static {
    /// The error type that may be returned by the store.
    type Error: StoreError;

    /// The session type for this store.
    type Session: StoreSession<Error = Self::Error>;

    /// Opens a new session.
    fn open_session(
        &self,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

/// A scoped session on a store.
pub trait StoreSession: Send + 'static {
    /// The error type that may be returned by the session.
    type Error: StoreError;

    /// Executes the query text and returns all records.
    ///
    /// Records must be returned in the order the store produced them.
    fn execute(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send;
}
