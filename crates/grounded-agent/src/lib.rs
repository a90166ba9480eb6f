//! An out-of-the-box agent that answers questions about a graph database.
//!
//! The crate assembles the `query_graph` tool, the default instructions, a
//! planner and a store into a [`Session`]. A local Ollama server and an
//! SQLite database whose tables model the graph are supported directly,
//! other planners and stores plug in through the core traits.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{DEFAULT_INSTRUCTIONS, Session, SessionBuilder, open_sqlite};

/// Re-exports of [`grounded_agent_core`] crate.
pub mod core {
    pub use grounded_agent_core::*;
}

/// Re-exports of the OpenAI-compatible planner.
pub mod openai {
    pub use grounded_agent_openai_model::*;
}

/// Re-exports of the SQLite store.
pub mod sqlite {
    pub use grounded_agent_sqlite_store::*;
}
