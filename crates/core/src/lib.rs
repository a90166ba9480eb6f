//! Core logic including the agent loop, tool dispatch, query execution and
//! the schema provider.
//!
//! An [`Agent`] answers a question by repeatedly asking the planner what to
//! do next. The planner either answers, or requests tool calls whose
//! results are appended to the conversation before planning again. Every
//! run opens its own store session, and a configured step limit bounds how
//! long a run may keep requesting tools.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod config;
pub mod conversation;
mod error;
mod model_client;
mod query;
mod schema;
#[cfg(test)]
mod testing;
pub mod tool;

pub use agent::{Agent, AgentBuilder, Answer, TranscriptSource};
pub use config::AgentConfig;
pub use error::{ConfigurationError, ConfigurationErrorKind, RunError};
pub use query::QueryExecutor;
pub use schema::Schema;
pub use tool::Tool;
