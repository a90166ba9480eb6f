//! The planner protocol.
//!
//! This crate describes how the agent talks to a language model that plans
//! the next action: given the whole conversation and a catalog of tools, the
//! model either answers or asks for one or more tool calls.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that planner backends should adhere to. Backends live in
//! their own crates, and the agent never depends on a concrete one.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
