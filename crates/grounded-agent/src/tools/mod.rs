//! A set of built-in tools that planners can use.

mod query_graph;

pub use query_graph::{QueryGraphParameters, QueryGraphTool};
