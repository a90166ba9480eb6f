//! Tool call supports.

mod arguments;
mod error;
mod object;
mod registry;

use grounded_agent_store::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use arguments::{ToolArguments, ToolCall};
pub use error::{Error, ErrorKind};
pub(crate) use object::{ToolObject, ToolObjectImpl};
pub(crate) use registry::Registry;

use crate::query::QueryExecutor;

/// The output of a tool call.
pub type ToolOutput = Result<Vec<Record>, Error>;

/// A tool that can be called by the planner.
///
/// Implementations of this trait should be stateless. Everything a call
/// needs from the current run, such as the store session, is passed in a
/// [`ToolContext`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// The input is deserialized from an object whose values are all
    /// strings.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        ctx: ToolContext,
        input: Self::Input,
    ) -> impl Future<Output = ToolOutput> + Send + 'static;
}

/// The context of a single tool call.
#[derive(Clone, Debug)]
pub struct ToolContext {
    call_id: String,
    executor: QueryExecutor,
}

impl ToolContext {
    #[inline]
    pub(crate) fn new(call_id: String, executor: QueryExecutor) -> Self {
        Self { call_id, executor }
    }

    /// Returns the id of the call being executed.
    #[inline]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Returns the query executor bound to the current run.
    #[inline]
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }
}

/// The outcome of a tool call, paired with the id of its request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolResult {
    call_id: String,
    output: ToolOutput,
}

impl ToolResult {
    #[inline]
    pub(crate) fn new(call_id: String, output: ToolOutput) -> Self {
        Self { call_id, output }
    }

    /// Returns the id of the request this result answers.
    #[inline]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Returns the records or the error of the call.
    #[inline]
    pub fn output(&self) -> &ToolOutput {
        &self.output
    }

    /// Renders the result as the text shown to the planner.
    ///
    /// Records are rendered as a JSON array, errors as the error kind and
    /// message followed by a request to fix the mistake.
    pub fn render(&self) -> String {
        match &self.output {
            Ok(records) => match serde_json::to_string(records) {
                Ok(json) => json,
                Err(err) => {
                    error!("failed to encode records: {err}");
                    format!(
                        "{}: failed to encode records: {err}",
                        ErrorKind::QueryExecution
                    )
                }
            },
            Err(err) => format!("{err}\nPlease fix your mistakes."),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_records() {
        let records: Vec<Record> = vec![
            [("name", json!("Alice")), ("age", json!(31))]
                .into_iter()
                .collect(),
            [("name", json!("Bob")), ("age", Value::Null)]
                .into_iter()
                .collect(),
        ];
        let result = ToolResult::new("call_0".to_owned(), Ok(records));
        assert_eq!(
            result.render(),
            r#"[{"name":"Alice","age":31},{"name":"Bob","age":null}]"#
        );

        let result = ToolResult::new("call_1".to_owned(), Ok(vec![]));
        assert_eq!(result.render(), "[]");
    }

    #[test]
    fn test_render_error() {
        let err = Error::query_execution().with_reason("no such table: x");
        let result = ToolResult::new("call_0".to_owned(), Err(err));
        assert_eq!(
            result.render(),
            "QueryExecutionError: no such table: x\nPlease fix your mistakes."
        );
    }
}
