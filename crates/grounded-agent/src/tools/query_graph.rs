use grounded_agent_core::tool::{
    Error as ToolError, Tool, ToolContext, ToolOutput,
};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// Parameters of [`QueryGraphTool`].
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryGraphParameters {
    #[schemars(description = "A single syntactically correct query string \
                              to execute over the GRAPH_SCHEMA database.")]
    query: String,
}

/// A tool for retrieving data from the store of the current run.
pub struct QueryGraphTool {
    parameter_schema: Value,
}

impl QueryGraphTool {
    /// Creates a new query graph tool.
    #[inline]
    pub fn new() -> Self {
        QueryGraphTool {
            parameter_schema: schema_for!(QueryGraphParameters).to_value(),
        }
    }
}

impl Default for QueryGraphTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for QueryGraphTool {
    type Input = QueryGraphParameters;

    fn name(&self) -> &str {
        "query_graph"
    }

    fn description(&self) -> &str {
        "Retrieves GRAPH_SCHEMA database data given a single syntactically \
         correct query. Returns the matching records as a JSON array."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        ctx: ToolContext,
        input: QueryGraphParameters,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                return Err(ToolError::tool_invocation()
                    .with_reason("`query` must not be empty"));
            }
            trace!("running query: {query}");
            ctx.executor().execute(query).await
        }
    }
}
