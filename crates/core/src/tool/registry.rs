use std::collections::HashMap;
use std::future::ready;

use grounded_agent_model::{ModelTool, ToolCallRequest};

use super::object::BoxedToolFuture;
use super::{Error, Tool, ToolCall, ToolContext, ToolObject, ToolObjectImpl};
use crate::query::QueryExecutor;

/// An object that manages the toolset and dispatches requests from the
/// planner.
///
/// Tools are kept in registration order, which is also the order they are
/// advertised to the planner.
#[derive(Default)]
pub(crate) struct Registry {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Registers a tool, replacing any tool with the same name in place.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        let tool = Box::new(ToolObjectImpl(tool));
        match self.index.get(&name) {
            Some(&idx) => {
                warn!("tool {name} is registered twice, replacing");
                self.tools[idx] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Turns every request into a future producing its output, and hands
    /// them to `spawner` in request order.
    ///
    /// Requests that cannot be dispatched still get a future, one that
    /// resolves to the invocation error right away, so every request is
    /// answered.
    pub fn handle_requests<S>(
        &self,
        requests: Vec<ToolCallRequest>,
        executor: &QueryExecutor,
        spawner: S,
    ) where
        S: FnMut(String, BoxedToolFuture),
    {
        let mut spawner = spawner;

        let span = debug_span!("tool registry");
        let _enter = span.enter();

        for req in requests {
            let Some(tool) =
                self.index.get(&req.name).map(|&idx| &self.tools[idx])
            else {
                warn!("tool not found: {}", req.name);
                let err = Error::unknown_tool(&req.name);
                spawner(req.id, Box::pin(ready(Err(err))));
                continue;
            };

            let call = match ToolCall::parse(&req) {
                Ok(call) => call,
                Err(err) => {
                    warn!("malformed arguments for {}: {err}", req.name);
                    spawner(req.id, Box::pin(ready(Err(err))));
                    continue;
                }
            };

            trace!(
                "spawning a tool ({}) with args: {:?}",
                call.id,
                call.arguments
            );
            let ctx = ToolContext::new(call.id.clone(), executor.clone());
            spawner(call.id, tool.execute(ctx, call.arguments));
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;
    use grounded_agent_store::Record;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::query::StoreClient;
    use crate::testing::ScriptedStore;
    use crate::tool::{ErrorKind, ToolOutput};

    static EMPTY_SCHEMA: &Value = &Value::Null;

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(&'static str);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echoes the text"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            _ctx: ToolContext,
            input: Self::Input,
        ) -> impl Future<Output = ToolOutput> + Send + 'static {
            let record: Record =
                [("text", json!(input.text))].into_iter().collect();
            ready(Ok(vec![record]))
        }
    }

    async fn executor() -> QueryExecutor {
        StoreClient::new(ScriptedStore::default())
            .open_session()
            .await
            .unwrap()
    }

    fn request(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        }
    }

    #[test]
    fn test_definitions_in_order() {
        let mut registry = Registry::default();
        registry.add_tool(EchoTool("zeta"));
        registry.add_tool(EchoTool("alpha"));
        registry.add_tool(EchoTool("zeta"));

        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_handle_requests() {
        let mut registry = Registry::default();
        registry.add_tool(EchoTool("echo"));
        let executor = executor().await;

        let requests = vec![
            request("call_0", "echo", r#"{"text": "hi"}"#),
            request("call_1", "read_file", r#"{"path": "/etc"}"#),
            request("call_2", "echo", r#"{"text": 1}"#),
            request("call_3", "echo", "{}"),
        ];

        let mut spawned_ids = vec![];
        let mut futures = vec![];
        registry.handle_requests(requests, &executor, |id, fut| {
            spawned_ids.push(id);
            futures.push(fut);
        });
        assert_eq!(spawned_ids, ["call_0", "call_1", "call_2", "call_3"]);

        let outputs = join_all(futures).await;
        let records = outputs[0].as_ref().unwrap();
        assert_eq!(records[0].get("text"), Some(&json!("hi")));
        for output in &outputs[1..] {
            let err = output.as_ref().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ToolInvocation);
        }
        assert!(
            outputs[1]
                .as_ref()
                .unwrap_err()
                .reason()
                .contains("read_file")
        );
    }
}
