use std::future::ready;
use std::pin::Pin;

use serde_json::Value;
use tracing::Instrument;

use super::{Tool, ToolArguments, ToolContext, ToolOutput};

pub(crate) type BoxedToolFuture =
    Pin<Box<dyn Future<Output = ToolOutput> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        &self,
        ctx: ToolContext,
        arguments: ToolArguments,
    ) -> BoxedToolFuture;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        &self,
        ctx: ToolContext,
        arguments: ToolArguments,
    ) -> BoxedToolFuture {
        let input: T::Input = match arguments.deserialize() {
            Ok(input) => input,
            Err(err) => {
                warn!("invalid arguments for {}: {err}", self.name());
                return Box::pin(ready(Err(err)));
            }
        };

        let span = debug_span!(
            "tool execute",
            tool = self.name(),
            call_id = ctx.call_id()
        );
        Box::pin(self.0.execute(ctx, input).instrument(span))
    }
}
