use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use grounded_agent_model::ModelProvider;
use grounded_agent_store::Store;

use super::{Agent, AgentInner, TranscriptFn, TranscriptSource};
use crate::config::AgentConfig;
use crate::error::{ConfigurationError, ConfigurationErrorKind};
use crate::model_client::ModelClient;
use crate::query::StoreClient;
use crate::schema::Schema;
use crate::tool::{Registry, Tool};

const DEFAULT_INSTRUCTIONS: &str = "\
Answer the question using only data retrieved with the available tools. \
If the data does not contain the answer, say that you don't know.";

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    store_client: Option<StoreClient>,
    schema: Option<Result<Schema, ConfigurationError>>,
    instructions: Option<String>,
    config: AgentConfig,
    registry: Registry,
    on_transcript: Option<TranscriptFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            store_client: None,
            schema: None,
            instructions: None,
            config: AgentConfig::default(),
            registry: Registry::default(),
            on_transcript: None,
        }
    }

    /// Sets the store queried by tools.
    #[inline]
    pub fn with_store<S: Store>(mut self, store: S) -> Self {
        self.store_client = Some(StoreClient::new(store));
        self
    }

    /// Sets the schema shown to the planner.
    #[inline]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(Ok(schema));
        self
    }

    /// Reads the schema shown to the planner from a file. Failures are
    /// reported by [`AgentBuilder::build`].
    #[inline]
    pub fn with_schema_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.schema = Some(Schema::from_file(path));
        self
    }

    /// Replaces the default instructions of the system message.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Replaces the whole configuration.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of planning steps allowed to request tools.
    #[inline]
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.config.step_limit = step_limit;
        self
    }

    /// Sets how many times a rate limited planning request is attempted.
    /// Values below 1 are treated as 1.
    #[inline]
    pub fn with_max_planner_attempts(mut self, attempts: u32) -> Self {
        self.config.max_planner_attempts = attempts;
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.add_tool(tool);
        self
    }

    /// Attaches a callback to be invoked with every piece of transcript:
    /// the question, text streamed from the planner, and rendered tool
    /// results.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Builds the agent.
    ///
    /// Returns an error if the schema or the store is missing, or the schema
    /// file could not be read.
    pub fn build(self) -> Result<Agent, ConfigurationError> {
        let Self {
            model_client,
            store_client,
            schema,
            instructions,
            mut config,
            registry,
            on_transcript,
        } = self;

        let schema = schema.unwrap_or_else(|| {
            Err(ConfigurationError::new(
                ConfigurationErrorKind::MissingSchema,
                "no schema was provided",
            ))
        })?;
        let Some(store_client) = store_client else {
            return Err(ConfigurationError::new(
                ConfigurationErrorKind::MissingStore,
                "no store was provided",
            ));
        };
        config.max_planner_attempts = config.max_planner_attempts.max(1);

        let instructions =
            instructions.as_deref().unwrap_or(DEFAULT_INSTRUCTIONS);
        let system_prompt = schema.system_prompt(instructions);
        debug!("built an agent with config: {config:?}");

        Ok(Agent {
            inner: Arc::new(AgentInner {
                model_client,
                store_client,
                registry,
                system_prompt,
                config,
                on_transcript,
                next_run_id: AtomicU64::new(1),
            }),
        })
    }
}
