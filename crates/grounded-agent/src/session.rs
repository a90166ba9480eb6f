use std::path::Path;

use grounded_agent_core::{
    Agent, AgentBuilder, AgentConfig, Answer, ConfigurationError,
    ConfigurationErrorKind, RunError, Schema, Tool, TranscriptSource,
};
use grounded_agent_model::ModelProvider;
use grounded_agent_openai_model::{OpenAIConfig, OpenAIProvider};
use grounded_agent_sqlite_store::{SqliteStore, SqliteStoreConfig};
use grounded_agent_store::Store;

use crate::tools::*;

/// The default instructions of the system message.
pub const DEFAULT_INSTRUCTIONS: &str = include_str!("./system_prompt.md");

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider)
            .with_instructions(DEFAULT_INSTRUCTIONS);
        Self { agent_builder }
    }

    /// Creates a session builder planning with an OpenAI-compatible server.
    #[inline]
    pub fn with_openai(config: OpenAIConfig) -> Self {
        Self::with_model_provider(OpenAIProvider::new(config))
    }

    /// Sets the store queried by the `query_graph` tool.
    #[inline]
    pub fn with_store<S: Store>(mut self, store: S) -> Self {
        self.agent_builder = self.agent_builder.with_store(store);
        self
    }

    /// Sets the schema shown to the planner.
    #[inline]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.agent_builder = self.agent_builder.with_schema(schema);
        self
    }

    /// Reads the schema shown to the planner from a file.
    #[inline]
    pub fn with_schema_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.agent_builder = self.agent_builder.with_schema_file(path);
        self
    }

    /// Replaces the default instructions.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.agent_builder = self.agent_builder.with_instructions(instructions);
        self
    }

    /// Replaces the whole agent configuration.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.agent_builder = self.agent_builder.with_config(config);
        self
    }

    /// Sets the number of planning steps allowed to request tools.
    #[inline]
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.agent_builder = self.agent_builder.with_step_limit(step_limit);
        self
    }

    /// Sets how many times a rate limited planning request is attempted.
    #[inline]
    pub fn with_max_planner_attempts(mut self, attempts: u32) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_planner_attempts(attempts);
        self
    }

    /// Registers an extra tool, next to `query_graph`.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Builds a new session.
    ///
    /// Fails if the schema or the store is missing, or if the store cannot
    /// be reached.
    pub async fn build(self) -> Result<Session, ConfigurationError> {
        let agent = self
            .agent_builder
            .with_tool(QueryGraphTool::new())
            .build()?;
        agent.probe_store().await?;
        debug!("session is ready");
        Ok(Session { agent })
    }
}

/// A question answering session over a graph database.
///
/// The session holds a fully configured agent that you can use directly, and
/// it is basically a wrapper around [`Agent`]. Clones share the agent, and
/// questions can be asked concurrently.
#[derive(Clone)]
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Asks a question and waits for the answer.
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer, RunError> {
        self.agent.run(question).await
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

/// Opens an SQLite store, reporting failures as configuration errors.
pub async fn open_sqlite(
    config: &SqliteStoreConfig,
) -> Result<SqliteStore, ConfigurationError> {
    SqliteStore::connect(config).await.map_err(|err| {
        ConfigurationError::new(
            ConfigurationErrorKind::StoreUnavailable,
            format!("{}: {err}", config.path().display()),
        )
    })
}
