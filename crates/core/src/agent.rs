mod builder;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::Instrument;

pub use builder::AgentBuilder;
use state::RunState;

use crate::config::AgentConfig;
use crate::conversation::Conversation;
use crate::error::{ConfigurationError, ConfigurationErrorKind, RunError};
use crate::model_client::ModelClient;
use crate::query::StoreClient;
use crate::tool::Registry;

type TranscriptFn = Arc<dyn Fn(&str, TranscriptSource) + Send + Sync>;

/// Where a piece of transcript comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// The question of a run.
    User,
    /// Text streamed from the planner.
    Assistant,
    /// A rendered tool result.
    Tool,
}

/// An agent that answers questions with data retrieved from a store.
///
/// The agent itself is immutable once built. Cloning is cheap, and clones
/// can run questions concurrently: every run has its own conversation and
/// its own store session.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

pub(crate) struct AgentInner {
    model_client: ModelClient,
    store_client: StoreClient,
    registry: Registry,
    system_prompt: String,
    config: AgentConfig,
    on_transcript: Option<TranscriptFn>,
    next_run_id: AtomicU64,
}

impl Agent {
    /// Answers a question.
    ///
    /// The run ends with the planner's final answer, or an error if the
    /// planner fails, the store session cannot be opened, or the planner
    /// keeps requesting tools past the step limit.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future ends the run and
    /// releases its store session.
    pub async fn run<S: Into<String>>(
        &self,
        question: S,
    ) -> Result<Answer, RunError> {
        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        RunState::run(inner, question.into())
            .instrument(info_span!("agent run", run_id))
            .await
    }

    /// Checks that a store session can be opened.
    pub async fn probe_store(&self) -> Result<(), ConfigurationError> {
        match self.inner.store_client.open_session().await {
            Ok(_) => Ok(()),
            Err(err) => Err(ConfigurationError::new(
                ConfigurationErrorKind::StoreUnavailable,
                err.to_string(),
            )),
        }
    }

    /// Returns the system message sent at the start of every run.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.inner.system_prompt
    }

    /// Returns the configuration of this agent.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }
}

/// The final answer of a run.
#[derive(Clone, Debug)]
pub struct Answer {
    text: String,
    steps: usize,
    tool_calls: usize,
    conversation: Conversation,
}

impl Answer {
    /// Returns the answer text, with surrounding whitespace trimmed.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the number of planning steps the run took.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns the number of tool calls executed during the run.
    #[inline]
    pub fn tool_calls(&self) -> usize {
        self.tool_calls
    }

    /// Returns the whole conversation of the run.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Consumes the answer and returns the text.
    #[inline]
    pub fn into_text(self) -> String {
        self.text
    }
}
