use std::sync::Arc;

use futures_util::future::join_all;
use grounded_agent_model::{ModelRequest, ToolCallRequest};

use super::{AgentInner, Answer, TranscriptSource};
use crate::conversation::{Conversation, Item};
use crate::error::RunError;
use crate::model_client::PlannerStep;
use crate::query::QueryExecutor;
use crate::tool::ToolResult;

/// The stage a run is in. A run always starts with planning, and ends in
/// either `Finished` or `Aborted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RunStage {
    Planning,
    ExecutingTools(Vec<ToolCallRequest>),
    Finished(String),
    Aborted,
}

pub(crate) struct RunState {
    agent: Arc<AgentInner>,
    executor: QueryExecutor,
    conversation: Conversation,
    steps: usize,
    tool_calls: usize,
}

impl RunState {
    /// Drives a run from the question to its end.
    ///
    /// The store session lives in the state, so it is released on every
    /// way out of this function.
    pub async fn run(
        agent: Arc<AgentInner>,
        question: String,
    ) -> Result<Answer, RunError> {
        info!("run started");
        let executor = match agent.store_client.open_session().await {
            Ok(executor) => executor,
            Err(err) => {
                error!("failed to open a store session: {err}");
                return Err(RunError::Store(err));
            }
        };

        let mut state = RunState {
            conversation: Conversation::default(),
            executor,
            steps: 0,
            tool_calls: 0,
            agent,
        };
        state
            .conversation
            .push(Item::system(state.agent.system_prompt.clone()));
        state.notify(&question, TranscriptSource::User);
        state.conversation.push(Item::user(question));

        let mut stage = RunStage::Planning;
        loop {
            trace!("entering stage: {stage:?}");
            stage = match stage {
                RunStage::Planning => state.plan().await?,
                RunStage::ExecutingTools(requests) => {
                    state.execute_tools(requests).await;
                    RunStage::Planning
                }
                RunStage::Finished(text) => return Ok(state.finish(text)),
                RunStage::Aborted => return Err(state.abort()),
            };
        }
    }

    async fn plan(&mut self) -> Result<RunStage, RunError> {
        self.steps += 1;
        debug!("planning step {}", self.steps);

        let request = ModelRequest {
            messages: self.conversation.to_model_messages(),
            tools: self.agent.registry.definitions(),
        };
        let on_transcript = self.agent.on_transcript.clone();
        let resp = self
            .agent
            .model_client
            .send_request(
                request,
                self.agent.config.max_planner_attempts,
                move |delta| {
                    if let Some(on_transcript) = &on_transcript {
                        on_transcript(&delta, TranscriptSource::Assistant);
                    }
                },
            )
            .await
            .map_err(RunError::Model)?;

        match resp.into_step() {
            PlannerStep::FinalAnswer(text) => {
                self.conversation
                    .push(Item::assistant(text.clone(), Vec::new()));
                Ok(RunStage::Finished(text))
            }
            PlannerStep::ToolRequests { text, requests } => {
                if self.steps > self.agent.config.step_limit {
                    warn!(
                        "planner requested {} tool calls after {} steps",
                        requests.len(),
                        self.agent.config.step_limit
                    );
                    return Ok(RunStage::Aborted);
                }
                self.conversation
                    .push(Item::assistant(text, requests.clone()));
                Ok(RunStage::ExecutingTools(requests))
            }
        }
    }

    async fn execute_tools(&mut self, requests: Vec<ToolCallRequest>) {
        let mut call_ids = Vec::with_capacity(requests.len());
        let mut pending = Vec::with_capacity(requests.len());
        self.agent.registry.handle_requests(
            requests,
            &self.executor,
            |call_id, fut| {
                call_ids.push(call_id);
                pending.push(fut);
            },
        );

        // Outputs come back in request order, whatever order the calls
        // finish in.
        let outputs = join_all(pending).await;
        for (call_id, output) in call_ids.into_iter().zip(outputs) {
            let result = ToolResult::new(call_id, output);
            let content = result.render();
            self.notify(&content, TranscriptSource::Tool);
            self.conversation
                .push(Item::tool(result.call_id().to_owned(), content));
            self.tool_calls += 1;
        }
    }

    fn finish(self, text: String) -> Answer {
        info!(
            "answered after {} steps and {} tool calls",
            self.steps, self.tool_calls
        );
        Answer {
            text: text.trim().to_owned(),
            steps: self.steps,
            tool_calls: self.tool_calls,
            conversation: self.conversation,
        }
    }

    fn abort(self) -> RunError {
        error!("run aborted after {} steps", self.steps);
        RunError::StepLimitExceeded {
            steps: self.steps,
            conversation: self.conversation,
        }
    }

    fn notify(&self, text: &str, source: TranscriptSource) {
        if let Some(on_transcript) = &self.agent.on_transcript {
            on_transcript(text, source);
        }
    }
}
