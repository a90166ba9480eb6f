//! A local scripted planner for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use grounded_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let preset_events = &this.preset.events;
            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if this.preset.has_tool_call() {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct SharedState {
    requests: Mutex<Vec<ModelRequest>>,
    attempts: Mutex<HashMap<usize, u64>>,
}

/// A local scripted planner for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// planner should respond at each planning step. The response is selected by
/// counting the assistant messages in the request history, so the first
/// request gets the first response, the request after one assistant turn
/// gets the second, and so on. When the script runs out, the fallback
/// response is used if there is one, otherwise an error is returned.
///
/// Clones share the recorded requests, so keep a clone around to inspect
/// what the agent sent after moving the provider into it.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    fallback: Option<PresetResponse>,
    delay: Option<Duration>,
    state: Arc<SharedState>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Sets the response used for every step beyond the script.
    #[inline]
    pub fn set_fallback(&mut self, preset: PresetResponse) {
        self.fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.state
            .requests
            .lock()
            .expect("request log is poisoned")
            .clone()
    }

    fn select_preset(
        &self,
        req: &ModelRequest,
    ) -> Option<(usize, &PresetResponse)> {
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant(_)))
            .count();
        self.script
            .get(step_idx)
            .or(self.fallback.as_ref())
            .map(|preset| (step_idx, preset))
    }

    /// Counts this attempt and tells whether it should fail.
    fn should_fail(&self, step_idx: usize, preset: &PresetResponse) -> bool {
        let Some(failures) = preset.failures else {
            return false;
        };
        let mut attempts =
            self.state.attempts.lock().expect("attempts are poisoned");
        let attempt = attempts.entry(step_idx).or_default();
        *attempt += 1;
        failures == 0 || *attempt <= failures
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.state
            .requests
            .lock()
            .expect("request log is poisoned")
            .push(req.clone());

        let result = 'blk: {
            let Some((step_idx, preset)) = self.select_preset(req) else {
                break 'blk Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                });
            };
            if self.should_fail(step_idx, preset) {
                break 'blk Err(Error {
                    message: "simulated failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Ok(TestModelResponse {
                preset: preset.clone(),
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                event_idx: 0,
                sleep: None,
            })
        };
        ready(result)
    }
}
