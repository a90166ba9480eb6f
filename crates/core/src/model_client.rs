use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use grounded_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, u32, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let provider = Arc::new(provider);
        let handler_fn: HandlerFn =
            Arc::new(move |req, max_attempts, on_transcript| {
                let provider = Arc::clone(&provider);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        let resp_or_err =
                            send_with_retry(&*provider, &req, max_attempts)
                                .await;
                        handle_response::<P>(resp_or_err, on_transcript).await
                    }
                    .instrument(trace_span!("model client req")),
                )
            });
        Self { handler_fn }
    }

    /// Sends a request and returns the response.
    ///
    /// Requests rejected by rate limiting are retried with exponential
    /// backoff, up to `max_attempts` attempts in total. Other errors are
    /// returned immediately.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        max_attempts: u32,
        on_transcript: impl Fn(String) + Send + 'static,
    ) -> Result<ModelClientResponse, Box<dyn ModelProviderError>> {
        (self.handler_fn)(req, max_attempts, Box::new(on_transcript)).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// Text streamed by the model.
    pub transcript: String,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

/// What the planner decided to do at a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlannerStep {
    /// The planner answered the question.
    FinalAnswer(String),
    /// The planner wants tools to be called first. Any text produced along
    /// with the requests is kept for the conversation.
    ToolRequests {
        text: String,
        requests: Vec<ToolCallRequest>,
    },
}

impl ModelClientResponse {
    /// Interprets the response. Tool requests win over text, whatever the
    /// reported finish reason is.
    pub fn into_step(self) -> PlannerStep {
        if self.tool_calls.is_empty() {
            if self.finish_reason == Some(ModelFinishReason::ToolCalls) {
                warn!("model finished for tool calls without any request");
            }
            PlannerStep::FinalAnswer(self.transcript)
        } else {
            PlannerStep::ToolRequests {
                text: self.transcript,
                requests: self.tool_calls,
            }
        }
    }
}

async fn send_with_retry<P: ModelProvider>(
    provider: &P,
    req: &ModelRequest,
    max_attempts: u32,
) -> Result<P::Response, P::Error> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_RETRY_INTERVAL)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0;
    backoff::future::retry(policy, || {
        attempt += 1;
        let current_attempt = attempt;
        let fut = provider.send_request(req);
        async move {
            fut.await.map_err(|err| {
                let retryable = err.kind() == ErrorKind::RateLimitExceeded;
                if retryable && current_attempt < max_attempts {
                    warn!("attempt {current_attempt} failed: {err}, retrying");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
                on_transcript(msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use grounded_agent_model::ModelMessage;
    use grounded_agent_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn question() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("How ".to_owned()),
            PresetEvent::MessageDelta("are ".to_owned()),
            PresetEvent::MessageDelta("you?".to_owned()),
        ]));

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let on_transcript_called = Arc::new(AtomicBool::new(false));
            let resp = model_client
                .send_request(question(), 1, {
                    let on_transcript_called =
                        Arc::clone(&on_transcript_called);
                    move |_| {
                        on_transcript_called.store(true, Ordering::Relaxed);
                    }
                })
                .await
                .unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
            assert!(on_transcript_called.load(Ordering::Relaxed));
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider.clone());
        let resp_or_err =
            model_client.send_request(question(), 3, |_| {}).await;
        let err = resp_or_err.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        // Only rate limiting is retried.
        assert_eq!(model_provider.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rate_limited() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::answer("Fine.").with_failures(2));
        let model_client = ModelClient::new(model_provider.clone());

        let resp = model_client
            .send_request(question(), 3, |_| {})
            .await
            .unwrap();
        assert_eq!(resp.transcript, "Fine.");
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::answer("Fine.").with_failures(0));
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client
            .send_request(question(), 3, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[test]
    fn test_tool_requests_win() {
        let resp = ModelClientResponse {
            transcript: "Let me check.".to_owned(),
            tool_calls: vec![ToolCallRequest {
                id: "call_0".to_owned(),
                name: "query_graph".to_owned(),
                arguments: "{}".to_owned(),
            }],
            finish_reason: Some(ModelFinishReason::Stop),
        };
        let PlannerStep::ToolRequests { text, requests } = resp.into_step()
        else {
            panic!("expected tool requests");
        };
        assert_eq!(text, "Let me check.");
        assert_eq!(requests.len(), 1);
    }
}
