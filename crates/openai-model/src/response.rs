use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use grounded_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // Tool calls are streamed in fragments. They are only emitted once the
    // response is complete, so the arguments are never partial.
    tool_calls: Vec<ToolCall>,
    pending_events: VecDeque<ModelResponseEvent>,
    completed: bool,
}

impl PartialState {
    fn merge_tool_call(&mut self, fragment: ToolCall) {
        let partial_tool_call = match fragment.index {
            Some(index) => self
                .tool_calls
                .iter_mut()
                .find(|t| t.index == Some(index)),
            None => None,
        };
        let Some(partial_tool_call) = partial_tool_call else {
            self.tool_calls.push(fragment);
            return;
        };

        // Patch the partial tool call.
        if let Some(id) = fragment.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(function) = fragment.function {
            let partial_func =
                partial_tool_call.function.get_or_insert_default();
            if let Some(name) = function.name {
                partial_func.name.get_or_insert_default().push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                partial_func
                    .arguments
                    .get_or_insert_default()
                    .push_str(&arguments);
            }
        }
    }

    /// Flushes the assembled tool calls followed by the completion event.
    fn complete(&mut self, finish_reason: Option<ModelFinishReason>) {
        let tool_calls = mem::take(&mut self.tool_calls);
        let finish_reason = finish_reason.unwrap_or(if tool_calls.is_empty() {
            ModelFinishReason::Stop
        } else {
            ModelFinishReason::ToolCalls
        });
        for (position, tool_call) in tool_calls.into_iter().enumerate() {
            self.pending_events.push_back(ModelResponseEvent::ToolCall(
                tool_call.into_request(position),
            ));
        }
        self.pending_events
            .push_back(ModelResponseEvent::Completed(finish_reason));
        self.completed = true;
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            tool_calls: Default::default(),
            pending_events: Default::default(),
            completed: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    loop {
        // The order of events is important. Message deltas are emitted as
        // they arrive, then the tool calls, and finally the finish reason.
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.completed {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("stream ended without a finish reason");
                partial_state.complete(None);
                continue;
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.complete(None);
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // Usage reports come in a chunk without choices.
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                partial_state
                    .pending_events
                    .push_back(ModelResponseEvent::MessageDelta(content));
            }
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            for tool_call in tool_calls {
                partial_state.merge_tool_call(tool_call);
            }
        }
        if let Some(finish_reason) = choice.finish_reason {
            let finish_reason = if finish_reason == "tool_calls" {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            };
            partial_state.complete(Some(finish_reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use grounded_agent_model::ToolCallRequest;

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(
        chunks: &[&'static str],
    ) -> Result<Vec<ModelResponseEvent>, Error> {
        let chunks = chunks
            .iter()
            .map(|chunk| Bytes::from_static(chunk.as_bytes()))
            .collect();
        let sse = Sse::new(Chunks::from_vec_deque(chunks));
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn test_message_events() {
        let events = collect_events(&[
            "data: {\"id\":\"c1\",\"choices\":[{\"delta\":\
             {\"role\":\"assistant\",\"content\":\"Alice \"}}]}\n\n",
            "data: {\"id\":\"c1\",\"choices\":[{\"delta\":\
             {\"content\":\"is 31.\"}}]}\n\n",
            "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{},\
             \"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await
        .unwrap();
        assert_eq!(
            events,
            [
                ModelResponseEvent::MessageDelta("Alice ".to_owned()),
                ModelResponseEvent::MessageDelta("is 31.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_streamed_tool_calls() {
        let events = collect_events(&[
            "data: {\"id\":\"c2\",\"choices\":[{\"delta\":{\"tool_calls\":\
             [{\"index\":0,\"id\":\"call_a\",\"type\":\"function\",\
             \"function\":{\"name\":\"query_graph\",\"arguments\":\"\"}}]}}]}\
             \n\n",
            "data: {\"id\":\"c2\",\"choices\":[{\"delta\":{\"tool_calls\":\
             [{\"index\":0,\"function\":{\"arguments\":\"{\\\"query\\\":\"}}]\
             }}]}\n\n",
            "data: {\"id\":\"c2\",\"choices\":[{\"delta\":{\"tool_calls\":\
             [{\"index\":1,\"function\":{\"name\":\"query_graph\",\
             \"arguments\":\"{}\"}}]}}]}\n\n",
            "data: {\"id\":\"c2\",\"choices\":[{\"delta\":{\"tool_calls\":\
             [{\"index\":0,\"function\":{\"arguments\":\"\\\"RETURN 1\\\"}\"}}\
             ]}}]}\n\n",
            "data: {\"id\":\"c2\",\"choices\":[{\"delta\":{},\
             \"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: {\"id\":\"c2\",\"choices\":[],\"usage\":{}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await
        .unwrap();
        assert_eq!(
            events,
            [
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_a".to_owned(),
                    name: "query_graph".to_owned(),
                    arguments: r#"{"query":"RETURN 1"}"#.to_owned(),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "query_graph".to_owned(),
                    arguments: "{}".to_owned(),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_without_finish_reason() {
        let events = collect_events(&[
            "data:{\"id\":\"c3\",\"choices\":[{\"delta\":{\"tool_calls\":\
             [{\"function\":{\"name\":\"query_graph\",\
             \"arguments\":\"{}\"}}]}}]}\n\n",
        ])
        .await
        .unwrap();
        assert_eq!(events.len(), 2);
        let ModelResponseEvent::ToolCall(req) = &events[0] else {
            panic!("expected a tool call");
        };
        assert_eq!(req.id, "call_0");
        assert_eq!(
            events[1],
            ModelResponseEvent::Completed(ModelFinishReason::ToolCalls)
        );
    }

    #[tokio::test]
    async fn test_invalid_chunk() {
        let err = collect_events(&["data: {\"choices\": 42}\n\n"])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }
}
