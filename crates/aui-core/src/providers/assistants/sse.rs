//! SSE parsing for Assistants run streams.
//!
//! The service sends deltas without snapshots, so the parser accumulates
//! text and tool-call snapshots itself and emits `*Created` the first time
//! a content part or tool call index is seen.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde::de::DeserializeOwned;

use super::types::{
    ErrorEvent, Message, MessageContent, MessageContentDelta, MessageDeltaEvent, Run, RunStep,
    RunStepDeltaEvent, StepDetails, StepDetailsDelta,
};
use crate::core::events::{AssistantEvent, Text, ToolCall};
use crate::providers::{ProviderError, ProviderResult};

/// Snapshot key: owning message or run step id, plus the part index.
type PartKey = (String, usize);

/// SSE parser producing relay events.
pub struct AssistantsSseParser<S> {
    inner: EventStream<S>,
    texts: HashMap<PartKey, Text>,
    tool_calls: HashMap<PartKey, ToolCall>,
    pending: VecDeque<AssistantEvent>,
    finished: bool,
}

impl<S> AssistantsSseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            texts: HashMap::new(),
            tool_calls: HashMap::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Maps one SSE event onto zero or more pending relay events.
    fn map_event(&mut self, event: &str, data: &str) -> ProviderResult<()> {
        let data = data.trim();
        if event == "done" || data == "[DONE]" {
            self.finished = true;
            return Ok(());
        }

        match event {
            "thread.message.delta" => {
                let payload: MessageDeltaEvent = parse(event, data)?;
                self.on_message_delta(payload);
            }
            "thread.message.completed" => {
                let payload: Message = parse(event, data)?;
                self.on_message_completed(payload);
            }
            "thread.run.step.delta" => {
                let payload: RunStepDeltaEvent = parse(event, data)?;
                self.on_step_delta(payload);
            }
            "thread.run.step.completed" => {
                let payload: RunStep = parse(event, data)?;
                self.on_step_completed(payload);
            }
            "thread.run.failed" => {
                let run: Run = parse(event, data)?;
                let error = run.last_error.unwrap_or_default();
                tracing::warn!(run_id = %run.id, status = %run.status, "run failed");
                return Err(ProviderError::api_error(error.label(), &error.message));
            }
            "error" => {
                let error = parse::<ErrorEvent>(event, data)?.into_body();
                return Err(ProviderError::api_error(error.label(), &error.message));
            }
            other => self.pending.push_back(AssistantEvent::Other {
                kind: other.to_string(),
            }),
        }
        Ok(())
    }

    fn on_message_delta(&mut self, payload: MessageDeltaEvent) {
        for part in payload.delta.content {
            let MessageContentDelta::Text { index, text: delta } = part else {
                continue;
            };

            let key = (payload.id.clone(), index);
            if !self.texts.contains_key(&key) {
                self.pending
                    .push_back(AssistantEvent::TextCreated(Text::default()));
            }
            let snapshot = self.texts.entry(key).or_default();
            snapshot.apply_delta(&delta);

            let snapshot = snapshot.clone();
            self.pending
                .push_back(AssistantEvent::TextDelta { delta, snapshot });
        }
    }

    fn on_message_completed(&mut self, message: Message) {
        self.texts.retain(|(id, _), _| *id != message.id);
        for part in message.content {
            if let MessageContent::Text { text } = part {
                self.pending.push_back(AssistantEvent::TextDone(text));
            }
        }
    }

    fn on_step_delta(&mut self, payload: RunStepDeltaEvent) {
        let Some(StepDetailsDelta::ToolCalls { tool_calls }) = payload.delta.step_details else {
            return;
        };

        for delta in tool_calls {
            let key = (payload.id.clone(), delta.index);
            let snapshot = match self.tool_calls.get_mut(&key) {
                Some(snapshot) => {
                    snapshot.apply_delta(&delta);
                    snapshot.clone()
                }
                None => {
                    let snapshot = ToolCall::from_delta(&delta);
                    self.pending
                        .push_back(AssistantEvent::ToolCallCreated(snapshot.clone()));
                    self.tool_calls.insert(key, snapshot.clone());
                    snapshot
                }
            };
            self.pending
                .push_back(AssistantEvent::ToolCallDelta { delta, snapshot });
        }
    }

    fn on_step_completed(&mut self, step: RunStep) {
        self.tool_calls.retain(|(id, _), _| *id != step.id);
        if let StepDetails::ToolCalls { tool_calls } = step.step_details {
            for call in tool_calls {
                self.pending.push_back(AssistantEvent::ToolCallDone(call));
            }
        }
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> ProviderResult<T> {
    serde_json::from_str(data)
        .map_err(|err| ProviderError::parse(format!("Failed to parse {event} payload: {err}")))
}

impl<S, E> Stream for AssistantsSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<AssistantEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if let Err(err) = self.map_event(&event.event, &event.data) {
                        self.finished = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ProviderError::parse(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    // Without `done` the run may have been cut off mid-message.
                    self.finished = true;
                    return Poll::Ready(Some(Err(ProviderError::parse(
                        "Stream ended before the run finished",
                    ))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
