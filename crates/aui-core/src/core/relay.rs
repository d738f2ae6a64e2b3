//! Assistant event relay.
//!
//! Mirrors one streamed assistant turn into a [`ChatView`] and the session
//! [`Transcript`]. Text and code-interpreter tool calls are tracked as two
//! independent sub-streams, each with at most one live render state.
//!
//! Ordering policy differs per sub-stream:
//! - text deltas that arrive before `TextCreated` are dropped (and counted);
//! - tool-call deltas that arrive before `ToolCallCreated` open a placeholder
//!   lazily.

use futures_util::{Stream, StreamExt};

use crate::core::annotations::{AnnotationFormatter, generated_file_name, mask_links};
use crate::core::events::{
    Annotation, AssistantEvent, CodeOutput, GeneratedFile, Text, TextDelta, ToolCall,
    ToolCallDelta, ToolCallKind,
};
use crate::core::transcript::{Speaker, Transcript};
use crate::core::view::{ChatView, PlaceholderId};
use crate::providers::ProviderResult;

/// In-progress message for one sub-stream.
#[derive(Debug)]
struct RenderState {
    placeholder: PlaceholderId,
    content: String,
}

/// What a finished turn produced besides transcript entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnSummary {
    /// Files the assistant generated (download candidates).
    pub generated_files: Vec<GeneratedFile>,
    /// Number of transcript entries appended during the turn.
    pub entries_appended: usize,
    /// Text deltas dropped because no text stream was open.
    pub dropped_deltas: usize,
}

/// Per-turn relay state. Build one per turn, discard it when the turn ends.
pub struct TurnContext<'a, V: ChatView + ?Sized> {
    view: &'a mut V,
    transcript: &'a mut Transcript,
    formatter: &'a dyn AnnotationFormatter,
    text: Option<RenderState>,
    tool_call: Option<RenderState>,
    summary: TurnSummary,
}

impl<'a, V: ChatView + ?Sized> TurnContext<'a, V> {
    pub fn new(
        view: &'a mut V,
        transcript: &'a mut Transcript,
        formatter: &'a dyn AnnotationFormatter,
    ) -> Self {
        Self {
            view,
            transcript,
            formatter,
            text: None,
            tool_call: None,
            summary: TurnSummary::default(),
        }
    }

    /// Dispatches one event to its handler.
    pub fn handle(&mut self, event: AssistantEvent) {
        tracing::trace!(kind = event.kind(), "assistant event");
        match event {
            AssistantEvent::TextCreated(text) => self.on_text_created(&text),
            AssistantEvent::TextDelta { delta, snapshot } => self.on_text_delta(&delta, &snapshot),
            AssistantEvent::TextDone(text) => self.on_text_done(&text),
            AssistantEvent::ToolCallCreated(call) => self.on_tool_call_created(&call),
            AssistantEvent::ToolCallDelta { delta, .. } => self.on_tool_call_delta(&delta),
            AssistantEvent::ToolCallDone(call) => self.on_tool_call_done(&call),
            AssistantEvent::Other { .. } => {}
        }
    }

    /// Ends the turn.
    pub fn finish(self) -> TurnSummary {
        self.summary
    }

    fn on_text_created(&mut self, _text: &Text) {
        let placeholder = self.view.open_placeholder(Speaker::Assistant);
        self.text = Some(RenderState {
            placeholder,
            content: String::new(),
        });
    }

    fn on_text_delta(&mut self, _delta: &TextDelta, snapshot: &Text) {
        if snapshot.value.is_empty() {
            return;
        }
        let Some(state) = self.text.as_mut() else {
            tracing::warn!("text delta before text_created; dropped");
            self.summary.dropped_deltas += 1;
            return;
        };

        state.content = mask_links(&snapshot.value);
        self.view.render(state.placeholder, &state.content);
    }

    fn on_text_done(&mut self, text: &Text) {
        let formatted = self.formatter.format(text);

        match self.text.take() {
            Some(state) => self.view.render(state.placeholder, &formatted),
            None => self.view.message(Speaker::Assistant, &formatted),
        }
        self.append(formatted);

        for annotation in &text.annotations {
            if let Annotation::FilePath { text, file_path } = annotation {
                self.record_file(
                    &file_path.file_id,
                    generated_file_name(text, &file_path.file_id),
                );
            }
        }
    }

    fn on_tool_call_created(&mut self, call: &ToolCall) {
        if !matches!(call, ToolCall::CodeInterpreter { .. }) {
            return;
        }
        self.open_tool_call();
    }

    fn on_tool_call_delta(&mut self, delta: &ToolCallDelta) {
        if delta.kind != ToolCallKind::CodeInterpreter {
            return;
        }
        if self.tool_call.is_none() {
            tracing::debug!("tool call delta before tool_call_created; opening placeholder");
            self.open_tool_call();
        }
        let Some(state) = self.tool_call.as_mut() else {
            return;
        };

        // Log outputs are only surfaced once the call completes.
        if let Some(input) = delta.code_input_fragment() {
            state.content.push_str(input);
            self.view
                .render(state.placeholder, &code_input_block(&state.content));
        }
    }

    fn on_tool_call_done(&mut self, call: &ToolCall) {
        let ToolCall::CodeInterpreter {
            code_interpreter, ..
        } = call
        else {
            return;
        };

        let input_block = code_input_block(&code_interpreter.input);
        let state = match self.tool_call.take() {
            Some(state) => state,
            None => RenderState {
                placeholder: self.view.open_placeholder(Speaker::Assistant),
                content: String::new(),
            },
        };
        self.view.render(state.placeholder, &input_block);
        self.append(input_block);

        for output in &code_interpreter.outputs {
            match output {
                CodeOutput::Logs { logs } => {
                    let block = code_output_block(logs);
                    self.view.message(Speaker::Assistant, &block);
                    self.append(block);
                }
                CodeOutput::Image { image } => {
                    self.record_file(&image.file_id, format!("{}.png", image.file_id));
                }
            }
        }
    }

    fn open_tool_call(&mut self) {
        let placeholder = self.view.open_placeholder(Speaker::Assistant);
        self.tool_call = Some(RenderState {
            placeholder,
            content: String::new(),
        });
    }

    fn append(&mut self, message: String) {
        self.transcript.push(Speaker::Assistant, message);
        self.summary.entries_appended += 1;
    }

    fn record_file(&mut self, file_id: &str, file_name: String) {
        let files = &mut self.summary.generated_files;
        if files.iter().any(|f| f.file_id == file_id) {
            return;
        }
        files.push(GeneratedFile {
            file_id: file_id.to_string(),
            file_name,
        });
    }
}

/// Markdown for code interpreter input.
pub fn code_input_block(input: &str) -> String {
    format!("### code interpreter\ninput:\n```python\n{input}\n```")
}

/// Markdown for one code interpreter log output.
pub fn code_output_block(logs: &str) -> String {
    format!("### code interpreter\noutput:\n```\n{logs}\n```")
}

/// Relays every event of `stream` and returns the turn summary.
///
/// The first upstream error aborts the turn and is returned as-is.
pub async fn relay_stream<V, S>(
    mut ctx: TurnContext<'_, V>,
    mut stream: S,
) -> ProviderResult<TurnSummary>
where
    V: ChatView + ?Sized,
    S: Stream<Item = ProviderResult<AssistantEvent>> + Unpin,
{
    while let Some(event) = stream.next().await {
        ctx.handle(event?);
    }
    Ok(ctx.finish())
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::core::annotations::CitationFormatter;
    use crate::core::events::{FilePathRef, ImageFile};
    use crate::core::view::testing::MemoryView;
    use crate::providers::{ProviderError, ProviderErrorKind};

    fn text_delta(value: &str) -> AssistantEvent {
        AssistantEvent::TextDelta {
            delta: TextDelta::new(value),
            snapshot: Text::new(value),
        }
    }

    fn code_delta(input: &str) -> AssistantEvent {
        AssistantEvent::ToolCallDelta {
            delta: ToolCallDelta::code_input(0, input),
            snapshot: ToolCall::code_interpreter("call_1", input, vec![]),
        }
    }

    fn logs(text: &str) -> CodeOutput {
        CodeOutput::Logs {
            logs: text.to_string(),
        }
    }

    fn run(events: Vec<AssistantEvent>) -> (MemoryView, Transcript, TurnSummary) {
        let mut view = MemoryView::default();
        let mut transcript = Transcript::new();
        let formatter = CitationFormatter::new();
        let mut ctx = TurnContext::new(&mut view, &mut transcript, &formatter);
        for event in events {
            ctx.handle(event);
        }
        let summary = ctx.finish();
        (view, transcript, summary)
    }

    #[test]
    fn text_stream_appends_one_entry() {
        let (view, transcript, _) = run(vec![
            AssistantEvent::TextCreated(Text::default()),
            text_delta("Hello"),
            text_delta("Hello world"),
            AssistantEvent::TextDone(Text::new("Hello world.")),
        ]);

        assert_eq!(transcript.len(), 1);
        let entry = transcript.last().unwrap();
        assert_eq!(entry.speaker, Speaker::Assistant);
        assert_eq!(entry.message, "Hello world.");
        assert_eq!(view.contents(), vec!["Hello world."]);
    }

    #[test]
    fn text_delta_rerenders_full_snapshot() {
        let (view, _, _) = run(vec![
            AssistantEvent::TextCreated(Text::default()),
            text_delta("Hel"),
            text_delta("Hello"),
        ]);

        let rendered: Vec<&str> = view.renders.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(rendered, vec!["Hel", "Hello"]);
        assert_eq!(view.contents(), vec!["Hello"]);
    }

    #[test]
    fn text_delta_masks_links() {
        let (view, _, _) = run(vec![
            AssistantEvent::TextCreated(Text::default()),
            text_delta("see [report](http://x/y.pdf) here"),
        ]);

        assert_eq!(view.contents(), vec!["see Download Link here"]);
    }

    #[test]
    fn empty_snapshot_does_not_render() {
        let (view, _, _) = run(vec![
            AssistantEvent::TextCreated(Text::default()),
            text_delta(""),
        ]);

        assert!(view.renders.is_empty());
    }

    #[test]
    fn text_delta_before_created_is_dropped() {
        let (view, transcript, summary) = run(vec![text_delta("orphan")]);

        assert!(view.messages.is_empty());
        assert!(transcript.is_empty());
        assert_eq!(summary.dropped_deltas, 1);
    }

    #[test]
    fn each_text_done_appends_exactly_once() {
        let (view, transcript, summary) = run(vec![
            AssistantEvent::TextCreated(Text::default()),
            AssistantEvent::TextDone(Text::new("same")),
            AssistantEvent::TextDone(Text::new("same")),
        ]);

        assert_eq!(transcript.len(), 2);
        assert_eq!(summary.entries_appended, 2);
        // The replay has no open placeholder and becomes its own message.
        assert_eq!(view.contents(), vec!["same", "same"]);
    }

    #[test]
    fn tool_call_delta_before_created_recovers() {
        let call = ToolCall::code_interpreter("call_1", "print(1)", vec![]);
        let (view, transcript, _) = run(vec![
            code_delta("print(1)"),
            AssistantEvent::ToolCallDone(call),
        ]);

        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.contents(), vec![code_input_block("print(1)")]);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last().unwrap().message, code_input_block("print(1)"));
    }

    #[test]
    fn tool_call_input_accumulates_across_deltas() {
        let (view, _, _) = run(vec![
            AssistantEvent::ToolCallCreated(ToolCall::code_interpreter("call_1", "", vec![])),
            code_delta("x = "),
            code_delta("41 + 1"),
        ]);

        assert_eq!(view.contents(), vec![code_input_block("x = 41 + 1")]);
    }

    #[test]
    fn tool_call_done_adds_one_entry_per_log_output() {
        let call = ToolCall::code_interpreter(
            "call_1",
            "print(1); print(2)",
            vec![logs("1"), logs("2")],
        );
        let (view, transcript, summary) = run(vec![
            AssistantEvent::ToolCallCreated(ToolCall::code_interpreter("call_1", "", vec![])),
            AssistantEvent::ToolCallDone(call),
        ]);

        let messages: Vec<&str> = transcript
            .entries()
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                code_input_block("print(1); print(2)").as_str(),
                code_output_block("1").as_str(),
                code_output_block("2").as_str(),
            ]
        );
        assert_eq!(view.messages.len(), 3);
        assert_eq!(summary.entries_appended, 3);
    }

    #[test]
    fn log_outputs_in_deltas_are_not_rendered() {
        let mut delta = ToolCallDelta::code_input(0, "");
        if let Some(ci) = delta.code_interpreter.as_mut() {
            ci.outputs.push(logs("partial"));
        }
        let (view, transcript, _) = run(vec![
            AssistantEvent::ToolCallCreated(ToolCall::code_interpreter("call_1", "", vec![])),
            AssistantEvent::ToolCallDelta {
                delta,
                snapshot: ToolCall::code_interpreter("call_1", "", vec![logs("partial")]),
            },
        ]);

        assert!(view.renders.is_empty());
        assert!(transcript.is_empty());
    }

    #[test]
    fn non_code_tool_calls_are_ignored() {
        let (view, transcript, _) = run(vec![
            AssistantEvent::ToolCallCreated(ToolCall::FileSearch {
                id: "fs".to_string(),
            }),
            AssistantEvent::ToolCallDone(ToolCall::FileSearch {
                id: "fs".to_string(),
            }),
        ]);

        assert!(view.messages.is_empty());
        assert!(transcript.is_empty());
    }

    #[test]
    fn other_events_are_ignored() {
        let (view, transcript, _) = run(vec![AssistantEvent::Other {
            kind: "thread.run.created".to_string(),
        }]);

        assert!(view.messages.is_empty());
        assert!(transcript.is_empty());
    }

    #[test]
    fn generated_files_are_collected_once() {
        let text = Text::with_annotations(
            "[chart](sandbox:/mnt/data/chart.png)",
            vec![Annotation::FilePath {
                text: "sandbox:/mnt/data/chart.png".to_string(),
                file_path: FilePathRef {
                    file_id: "file-chart".to_string(),
                },
            }],
        );
        let call = ToolCall::code_interpreter(
            "call_1",
            "plot()",
            vec![CodeOutput::Image {
                image: ImageFile {
                    file_id: "file-chart".to_string(),
                },
            }],
        );

        let (_, _, summary) = run(vec![
            AssistantEvent::ToolCallDone(call),
            AssistantEvent::TextCreated(Text::default()),
            AssistantEvent::TextDone(text),
        ]);

        assert_eq!(
            summary.generated_files,
            vec![GeneratedFile {
                file_id: "file-chart".to_string(),
                file_name: "file-chart.png".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn relay_stream_propagates_upstream_errors() {
        let mut view = MemoryView::default();
        let mut transcript = Transcript::new();
        let formatter = CitationFormatter::new();
        let ctx = TurnContext::new(&mut view, &mut transcript, &formatter);

        let events = stream::iter(vec![
            Ok(AssistantEvent::TextCreated(Text::default())),
            Err(ProviderError::new(ProviderErrorKind::Parse, "bad frame")),
            Ok(AssistantEvent::TextDone(Text::new("never"))),
        ]);

        let err = relay_stream(ctx, events).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Parse);
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn relay_stream_returns_summary() {
        let mut view = MemoryView::default();
        let mut transcript = Transcript::new();
        let formatter = CitationFormatter::new();
        let ctx = TurnContext::new(&mut view, &mut transcript, &formatter);

        let events = stream::iter(vec![
            Ok(AssistantEvent::TextCreated(Text::default())),
            Ok(text_delta("Hi")),
            Ok(AssistantEvent::TextDone(Text::new("Hi"))),
        ]);

        let summary = relay_stream(ctx, events).await.unwrap();
        assert_eq!(summary.entries_appended, 1);
        assert_eq!(transcript.len(), 1);
    }
}
