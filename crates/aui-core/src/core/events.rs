//! Assistant event types for one streamed response turn.
//!
//! Payload types mirror the Assistants API wire shapes so the SSE parser can
//! deserialize them directly.

use serde::{Deserialize, Serialize};

/// Events delivered by the assistant service during one turn.
///
/// Text and tool-call events form two independent sub-streams; each
/// `*Created` opens one, deltas update it and `*Done` finalizes it.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantEvent {
    /// A new text content part started.
    TextCreated(Text),

    /// Incremental text with the accumulated snapshot so far.
    TextDelta { delta: TextDelta, snapshot: Text },

    /// Final text including annotations.
    TextDone(Text),

    /// A new tool call started.
    ToolCallCreated(ToolCall),

    /// Incremental tool-call input/output with the accumulated snapshot.
    ToolCallDelta {
        delta: ToolCallDelta,
        snapshot: ToolCall,
    },

    /// Completed tool call including outputs.
    ToolCallDone(ToolCall),

    /// Any event kind the relay does not interpret.
    Other { kind: String },
}

impl AssistantEvent {
    /// Short event name for logs.
    pub fn kind(&self) -> &str {
        match self {
            AssistantEvent::TextCreated(_) => "text_created",
            AssistantEvent::TextDelta { .. } => "text_delta",
            AssistantEvent::TextDone(_) => "text_done",
            AssistantEvent::ToolCallCreated(_) => "tool_call_created",
            AssistantEvent::ToolCallDelta { .. } => "tool_call_delta",
            AssistantEvent::ToolCallDone(_) => "tool_call_done",
            AssistantEvent::Other { kind } => kind.as_str(),
        }
    }
}

/// Text content with its annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(value: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            value: value.into(),
            annotations,
        }
    }

    /// Merges a delta into this snapshot.
    pub fn apply_delta(&mut self, delta: &TextDelta) {
        if let Some(value) = &delta.value {
            self.value.push_str(value);
        }
        self.annotations.extend(delta.annotations.iter().cloned());
    }
}

/// Incremental text fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDelta {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl TextDelta {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            annotations: Vec::new(),
        }
    }
}

/// Citation or generated-file marker embedded in assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    /// Quote from an uploaded file.
    FileCitation {
        /// Marker as it appears in the text (e.g. `【4:0†source】`).
        #[serde(default)]
        text: String,
        file_citation: FileCitation,
    },
    /// File produced by the code interpreter.
    FilePath {
        /// Marker as it appears in the text (e.g. `sandbox:/mnt/data/out.csv`).
        #[serde(default)]
        text: String,
        file_path: FilePathRef,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCitation {
    pub file_id: String,
    #[serde(default)]
    pub quote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePathRef {
    pub file_id: String,
}

/// A completed (or snapshot of an in-progress) tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCall {
    CodeInterpreter {
        #[serde(default)]
        id: String,
        #[serde(default)]
        code_interpreter: CodeInterpreter,
    },
    FileSearch {
        #[serde(default)]
        id: String,
    },
    Function {
        #[serde(default)]
        id: String,
        #[serde(default)]
        function: FunctionCall,
    },
    #[serde(other)]
    Unknown,
}

impl ToolCall {
    /// Convenience constructor for a code interpreter call.
    pub fn code_interpreter(
        id: impl Into<String>,
        input: impl Into<String>,
        outputs: Vec<CodeOutput>,
    ) -> Self {
        ToolCall::CodeInterpreter {
            id: id.into(),
            code_interpreter: CodeInterpreter {
                input: input.into(),
                outputs,
            },
        }
    }

    /// Starts a snapshot from the first delta seen for a tool call.
    pub fn from_delta(delta: &ToolCallDelta) -> Self {
        let id = delta.id.clone().unwrap_or_default();
        let mut call = match delta.kind {
            ToolCallKind::CodeInterpreter => ToolCall::CodeInterpreter {
                id,
                code_interpreter: CodeInterpreter::default(),
            },
            ToolCallKind::FileSearch => ToolCall::FileSearch { id },
            ToolCallKind::Function => ToolCall::Function {
                id,
                function: FunctionCall::default(),
            },
            ToolCallKind::Unknown => ToolCall::Unknown,
        };
        call.apply_delta(delta);
        call
    }

    /// Merges a delta into this snapshot.
    pub fn apply_delta(&mut self, delta: &ToolCallDelta) {
        match self {
            ToolCall::CodeInterpreter {
                code_interpreter, ..
            } => {
                if let Some(ci) = &delta.code_interpreter {
                    if let Some(input) = &ci.input {
                        code_interpreter.input.push_str(input);
                    }
                    code_interpreter.outputs.extend(ci.outputs.iter().cloned());
                }
            }
            ToolCall::Function { function, .. } => {
                if let Some(f) = &delta.function {
                    if let Some(name) = &f.name {
                        function.name.push_str(name);
                    }
                    if let Some(arguments) = &f.arguments {
                        function.arguments.push_str(arguments);
                    }
                }
            }
            ToolCall::FileSearch { .. } | ToolCall::Unknown => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInterpreter {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub outputs: Vec<CodeOutput>,
}

/// Output item attached to a code interpreter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodeOutput {
    Logs {
        #[serde(default)]
        logs: String,
    },
    Image {
        image: ImageFile,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub file_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub output: Option<String>,
}

/// Tool call kind as sent in deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    CodeInterpreter,
    FileSearch,
    Function,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Incremental tool-call fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ToolCallKind,
    #[serde(default)]
    pub code_interpreter: Option<CodeInterpreterDelta>,
    #[serde(default)]
    pub function: Option<FunctionCallDelta>,
}

impl ToolCallDelta {
    /// Delta carrying a fragment of code interpreter input.
    pub fn code_input(index: usize, input: impl Into<String>) -> Self {
        Self {
            index,
            kind: ToolCallKind::CodeInterpreter,
            code_interpreter: Some(CodeInterpreterDelta {
                input: Some(input.into()),
                outputs: Vec::new(),
            }),
            ..Default::default()
        }
    }

    /// Code interpreter input carried by this delta, if any.
    pub fn code_input_fragment(&self) -> Option<&str> {
        self.code_interpreter
            .as_ref()
            .and_then(|ci| ci.input.as_deref())
            .filter(|input| !input.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInterpreterDelta {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub outputs: Vec<CodeOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// File produced by the assistant during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub file_id: String,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tool_call_snapshot_accumulates_code_input() {
        let first: ToolCallDelta = serde_json::from_value(json!({
            "index": 0,
            "id": "call_1",
            "type": "code_interpreter",
            "code_interpreter": {"input": "", "outputs": []}
        }))
        .unwrap();
        let mut snapshot = ToolCall::from_delta(&first);

        snapshot.apply_delta(&ToolCallDelta::code_input(0, "print("));
        snapshot.apply_delta(&ToolCallDelta::code_input(0, "1)"));

        assert_eq!(snapshot, ToolCall::code_interpreter("call_1", "print(1)", vec![]));
    }

    #[test]
    fn code_output_logs_and_images_deserialize() {
        let outputs: Vec<CodeOutput> = serde_json::from_value(json!([
            {"type": "logs", "logs": "42\n"},
            {"type": "image", "image": {"file_id": "file-img"}}
        ]))
        .unwrap();

        assert_eq!(
            outputs,
            vec![
                CodeOutput::Logs {
                    logs: "42\n".to_string()
                },
                CodeOutput::Image {
                    image: ImageFile {
                        file_id: "file-img".to_string()
                    }
                },
            ]
        );
    }

    #[test]
    fn unknown_tool_and_annotation_types_are_tolerated() {
        let call: ToolCall = serde_json::from_value(json!({"type": "browser", "id": "x"})).unwrap();
        assert_eq!(call, ToolCall::Unknown);

        let ann: Annotation =
            serde_json::from_value(json!({"type": "url_citation", "text": "x"})).unwrap();
        assert_eq!(ann, Annotation::Unknown);
    }

    #[test]
    fn empty_code_fragment_is_not_reported() {
        let delta = ToolCallDelta::code_input(0, "");
        assert_eq!(delta.code_input_fragment(), None);
    }
}
