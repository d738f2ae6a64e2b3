//! Assistants API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::core::events::{Text, TextDelta, ToolCall, ToolCallDelta};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateMessageRequest<'a> {
    pub role: &'static str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

impl Attachment {
    /// Attaches a file for the code interpreter to read.
    pub fn code_interpreter(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            tools: vec![AttachmentTool {
                tool_type: "code_interpreter",
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
    pub stream: bool,
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
}

// ============================================================================
// Stream payloads
// ============================================================================

/// `thread.message.delta`
#[derive(Debug, Deserialize)]
pub struct MessageDeltaEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub delta: MessageDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<MessageContentDelta>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentDelta {
    Text {
        #[serde(default)]
        index: usize,
        #[serde(default)]
        text: TextDelta,
    },
    #[serde(other)]
    Other,
}

/// `thread.message.completed`
#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: Text },
    #[serde(other)]
    Other,
}

/// `thread.run.step.delta`
#[derive(Debug, Deserialize)]
pub struct RunStepDeltaEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub delta: RunStepDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunStepDelta {
    #[serde(default)]
    pub step_details: Option<StepDetailsDelta>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetailsDelta {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<ToolCallDelta>,
    },
    #[serde(other)]
    Other,
}

/// `thread.run.step.completed`
#[derive(Debug, Deserialize)]
pub struct RunStep {
    #[serde(default)]
    pub id: String,
    pub step_details: StepDetails,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(other)]
    Other,
}

/// `thread.run.failed` and friends.
#[derive(Debug, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorBody {
    /// Short error label: the code, else the type.
    pub fn label(&self) -> &str {
        self.code
            .as_deref()
            .or(self.error_type.as_deref())
            .unwrap_or("error")
    }
}

/// `error` event payload. Some deployments wrap the body in `error`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorEvent {
    Wrapped { error: ApiErrorBody },
    Bare(ApiErrorBody),
}

impl ErrorEvent {
    pub fn into_body(self) -> ApiErrorBody {
        match self {
            ErrorEvent::Wrapped { error } | ErrorEvent::Bare(error) => error,
        }
    }
}
