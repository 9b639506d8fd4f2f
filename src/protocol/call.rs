//! Tool call requests, results and their wire envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{Arguments, ToolDescriptor};

/// A request to invoke one tool on a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCallRequest {
    /// Create a new call request.
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Content produced by a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    /// Plain text, usually a pre-formatted report.
    Text(String),
    /// Structured JSON data.
    Structured(Value),
}

impl ToolContent {
    /// Render the content as text for LLM consumption.
    pub fn to_text(&self) -> String {
        match self {
            ToolContent::Text(text) => text.clone(),
            ToolContent::Structured(value) => value.to_string(),
        }
    }

    /// Get the text if this is text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolContent::Text(text) => Some(text),
            ToolContent::Structured(_) => None,
        }
    }
}

impl From<String> for ToolContent {
    fn from(text: String) -> Self {
        ToolContent::Text(text)
    }
}

impl From<&str> for ToolContent {
    fn from(text: &str) -> Self {
        ToolContent::Text(text.to_string())
    }
}

impl From<Value> for ToolContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ToolContent::Text(text),
            other => ToolContent::Structured(other),
        }
    }
}

/// Outcome of a tool call.
///
/// On the wire this is `{"success": true, "content": ...}` or
/// `{"success": false, "error": "..."}`. The legacy reply
/// `{"result": "..."}` decodes as a success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CallEnvelope", try_from = "CallEnvelope")]
pub enum ToolCallResult {
    /// The tool ran and produced content.
    Success {
        /// Content produced by the tool.
        content: ToolContent,
    },
    /// The tool could not run or failed with a business reason.
    Failure {
        /// Human-readable failure description.
        message: String,
    },
}

impl ToolCallResult {
    /// Create a success result.
    pub fn success(content: impl Into<ToolContent>) -> Self {
        ToolCallResult::Success {
            content: content.into(),
        }
    }

    /// Create a failure result.
    pub fn failure(message: impl Into<String>) -> Self {
        ToolCallResult::Failure {
            message: message.into(),
        }
    }

    /// Check whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ToolCallResult::Success { .. })
    }

    /// Get the content of a successful call.
    pub fn content(&self) -> Option<&ToolContent> {
        match self {
            ToolCallResult::Success { content } => Some(content),
            ToolCallResult::Failure { .. } => None,
        }
    }

    /// Get the message of a failed call.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolCallResult::Success { .. } => None,
            ToolCallResult::Failure { message } => Some(message),
        }
    }

    /// Render the result as text for LLM consumption.
    pub fn to_text(&self) -> String {
        match self {
            ToolCallResult::Success { content } => content.to_text(),
            ToolCallResult::Failure { message } => format!("Error: {}", message),
        }
    }
}

impl fmt::Display for ToolCallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Wire form of [`ToolCallResult`].
#[derive(Debug, Serialize, Deserialize)]
struct CallEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing)]
    result: Option<Value>,
}

impl From<ToolCallResult> for CallEnvelope {
    fn from(result: ToolCallResult) -> Self {
        match result {
            ToolCallResult::Success { content } => CallEnvelope {
                success: Some(true),
                content: Some(match content {
                    ToolContent::Text(text) => Value::String(text),
                    ToolContent::Structured(value) => value,
                }),
                error: None,
                result: None,
            },
            ToolCallResult::Failure { message } => CallEnvelope {
                success: Some(false),
                content: None,
                error: Some(message),
                result: None,
            },
        }
    }
}

impl TryFrom<CallEnvelope> for ToolCallResult {
    type Error = String;

    fn try_from(envelope: CallEnvelope) -> Result<Self, Self::Error> {
        match envelope.success {
            Some(true) => Ok(ToolCallResult::success(
                envelope.content.unwrap_or(Value::Null),
            )),
            Some(false) => Ok(ToolCallResult::failure(
                envelope
                    .error
                    .unwrap_or_else(|| "tool call failed without a message".to_string()),
            )),
            None => envelope
                .result
                .map(ToolCallResult::success)
                .ok_or_else(|| "reply has neither 'success' nor 'result'".to_string()),
        }
    }
}

/// Reply body of `GET /tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolList {
    /// Descriptors in registry order.
    pub tools: Vec<ToolDescriptor>,
}
