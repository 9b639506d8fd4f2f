//! Language model abstraction and the Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Messages API endpoint.
pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Errors talking to the language model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request never completed.
    #[error("LLM request failed: {0}")]
    Transport(String),

    /// The API answered with an error status.
    #[error("LLM API returned {status}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error message from the body.
        message: String,
    },

    /// The reply could not be decoded.
    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}

/// Result type for language model calls.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user, or tool results fed back to the model.
    User,
    /// The model.
    Assistant,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool call requested by the model.
    ToolUse {
        /// Call id, echoed by the matching result.
        id: String,
        /// Function name.
        name: String,
        /// Call arguments.
        input: Value,
    },
    /// The outcome of a tool call.
    ToolResult {
        /// Id of the `ToolUse` block this answers.
        tool_use_id: String,
        /// Result text.
        content: String,
        /// Whether the call failed.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Content blocks in order.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user message with one text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// An assistant message with one text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the message carries tool results.
    pub fn has_tool_results(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }

    /// Tool calls requested in this message, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    /// Function name (`[a-zA-Z0-9_-]`).
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the arguments.
    pub input_schema: Value,
}

/// One model call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    /// System prompt.
    pub system: &'a str,
    /// Conversation so far.
    pub messages: &'a [Message],
    /// Tools the model may call.
    pub tools: &'a [ToolSpec],
}

/// Why the model stopped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Finished its answer.
    EndTurn,
    /// Wants tool results.
    ToolUse,
    /// Hit the token limit.
    MaxTokens,
    /// Any other reason.
    #[serde(other)]
    Other,
}

/// A model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Reply content.
    pub content: Vec<ContentBlock>,
    /// Stop reason, when reported.
    pub stop_reason: Option<StopReason>,
}

impl Completion {
    /// Whether the reply requests tool calls.
    pub fn wants_tools(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// The reply as an assistant message.
    pub fn into_message(self) -> Message {
        Message {
            role: Role::Assistant,
            content: self.content,
        }
    }
}

/// A chat model with tool calling.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: CompletionRequest<'_>) -> LlmResult<Completion>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
}

/// Anthropic Messages API client.
pub struct AnthropicModel {
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    http: reqwest::Client,
}

impl AnthropicModel {
    /// Create a client for `model`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            endpoint: ANTHROPIC_MESSAGES_URL.to_string(),
            http,
        })
    }

    /// Set the reply token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.system,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        body
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> LlmResult<Completion> {
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(Completion {
            content: reply.content,
            stop_reason: reply.stop_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
