//! Conversational analytics agent.
//!
//! The [`Agent`] answers one inbound message at a time: it loads the
//! sender's history from a [`ConversationStore`], lets a
//! [`LanguageModel`] call tools through a [`ToolBackend`] (normally the
//! [`ToolAggregator`](crate::aggregator::ToolAggregator)), and returns the
//! final text reply.
//!
//! Tools are offered to the model under function names `server_tool`,
//! mapped back to their qualified `server.tool` names on the way in.

#[allow(clippy::module_inception)]
pub mod agent;
pub mod llm;
pub mod prompt;
pub mod session;

pub use agent::{Agent, AgentConfig, ToolBackend};
pub use llm::{
    AnthropicModel, Completion, CompletionRequest, ContentBlock, LanguageModel, LlmError, LlmResult,
    Message, Role, StopReason, ToolSpec,
};
pub use session::{
    trim_history, ConversationStore, FileConversationStore, InMemoryConversationStore, StoreError,
    StoreResult,
};
