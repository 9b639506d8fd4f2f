//! Tool invocation protocol.
//!
//! Shared types spoken between tool servers and their clients:
//!
//! - `GET /tools` returns a [`ToolList`] of [`ToolDescriptor`]s
//! - `POST /call` takes a [`ToolCallRequest`] and returns a [`ToolCallResult`]
//!
//! Tool-level failures travel in the body of a `200 OK` reply; only
//! transport problems surface as HTTP errors.

mod call;
mod descriptor;
mod error;

pub use call::{ToolCallRequest, ToolCallResult, ToolContent, ToolList};
pub use descriptor::{ParameterSpec, ParameterType, ToolDescriptor};
pub use error::{ToolError, ToolResult};

/// Arguments of a tool call, keyed by parameter name.
pub type Arguments = serde_json::Map<String, serde_json::Value>;
