//! Typed tool identifiers and the tool-set seam.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::protocol::{Arguments, ToolContent, ToolDescriptor, ToolResult};

/// A closed set of tool identifiers for one tool server.
///
/// Each tool server declares its tools as a fieldless enum implementing
/// this trait. Dispatch matches on the enum, so a handler that is not
/// wired up is a compile error rather than a runtime lookup miss; a
/// string that names no variant parses to `None`.
pub trait ToolKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every tool of the set, in advertisement order.
    const ALL: &'static [Self];

    /// Wire name of the tool.
    fn name(self) -> &'static str;

    /// Descriptor advertised for the tool.
    fn descriptor(self) -> ToolDescriptor;

    /// Resolve a wire name to a tool identifier.
    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tool| tool.name() == name)
    }
}

/// Handlers for one tool server.
///
/// Implementations wrap a third-party API. Handlers return `Err` for any
/// failure; the tool server converts it into a failure result.
#[async_trait]
pub trait ToolSet: Send + Sync + 'static {
    /// Tool identifiers served by this set.
    type Tool: ToolKind;

    /// Server identifier reported by the health endpoint.
    fn server_name(&self) -> &str;

    /// Run one tool. Required parameters are already checked.
    async fn call(&self, tool: Self::Tool, arguments: &Arguments) -> ToolResult<ToolContent>;

    /// Server-specific fields for the health endpoint.
    ///
    /// Must never contain credentials.
    fn diagnostics(&self) -> Map<String, Value> {
        Map::new()
    }
}
