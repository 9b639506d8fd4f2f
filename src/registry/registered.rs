//! Registered tool entry pairing an identifier with its descriptor.

use crate::protocol::ToolDescriptor;

use super::ToolKind;

/// A tool identifier together with its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTool<T: ToolKind> {
    /// Typed identifier used for dispatch.
    tool: T,

    /// Descriptor advertised over `GET /tools`.
    descriptor: ToolDescriptor,
}

impl<T: ToolKind> RegisteredTool<T> {
    /// Create a new registered tool.
    pub fn new(tool: T, descriptor: ToolDescriptor) -> Self {
        Self { tool, descriptor }
    }

    /// Get the typed identifier.
    pub fn tool(&self) -> T {
        self.tool
    }

    /// Get the descriptor.
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Get the tool name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Get the tool description.
    pub fn description(&self) -> &str {
        &self.descriptor.description
    }
}
