//! Static tool registry for a single tool server.

use std::collections::HashMap;

use crate::protocol::ToolDescriptor;

use super::{RegisteredTool, RegistryError, RegistryResult, ToolKind};

/// Read-only table of the tools one server exposes.
///
/// The registry is built once at startup from a [`ToolKind`] and never
/// changes afterwards, so it needs no locking and can be shared behind an
/// `Arc` by every request handler.
///
/// # Example
///
/// ```rust,ignore
/// use cerebro::registry::ToolRegistry;
/// use cerebro::tools::chart::ChartTool;
///
/// let registry = ToolRegistry::<ChartTool>::new()?;
/// assert!(registry.contains("generate_chart"));
/// let descriptors = registry.descriptors();
/// ```
#[derive(Debug, Clone)]
pub struct ToolRegistry<T: ToolKind> {
    /// Tools in advertisement order.
    tools: Vec<RegisteredTool<T>>,

    /// Index from tool name to position in tools vector.
    name_index: HashMap<String, usize>,
}

impl<T: ToolKind> ToolRegistry<T> {
    /// Build the registry from every variant of `T`.
    pub fn new() -> RegistryResult<Self> {
        Self::from_table(T::ALL.iter().map(|&tool| (tool, tool.descriptor())))
    }

    /// Build the registry from an explicit table.
    ///
    /// Fails on invalid names, duplicate names, or a descriptor whose name
    /// differs from the identifier it is attached to.
    pub fn from_table<I>(table: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = (T, ToolDescriptor)>,
    {
        let mut tools = Vec::new();
        let mut name_index = HashMap::new();

        for (tool, descriptor) in table {
            Self::validate_name(&descriptor.name)?;

            if descriptor.name != tool.name() {
                return Err(RegistryError::NameMismatch {
                    tool: tool.name().to_string(),
                    descriptor: descriptor.name,
                });
            }

            if name_index.contains_key(&descriptor.name) {
                return Err(RegistryError::Conflict(descriptor.name));
            }

            name_index.insert(descriptor.name.clone(), tools.len());
            tools.push(RegisteredTool::new(tool, descriptor));
        }

        Ok(Self { tools, name_index })
    }

    /// Validate a tool name.
    ///
    /// Tool names must be non-empty and contain only alphanumeric
    /// characters, underscores, or hyphens.
    pub(crate) fn validate_name(name: &str) -> RegistryResult<()> {
        if name.is_empty() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        Ok(())
    }

    /// Find a tool by name.
    ///
    /// Returns `None` if the tool is not found.
    pub fn find(&self, name: &str) -> Option<&RegisteredTool<T>> {
        self.name_index.get(name).map(|&idx| &self.tools[idx])
    }

    /// Get a tool by name, returning an error if not found.
    pub fn get(&self, name: &str) -> RegistryResult<&RegisteredTool<T>> {
        self.find(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    /// All registered tools in advertisement order.
    pub fn list(&self) -> &[RegisteredTool<T>] {
        &self.tools
    }

    /// Descriptors of all tools, as served by `GET /tools`.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|rt| rt.descriptor().clone()).collect()
    }

    /// Get the total number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all tool names in advertisement order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|rt| rt.name()).collect()
    }

    /// Check if a tool with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }
}
