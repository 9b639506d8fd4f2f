//! Qualified tool names (`server.tool`).

use std::fmt;
use std::str::FromStr;

use super::AggregatorError;

/// A tool name made unique across servers by its server prefix.
///
/// # Example
///
/// ```
/// use cerebro::aggregator::QualifiedName;
///
/// let name: QualifiedName = "chart.generate_chart".parse().unwrap();
/// assert_eq!(name.server(), "chart");
/// assert_eq!(name.tool(), "generate_chart");
/// assert_eq!(name.function_name(), "chart_generate_chart");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    server: String,
    tool: String,
}

impl QualifiedName {
    /// Join a server identifier and a tool name.
    pub fn new(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
        }
    }

    /// Split at the first dot. Both halves must be non-empty.
    pub fn parse(name: &str) -> Result<Self, AggregatorError> {
        match name.split_once('.') {
            Some((server, tool)) if !server.is_empty() && !tool.is_empty() => {
                Ok(Self::new(server, tool))
            }
            _ => Err(AggregatorError::MalformedName(name.to_string())),
        }
    }

    /// Server identifier part.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Unqualified tool name part.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// LLM-safe rendering: `server_tool`.
    pub fn function_name(&self) -> String {
        format!("{}_{}", self.server, self.tool)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.server, self.tool)
    }
}

impl FromStr for QualifiedName {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check a server identifier: non-empty, `[A-Za-z0-9_-]` only.
pub(crate) fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
