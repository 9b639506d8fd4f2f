//! Typed access to tool-call arguments.

use serde_json::Value;

use crate::protocol::{Arguments, ToolError, ToolResult};

/// Optional string argument; empty strings count as absent.
pub(crate) fn opt_str<'a>(arguments: &'a Arguments, name: &str) -> Option<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Required string argument.
pub(crate) fn req_str<'a>(arguments: &'a Arguments, tool: &str, name: &str) -> ToolResult<&'a str> {
    match arguments.get(name) {
        None | Some(Value::Null) => Err(ToolError::missing_parameter(tool, name)),
        Some(value) => value
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ToolError::invalid_argument(tool, format!("'{}' must be a non-empty string", name))),
    }
}

/// Optional non-negative integer argument.
///
/// Accepts JSON numbers and numeric strings, which some models send.
pub(crate) fn opt_u64(arguments: &Arguments, tool: &str, name: &str) -> ToolResult<Option<u64>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| ToolError::invalid_argument(tool, format!("'{}' must be a non-negative integer", name))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ToolError::invalid_argument(tool, format!("'{}' must be a non-negative integer", name))),
        Some(_) => Err(ToolError::invalid_argument(
            tool,
            format!("'{}' must be a non-negative integer", name),
        )),
    }
}

/// Required array argument.
pub(crate) fn req_array<'a>(arguments: &'a Arguments, tool: &str, name: &str) -> ToolResult<&'a Vec<Value>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Err(ToolError::missing_parameter(tool, name)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ToolError::invalid_argument(tool, format!("'{}' must be an array", name))),
    }
}
