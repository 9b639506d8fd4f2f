//! Error types for the tool registry.

use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// Only [`RegistryError::ToolNotFound`] can happen once a registry is
/// built; the other variants reject a malformed static table at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested tool is not registered.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// Two table entries share the same name.
    #[error("Tool '{0}' registered twice")]
    Conflict(String),

    /// The tool name is invalid (empty or contains invalid characters).
    #[error("Invalid tool name '{0}': must be non-empty and contain only alphanumeric characters, underscores, or hyphens")]
    InvalidName(String),

    /// A descriptor does not carry the name of the tool it describes.
    #[error("Descriptor '{descriptor}' does not match tool '{tool}'")]
    NameMismatch {
        /// Name of the tool identifier.
        tool: String,
        /// Name found in the descriptor.
        descriptor: String,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::ToolNotFound("missing".to_string());
        assert_eq!(err.to_string(), "Tool 'missing' not found");

        let err = RegistryError::InvalidName("bad name!".to_string());
        assert!(err.to_string().contains("bad name!"));

        let err = RegistryError::NameMismatch {
            tool: "a".to_string(),
            descriptor: "b".to_string(),
        };
        assert!(err.to_string().contains("'b'"));
    }
}
