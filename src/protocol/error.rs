//! Errors raised while executing a single tool call.

use thiserror::Error;

use super::ToolCallResult;

/// Errors a tool handler can produce.
///
/// None of these ever cross the tool-call boundary as an error: the tool
/// server turns each of them into a [`ToolCallResult::Failure`].
///
/// # Example
///
/// ```
/// use cerebro::protocol::ToolError;
///
/// let error = ToolError::missing_parameter("generate_chart", "labels");
/// assert!(error.to_string().contains("labels"));
/// ```
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required parameter was not supplied.
    #[error("missing required parameter '{parameter}' for tool '{tool}'")]
    MissingParameter {
        /// Tool that was called.
        tool: String,
        /// Name of the missing parameter.
        parameter: String,
    },

    /// A parameter was supplied with an unusable value.
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArgument {
        /// Tool that was called.
        tool: String,
        /// Description of the validation failure.
        message: String,
    },

    /// The wrapped third-party platform failed or answered with an unexpected shape.
    #[error("{service} error: {message}")]
    Upstream {
        /// Name of the third-party platform.
        service: String,
        /// Human-readable summary of the failure.
        message: String,
    },

    /// The tool is not configured on this server (missing credentials).
    #[error("{service} is not configured: {message}")]
    NotConfigured {
        /// Name of the third-party platform.
        service: String,
        /// What is missing.
        message: String,
    },
}

impl ToolError {
    /// Create a MissingParameter error.
    pub fn missing_parameter(tool: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            tool: tool.into(),
            parameter: parameter.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an Upstream error.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a NotConfigured error.
    pub fn not_configured(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotConfigured {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Check whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ToolError::MissingParameter { .. } | ToolError::InvalidArgument { .. }
        )
    }
}

impl From<ToolError> for ToolCallResult {
    fn from(error: ToolError) -> Self {
        ToolCallResult::failure(error.to_string())
    }
}

/// Result type for tool handlers.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::invalid_argument("generate_chart", "labels and valores differ");
        assert!(err.to_string().contains("generate_chart"));
        assert!(err.to_string().contains("labels and valores differ"));

        let err = ToolError::upstream("Dropi", "token expired");
        assert_eq!(err.to_string(), "Dropi error: token expired");
    }

    #[test]
    fn test_into_failure() {
        let result: ToolCallResult = ToolError::missing_parameter("get_order", "order_id").into();
        assert_eq!(
            result.error_message(),
            Some("missing required parameter 'order_id' for tool 'get_order'")
        );
    }

    #[test]
    fn test_is_validation() {
        assert!(ToolError::missing_parameter("t", "p").is_validation());
        assert!(ToolError::invalid_argument("t", "m").is_validation());
        assert!(!ToolError::upstream("Meta", "m").is_validation());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ToolError>();
    }
}
