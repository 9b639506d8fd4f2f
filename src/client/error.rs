//! Transport errors of the remote tool client.

use thiserror::Error;

/// Connection-class failures talking to a tool server.
///
/// Tool-level failures are not errors here: they arrive as a
/// [`ToolCallResult::Failure`](crate::protocol::ToolCallResult) body.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached (refused, DNS, reset).
    #[error("Tool server '{server}' unreachable: {message}")]
    Unreachable {
        /// Server identifier.
        server: String,
        /// Underlying transport message.
        message: String,
    },

    /// The request did not complete in time.
    #[error("Tool server '{server}' timed out")]
    Timeout {
        /// Server identifier.
        server: String,
    },

    /// The server answered with a non-2xx status.
    #[error("Tool server '{server}' returned HTTP {status}")]
    Status {
        /// Server identifier.
        server: String,
        /// HTTP status code.
        status: u16,
    },

    /// The reply body could not be decoded.
    #[error("Tool server '{server}' sent an invalid response: {message}")]
    InvalidResponse {
        /// Server identifier.
        server: String,
        /// Decoder message.
        message: String,
    },
}

impl ClientError {
    /// Classify a reqwest error for the given server.
    pub(crate) fn from_reqwest(server: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout {
                server: server.to_string(),
            }
        } else if let Some(status) = error.status() {
            ClientError::Status {
                server: server.to_string(),
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            ClientError::InvalidResponse {
                server: server.to_string(),
                message: error.to_string(),
            }
        } else {
            ClientError::Unreachable {
                server: server.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Identifier of the server the error concerns.
    pub fn server(&self) -> &str {
        match self {
            ClientError::Unreachable { server, .. }
            | ClientError::Timeout { server }
            | ClientError::Status { server, .. }
            | ClientError::InvalidResponse { server, .. } => server,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
