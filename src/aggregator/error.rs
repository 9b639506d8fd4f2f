//! Error types for the tool aggregator.

use thiserror::Error;

use crate::client::ClientError;

/// Errors raised while assembling the aggregated namespace.
///
/// `ToolAggregator::invoke` never returns these; it folds them into a
/// failure result instead.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Server identifier is empty or contains characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid server identifier '{0}': must be non-empty and contain only alphanumeric characters, underscores, or hyphens")]
    InvalidIdentifier(String),

    /// A server with this identifier is already registered.
    #[error("Server '{0}' is already registered")]
    DuplicateServer(String),

    /// No server with this identifier is registered.
    #[error("Unknown tool server '{0}'")]
    UnknownServer(String),

    /// A qualified name lacks the `server.tool` shape.
    #[error("Malformed tool name '{0}': expected 'server.tool'")]
    MalformedName(String),

    /// The client for a server could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for aggregator operations.
pub type AggregatorResult<T> = Result<T, AggregatorError>;
