//! Shared HTTP plumbing for third-party platforms.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::protocol::{ToolError, ToolResult};

/// Longest upstream body excerpt carried into an error message.
const BODY_EXCERPT: usize = 200;

/// HTTP client bound to one third-party platform.
#[derive(Debug, Clone)]
pub(crate) struct Upstream {
    service: &'static str,
    http: reqwest::Client,
}

impl Upstream {
    pub(crate) fn new(service: &'static str, timeout: Duration) -> ToolResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::upstream(service, format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { service, http })
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request and decode a JSON body.
    ///
    /// Non-2xx statuses, timeouts and `{"error": ...}` bodies all become
    /// [`ToolError::Upstream`] with a readable summary.
    pub(crate) async fn send(&self, request: RequestBuilder) -> ToolResult<Value> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(service = self.service, status = status.as_u16(), bytes = text.len(), "Upstream replied");

        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let detail = body.as_ref().and_then(error_message);
            return Err(ToolError::upstream(
                self.service,
                describe_status(status, detail.as_deref(), &text),
            ));
        }

        let body = body.ok_or_else(|| {
            ToolError::upstream(
                self.service,
                format!("unexpected response: {}", excerpt(&text)),
            )
        })?;

        if let Some(message) = error_message(&body) {
            return Err(ToolError::upstream(self.service, message));
        }

        Ok(body)
    }

    fn transport_error(&self, error: reqwest::Error) -> ToolError {
        if error.is_timeout() {
            ToolError::upstream(self.service, "request timed out")
        } else {
            ToolError::upstream(self.service, format!("connection failed: {}", error))
        }
    }
}

/// Human-readable summary of a failed status.
pub(crate) fn describe_status(status: StatusCode, detail: Option<&str>, body: &str) -> String {
    let (summary, known) = match status {
        StatusCode::UNAUTHORIZED => ("invalid or expired credentials (401)".to_string(), true),
        StatusCode::FORBIDDEN => ("access denied, check token permissions (403)".to_string(), true),
        StatusCode::NOT_FOUND => ("resource not found (404)".to_string(), true),
        StatusCode::TOO_MANY_REQUESTS => ("rate limited (429)".to_string(), true),
        other => (format!("HTTP {}", other.as_u16()), false),
    };

    match detail {
        Some(detail) => format!("{}: {}", summary, detail),
        None if known || body.trim().is_empty() => summary,
        None => format!("{}: {}", summary, excerpt(body)),
    }
}

/// Extract an error message from the common error body shapes.
///
/// Handles `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"errors": ..}`.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        Some(Value::Object(error)) => Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ),
        Some(Value::String(message)) => Some(message.clone()),
        _ => match body.get("errors") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(errors @ (Value::Object(_) | Value::Array(_))) => Some(errors.to_string()),
            _ => None,
        },
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT).collect()
}
