//! Transport-independent tool server.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::protocol::{ToolCallRequest, ToolCallResult, ToolDescriptor};
use crate::registry::{RegistryResult, ToolRegistry, ToolSet};

/// A tool set bound to its registry.
///
/// Cloning is cheap; every clone shares the same handlers and table.
pub struct ToolServer<S: ToolSet> {
    tool_set: Arc<S>,
    registry: Arc<ToolRegistry<S::Tool>>,
}

impl<S: ToolSet> Clone for ToolServer<S> {
    fn clone(&self) -> Self {
        Self {
            tool_set: Arc::clone(&self.tool_set),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: ToolSet> ToolServer<S> {
    /// Build a server for a tool set, registering every tool it declares.
    pub fn new(tool_set: S) -> RegistryResult<Self> {
        let registry = ToolRegistry::new()?;
        Ok(Self {
            tool_set: Arc::new(tool_set),
            registry: Arc::new(registry),
        })
    }

    /// Server identifier of the wrapped tool set.
    pub fn name(&self) -> &str {
        self.tool_set.server_name()
    }

    /// The registry backing this server.
    pub fn registry(&self) -> &ToolRegistry<S::Tool> {
        &self.registry
    }

    /// Descriptors of every tool, in table order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Execute one tool call.
    ///
    /// Never fails: unknown tools, missing parameters, handler errors and
    /// handler panics all come back as [`ToolCallResult::Failure`].
    pub async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        let registered = match self.registry.get(&request.name) {
            Ok(registered) => registered,
            Err(e) => {
                warn!(server = self.name(), tool = %request.name, "Unknown tool requested");
                return ToolCallResult::failure(e.to_string());
            }
        };

        if let Some(parameter) = registered.descriptor().missing_required(&request.arguments) {
            debug!(server = self.name(), tool = %request.name, parameter, "Missing required parameter");
            return ToolCallResult::failure(format!(
                "missing required parameter '{}' for tool '{}'",
                parameter, request.name
            ));
        }

        let tool = registered.tool();
        let handler = self.tool_set.call(tool, &request.arguments);

        match AssertUnwindSafe(handler).catch_unwind().await {
            Ok(Ok(content)) => {
                debug!(server = self.name(), tool = %request.name, "Tool call succeeded");
                ToolCallResult::success(content)
            }
            Ok(Err(e)) => {
                warn!(server = self.name(), tool = %request.name, error = %e, "Tool call failed");
                ToolCallResult::from(e)
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(server = self.name(), tool = %request.name, panic = %detail, "Tool handler panicked");
                ToolCallResult::failure(format!("internal error in tool '{}'", request.name))
            }
        }
    }

    /// Liveness document served on `GET /health`.
    pub fn health(&self) -> Value {
        let mut body = json!({
            "status": "ok",
            "server": self.name(),
            "version": env!("CARGO_PKG_VERSION"),
            "tools": self.registry.tool_names(),
        });

        if let Value::Object(fields) = &mut body {
            for (key, value) in self.tool_set.diagnostics() {
                fields.entry(key).or_insert(value);
            }
        }

        body
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        Arguments, ParameterSpec, ParameterType, ToolContent, ToolError, ToolResult,
    };
    use crate::registry::ToolKind;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestTool {
        Echo,
        Fail,
        Explode,
    }

    impl ToolKind for TestTool {
        const ALL: &'static [Self] = &[TestTool::Echo, TestTool::Fail, TestTool::Explode];

        fn name(self) -> &'static str {
            match self {
                TestTool::Echo => "echo",
                TestTool::Fail => "fail",
                TestTool::Explode => "explode",
            }
        }

        fn descriptor(self) -> ToolDescriptor {
            match self {
                TestTool::Echo => ToolDescriptor::new("echo", "Echo a message").param(
                    "message",
                    ParameterSpec::required(ParameterType::String, "Text to echo"),
                ),
                TestTool::Fail => ToolDescriptor::new("fail", "Always fails"),
                TestTool::Explode => ToolDescriptor::new("explode", "Always panics"),
            }
        }
    }

    #[derive(Default)]
    struct TestSet {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolSet for TestSet {
        type Tool = TestTool;

        fn server_name(&self) -> &str {
            "test"
        }

        async fn call(&self, tool: TestTool, arguments: &Arguments) -> ToolResult<ToolContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match tool {
                TestTool::Echo => Ok(ToolContent::from(arguments["message"].clone())),
                TestTool::Fail => Err(ToolError::upstream("Test", "boom")),
                TestTool::Explode => panic!("handler exploded"),
            }
        }

        fn diagnostics(&self) -> Map<String, Value> {
            let mut fields = Map::new();
            fields.insert("upstream".to_string(), json!("https://example.test"));
            fields.insert("status".to_string(), json!("overridden"));
            fields
        }
    }

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_call_success() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let result = server
            .call_tool(ToolCallRequest::new("echo", args(json!({"message": "hola"}))))
            .await;

        assert!(result.is_success());
        assert_eq!(result.to_text(), "hola");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let result = server
            .call_tool(ToolCallRequest::new("nope", Map::new()))
            .await;

        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("nope"));

        // still serving afterwards
        let again = server
            .call_tool(ToolCallRequest::new("echo", args(json!({"message": "x"}))))
            .await;
        assert!(again.is_success());
    }

    #[tokio::test]
    async fn test_missing_parameter_skips_handler() {
        let server = ToolServer::new(TestSet::default()).unwrap();

        let result = server
            .call_tool(ToolCallRequest::new("echo", Map::new()))
            .await;
        assert!(result.error_message().unwrap().contains("message"));

        let result = server
            .call_tool(ToolCallRequest::new("echo", args(json!({"message": null}))))
            .await;
        assert!(!result.is_success());

        assert_eq!(server.tool_set.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let result = server.call_tool(ToolCallRequest::new("fail", Map::new())).await;

        assert_eq!(result.error_message(), Some("Test error: boom"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let result = server
            .call_tool(ToolCallRequest::new("explode", Map::new()))
            .await;

        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("explode"));
    }

    #[test]
    fn test_list_tools_is_idempotent() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let first = server.list_tools();
        let second = server.list_tools();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].name, "echo");
    }

    #[test]
    fn test_health_keeps_status() {
        let server = ToolServer::new(TestSet::default()).unwrap();
        let health = server.health();

        assert_eq!(health["status"], "ok");
        assert_eq!(health["server"], "test");
        assert_eq!(health["upstream"], "https://example.test");
        assert_eq!(health["tools"].as_array().unwrap().len(), 3);
    }
}
