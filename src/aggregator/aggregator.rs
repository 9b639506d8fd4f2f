//! Merged namespace over several tool servers.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{RemoteServerHandle, RemoteToolClient};
use crate::protocol::{Arguments, ToolCallResult, ToolDescriptor};

use super::name::is_valid_identifier;
use super::{AggregatorError, AggregatorResult, QualifiedName};

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Servers to aggregate and the per-call timeout.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Servers in registration order.
    pub servers: Vec<RemoteServerHandle>,

    /// Upper bound on one remote invocation.
    pub call_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Liveness of one aggregated server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerHealth {
    /// Server identifier.
    pub identifier: String,
    /// Whether `GET /health` answered.
    pub healthy: bool,
    /// Number of cached tools.
    pub tools: usize,
    /// Time of the last successful refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Probe failure, when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes qualified tool names to the server that owns them.
///
/// The server list is only appended to; each server's tool cache is
/// replaced by its own client on refresh. No lock is held across an await.
#[derive(Debug)]
pub struct ToolAggregator {
    servers: RwLock<Vec<Arc<RemoteToolClient>>>,
    call_timeout: Duration,
}

impl Default for ToolAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl ToolAggregator {
    /// Create an empty aggregator.
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            servers: RwLock::new(Vec::new()),
            call_timeout,
        }
    }

    /// Create an aggregator and register every configured server.
    ///
    /// Unreachable servers are registered anyway with an empty cache.
    pub async fn from_config(config: AggregatorConfig) -> AggregatorResult<Self> {
        let aggregator = Self::new(config.call_timeout);
        for handle in config.servers {
            aggregator.register_server(handle).await?;
        }
        Ok(aggregator)
    }

    /// Per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Register a server and fetch its tool list.
    ///
    /// Invalid or duplicate identifiers are rejected. A failed initial
    /// refresh is logged and leaves the server registered with no tools.
    pub async fn register_server(&self, handle: RemoteServerHandle) -> AggregatorResult<()> {
        if !is_valid_identifier(&handle.identifier) {
            return Err(AggregatorError::InvalidIdentifier(handle.identifier));
        }

        let client = Arc::new(RemoteToolClient::new(handle, self.call_timeout)?);

        {
            let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
            if servers
                .iter()
                .any(|existing| existing.identifier() == client.identifier())
            {
                return Err(AggregatorError::DuplicateServer(
                    client.identifier().to_string(),
                ));
            }
            servers.push(Arc::clone(&client));
        }

        info!(server = client.identifier(), url = %client.handle().base_url, "Registered tool server");

        if let Err(e) = client.refresh_tools().await {
            warn!(server = client.identifier(), error = %e, "Initial tool refresh failed");
        }

        Ok(())
    }

    /// Identifiers of registered servers, in registration order.
    pub fn server_ids(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|client| client.identifier().to_string())
            .collect()
    }

    /// Every cached tool under its qualified name.
    ///
    /// Ordered by server registration, then by each server's own order.
    pub fn list_all_tools(&self) -> Vec<(QualifiedName, ToolDescriptor)> {
        self.snapshot()
            .iter()
            .flat_map(|client| {
                let server = client.identifier().to_string();
                client
                    .cache()
                    .tools
                    .iter()
                    .map(|descriptor| {
                        (
                            QualifiedName::new(server.clone(), descriptor.name.clone()),
                            descriptor.clone(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Invoke a tool by qualified name.
    ///
    /// Never fails: malformed names, unknown servers, transport errors and
    /// timeouts all become a failure result.
    pub async fn invoke(&self, qualified_name: &str, arguments: Arguments) -> ToolCallResult {
        let name = match QualifiedName::parse(qualified_name) {
            Ok(name) => name,
            Err(e) => return ToolCallResult::failure(e.to_string()),
        };

        let Some(client) = self.client(name.server()) else {
            return ToolCallResult::failure(
                AggregatorError::UnknownServer(name.server().to_string()).to_string(),
            );
        };

        debug!(tool = %name, "Routing tool call");

        match tokio::time::timeout(self.call_timeout, client.invoke(name.tool(), arguments)).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool server unavailable");
                ToolCallResult::failure(format!(
                    "service unavailable: '{}' could not be reached ({})",
                    name.server(),
                    e
                ))
            }
            Err(_) => {
                warn!(tool = %name, timeout = ?self.call_timeout, "Tool call timed out");
                ToolCallResult::failure(format!(
                    "service unavailable: '{}' did not answer within {:?}",
                    name.server(),
                    self.call_timeout
                ))
            }
        }
    }

    /// Refresh every server's tool list.
    ///
    /// Returns the number of servers that refreshed successfully.
    pub async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for client in self.snapshot() {
            match client.refresh_tools().await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(server = client.identifier(), error = %e, "Tool refresh failed"),
            }
        }
        refreshed
    }

    /// Probe every server's health endpoint.
    pub async fn health(&self) -> Vec<ServerHealth> {
        let mut report = Vec::new();
        for client in self.snapshot() {
            let cache = client.cache();
            let probe = client.health().await;
            report.push(ServerHealth {
                identifier: client.identifier().to_string(),
                healthy: probe.is_ok(),
                tools: cache.tools.len(),
                refreshed_at: cache.refreshed_at,
                error: probe.err().map(|e| e.to_string()),
            });
        }
        report
    }

    fn client(&self, identifier: &str) -> Option<Arc<RemoteToolClient>> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|client| client.identifier() == identifier)
            .cloned()
    }

    fn snapshot(&self) -> Vec<Arc<RemoteToolClient>> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
