//! HTTP client for one remote tool server.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{Arguments, ToolCallRequest, ToolCallResult, ToolDescriptor, ToolList};

use super::{ClientError, ClientResult};

/// Where a tool server lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServerHandle {
    /// Server identifier, the prefix of qualified tool names.
    pub identifier: String,

    /// Base URL (e.g., "http://127.0.0.1:3001").
    pub base_url: String,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,
}

impl RemoteServerHandle {
    /// Create a new handle.
    pub fn new(identifier: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            base_url: base_url.into(),
            description: String::new(),
        }
    }

    /// Set a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Snapshot of a server's tool list.
#[derive(Debug, Clone, Default)]
pub struct ToolCache {
    /// Tools in the order the server advertised them.
    pub tools: Vec<ToolDescriptor>,

    /// When the list was fetched; `None` until the first successful refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Client for a single tool server.
///
/// The cached tool list is swapped wholesale on refresh, so concurrent
/// readers observe either the old or the new list.
#[derive(Debug)]
pub struct RemoteToolClient {
    handle: RemoteServerHandle,
    http_client: reqwest::Client,
    cache: RwLock<Arc<ToolCache>>,
}

impl RemoteToolClient {
    /// Create a client whose requests are bounded by `timeout`.
    pub fn new(handle: RemoteServerHandle, timeout: Duration) -> ClientResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::from_reqwest(&handle.identifier, e))?;

        Ok(Self::with_http_client(handle, http_client))
    }

    /// Create a client on top of an existing reqwest client.
    pub fn with_http_client(handle: RemoteServerHandle, http_client: reqwest::Client) -> Self {
        Self {
            handle,
            http_client,
            cache: RwLock::new(Arc::new(ToolCache::default())),
        }
    }

    /// The server this client talks to.
    pub fn handle(&self) -> &RemoteServerHandle {
        &self.handle
    }

    /// Server identifier.
    pub fn identifier(&self) -> &str {
        &self.handle.identifier
    }

    /// Current cache snapshot.
    pub fn cache(&self) -> Arc<ToolCache> {
        let guard = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Cached tool descriptors; empty before the first refresh.
    pub fn cached_tools(&self) -> Vec<ToolDescriptor> {
        self.cache().tools.clone()
    }

    /// Fetch `GET /tools`, replace the cache and return the new snapshot.
    ///
    /// On failure the previous cache is kept.
    pub async fn refresh_tools(&self) -> ClientResult<Arc<ToolCache>> {
        let url = self.handle.endpoint("tools");
        debug!(server = %self.handle.identifier, %url, "Refreshing tools");

        let list: ToolList = self.get_json(&url).await?;
        let count = list.tools.len();

        let fresh = Arc::new(ToolCache {
            tools: list.tools,
            refreshed_at: Some(Utc::now()),
        });
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&fresh);

        info!(server = %self.handle.identifier, tools = count, "Tool list refreshed");
        Ok(fresh)
    }

    /// Invoke a tool by its unqualified name.
    ///
    /// A `Failure` body is a normal return value; only transport problems
    /// are errors.
    pub async fn invoke(&self, tool: &str, arguments: Arguments) -> ClientResult<ToolCallResult> {
        let url = self.handle.endpoint("call");
        let request = ToolCallRequest::new(tool, arguments);
        debug!(server = %self.handle.identifier, tool, "Invoking remote tool");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.error(e))?;

        let response = self.check_status(response)?;
        let result: ToolCallResult = response.json().await.map_err(|e| self.error(e))?;

        if let Some(message) = result.error_message() {
            warn!(server = %self.handle.identifier, tool, error = message, "Remote tool reported failure");
        }

        Ok(result)
    }

    /// Fetch `GET /health`.
    pub async fn health(&self) -> ClientResult<Value> {
        self.get_json(&self.handle.endpoint("health")).await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> ClientResult<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.error(e))?;

        self.check_status(response)?
            .json()
            .await
            .map_err(|e| self.error(e))
    }

    fn check_status(&self, response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Status {
                server: self.handle.identifier.clone(),
                status: status.as_u16(),
            })
        }
    }

    fn error(&self, error: reqwest::Error) -> ClientError {
        ClientError::from_reqwest(&self.handle.identifier, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let handle = RemoteServerHandle::new("meta", "http://localhost:3001/");
        assert_eq!(handle.endpoint("tools"), "http://localhost:3001/tools");

        let handle = RemoteServerHandle::new("meta", "http://localhost:3001");
        assert_eq!(handle.endpoint("call"), "http://localhost:3001/call");
    }

    #[test]
    fn test_cache_starts_empty() {
        let client = RemoteToolClient::new(
            RemoteServerHandle::new("chart", "http://localhost:1"),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(client.cached_tools().is_empty());
        assert!(client.cache().refreshed_at.is_none());
        assert_eq!(client.identifier(), "chart");
    }

    #[tokio::test]
    async fn test_refresh_unreachable_keeps_cache() {
        let client = RemoteToolClient::new(
            RemoteServerHandle::new("shopify", closed_port_url().await),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.refresh_tools().await.unwrap_err();
        assert_eq!(err.server(), "shopify");
        assert!(client.cached_tools().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_unreachable_is_error() {
        let client = RemoteToolClient::new(
            RemoteServerHandle::new("dropi", closed_port_url().await),
            Duration::from_secs(2),
        )
        .unwrap();

        let result = client.invoke("get_dropi_wallet", Map::new()).await;
        assert!(result.is_err());
    }
}
