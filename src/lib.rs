//! Cerebro - business analytics over an HTTP tool protocol
//!
//! Cerebro answers WhatsApp questions about a dropshipping business by
//! letting an LLM call tools hosted on small HTTP tool servers:
//!
//! - **`protocol`** - Wire types: tool descriptors, call requests and results
//! - **`registry`** - Static per-server tool tables and the [`ToolSet`](registry::ToolSet) trait
//! - **`server`** - `GET /health`, `GET /tools`, `POST /call` on top of a tool set
//! - **`tools`** - Chart, Meta Ads, Shopify and Dropi tool sets
//! - **`client`** - Typed client for one remote tool server
//! - **`aggregator`** - One tool namespace over many servers (`server.tool`)
//! - **`agent`** - LLM loop, conversation stores and system prompt
//! - **`webhook`** - Messaging webhook front end with TwiML replies
//! - **`config`** / **`observability`** - Settings and tracing setup
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! # Protocol, client and aggregator only:
//! cerebro = { version = "0.3", default-features = false }
//! # Tool servers:
//! cerebro = { version = "0.3", default-features = false, features = ["server"] }
//! ```
//!
//! # Example: calling a tool through the aggregator
//!
//! ```ignore
//! use cerebro::aggregator::ToolAggregator;
//! use cerebro::config::Settings;
//! use serde_json::json;
//!
//! let settings = Settings::from_env()?;
//! let aggregator = ToolAggregator::from_config(settings.aggregator_config()).await?;
//!
//! let args = json!({"period": "week"}).as_object().cloned().unwrap_or_default();
//! let result = aggregator.invoke("meta.get_ad_spend_by_period", args).await;
//! println!("{}", result.to_text());
//! ```

#![warn(missing_docs)]

/// Tool protocol wire types
pub mod protocol;

/// Tool registry
pub mod registry;

/// Remote tool server client
pub mod client;

/// Tool aggregation across servers
pub mod aggregator;

/// Configuration management
pub mod config;

/// Tracing setup
pub mod observability;

/// Process lifecycle helpers (enabled with the `server` or `agent` feature)
#[cfg(any(feature = "server", feature = "agent"))]
pub mod lifecycle;

/// Tool server runtime (enabled with the `server` feature)
#[cfg(feature = "server")]
pub mod server;

/// Business tool sets (enabled with the `server` feature)
#[cfg(feature = "server")]
pub mod tools;

/// Agent loop (enabled with the `agent` feature)
#[cfg(feature = "agent")]
pub mod agent;

/// Messaging webhook (enabled with the `agent` feature)
#[cfg(feature = "agent")]
pub mod webhook;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::{QualifiedName, ToolAggregator};
    pub use crate::client::{RemoteServerHandle, RemoteToolClient};
    pub use crate::config::{ConfigurationLoader, EnvironmentLoader, Settings};
    pub use crate::protocol::{Arguments, ToolCallRequest, ToolCallResult, ToolDescriptor};
    pub use crate::registry::{ToolKind, ToolRegistry, ToolSet};

    #[cfg(feature = "server")]
    pub use crate::server::ToolServer;

    #[cfg(feature = "agent")]
    pub use crate::agent::{Agent, AgentConfig, LanguageModel};
}
