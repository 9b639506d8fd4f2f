//! Tool Aggregator
//!
//! Presents several tool servers as one namespace of qualified names
//! (`server.tool`) and routes each invocation to the owning server.
//!
//! ```rust,ignore
//! use cerebro::aggregator::{AggregatorConfig, ToolAggregator};
//! use cerebro::client::RemoteServerHandle;
//!
//! let aggregator = ToolAggregator::from_config(AggregatorConfig {
//!     servers: vec![RemoteServerHandle::new("chart", "http://localhost:3004")],
//!     ..Default::default()
//! })
//! .await?;
//!
//! let result = aggregator.invoke("chart.generate_chart", arguments).await;
//! ```

#[allow(clippy::module_inception)]
mod aggregator;
mod error;
mod name;

pub use aggregator::{AggregatorConfig, ServerHealth, ToolAggregator, DEFAULT_CALL_TIMEOUT};
pub use error::{AggregatorError, AggregatorResult};
pub use name::QualifiedName;
