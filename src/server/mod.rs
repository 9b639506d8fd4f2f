//! Tool Server
//!
//! Hosts one [`ToolSet`](crate::registry::ToolSet) over HTTP. The
//! [`ToolServer`] value does the dispatching and is usable without any
//! transport; [`router`] and [`serve`] put it behind axum.
//!
//! ```rust,ignore
//! use cerebro::server::{serve, ToolServer};
//! use cerebro::tools::dropi::DropiTools;
//!
//! let server = ToolServer::new(DropiTools::new(settings.dropi.clone(), settings.tool_timeout)?)?;
//! serve(server, "0.0.0.0:3000".parse()?).await?;
//! ```

mod http;
mod service;

pub use http::{router, serve};
pub use service::ToolServer;
