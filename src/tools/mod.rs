//! Business tool sets hosted by the tool servers.
//!
//! Each submodule defines a tool enum implementing
//! [`ToolKind`](crate::registry::ToolKind) and a handler struct
//! implementing [`ToolSet`](crate::registry::ToolSet):
//!
//! | Server    | Upstream                    |
//! |-----------|-----------------------------|
//! | `chart`   | n8n workflow and QuickChart |
//! | `meta`    | Meta Graph API              |
//! | `shopify` | Shopify Admin REST API      |
//! | `dropi`   | Dropi API                   |
//!
//! Handlers only format upstream data into text; credentials never appear
//! in replies or diagnostics.

pub mod chart;
pub mod dropi;
pub mod meta;
pub mod shopify;

mod args;
mod format;
mod upstream;

pub use chart::{ChartTool, ChartTools};
pub use dropi::{DropiTool, DropiTools};
pub use meta::{MetaTool, MetaTools};
pub use shopify::{ShopifyTool, ShopifyTools};
