//! Tool Registry Module
//!
//! Each tool server owns a static, read-only table of the tools it
//! exposes. The table is derived from a [`ToolKind`] enum; handlers live
//! behind the [`ToolSet`] trait.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cerebro::registry::ToolRegistry;
//! use cerebro::tools::dropi::DropiTool;
//!
//! let registry = ToolRegistry::<DropiTool>::new()?;
//! let tool = registry.get("get_order")?;
//! println!("{}", tool.description());
//! ```

mod error;
mod kind;
mod registered;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use kind::{ToolKind, ToolSet};
pub use registered::RegisteredTool;
pub use registry::ToolRegistry;
