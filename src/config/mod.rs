//! Configuration management.
//!
//! Settings come from environment variables (optionally seeded from a
//! `.env` file) with an optional TOML file layered on top.
//!
//! # Example
//!
//! ```no_run
//! use cerebro::config::{ConfigurationLoader, EnvironmentLoader, Settings};
//! use std::path::Path;
//!
//! let _env = EnvironmentLoader::new(None);
//! let mut settings = Settings::from_env().unwrap();
//!
//! let loader = ConfigurationLoader::new(Path::new("config/cerebro.toml")).unwrap();
//! settings.apply(&loader.config);
//!
//! println!("Max iterations: {}", settings.agent.max_iterations);
//! ```

#[allow(clippy::module_inception)]
pub mod config;
pub mod environment;
pub mod settings;

// Re-export main types for convenience
pub use self::config::{AgentOverrides, Configuration, ConfigurationLoader};
pub use self::environment::EnvironmentLoader;
pub use self::settings::{
    AgentSettings, ChartSettings, DropiSettings, LoggingSettings, MetaSettings, Settings,
    ShopifySettings, TwilioSettings, DEFAULT_AGENT_PORT, DEFAULT_MODEL, DEFAULT_TOOL_SERVER_PORT,
};
