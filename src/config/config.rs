//! TOML configuration file parsing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::RemoteServerHandle;

/// Agent overrides from the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverrides {
    /// LLM model identifier.
    pub model: Option<String>,
    /// Maximum LLM round trips per turn.
    pub max_iterations: Option<usize>,
    /// Maximum stored messages per conversation.
    pub max_history: Option<usize>,
    /// Whole-turn timeout in seconds.
    pub turn_timeout_seconds: Option<u64>,
}

/// Optional overrides layered on top of the environment.
///
/// ```toml
/// tool_timeout_seconds = 20
///
/// [agent]
/// max_iterations = 8
///
/// [[servers]]
/// identifier = "chart"
/// base_url = "http://localhost:3004"
/// description = "Gráficos"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Per tool call timeout in seconds.
    pub tool_timeout_seconds: Option<u64>,
    /// Agent overrides.
    pub agent: Option<AgentOverrides>,
    /// Tool servers; replaces the environment's list when non-empty.
    #[serde(default)]
    pub servers: Vec<RemoteServerHandle>,
}

/// Loads a [`Configuration`] from disk.
#[derive(Debug, Clone)]
pub struct ConfigurationLoader {
    /// Path the configuration was read from.
    pub config_path: PathBuf,
    /// Parsed configuration.
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Read and parse a TOML configuration file.
    pub fn new(config_path: &Path) -> Result<Self> {
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config: Self::load_config(config_path)?,
        })
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
tool_timeout_seconds = 12

[agent]
model = "claude-test"
max_iterations = 4

[[servers]]
identifier = "chart"
base_url = "http://localhost:3004"

[[servers]]
identifier = "meta"
base_url = "http://localhost:3002"
description = "Meta Ads"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let loader = ConfigurationLoader::new(file.path()).unwrap();
        let config = &loader.config;
        assert_eq!(config.tool_timeout_seconds, Some(12));
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].description, "");
        assert_eq!(config.servers[1].description, "Meta Ads");

        let mut settings = Settings::default();
        settings.apply(config);
        assert_eq!(settings.tool_timeout, Duration::from_secs(12));
        assert_eq!(settings.agent.model, "claude-test");
        assert_eq!(settings.agent.max_iterations, 4);
        assert_eq!(settings.agent.max_history, 40);
        assert_eq!(settings.servers[0].identifier, "chart");
    }

    #[test]
    fn test_empty_file_changes_nothing() {
        let file = NamedTempFile::new().unwrap();
        let loader = ConfigurationLoader::new(file.path()).unwrap();

        let mut settings = Settings::default();
        settings.servers.push(RemoteServerHandle::new("dropi", "http://x"));
        settings.apply(&loader.config);
        assert_eq!(settings.servers.len(), 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = ConfigurationLoader::new(Path::new("/nonexistent/cerebro.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"servers = 3").unwrap();

        let err = ConfigurationLoader::new(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
