//! Environment variable loading and management.

use std::env;
use std::path::{Path, PathBuf};

/// Loads environment variables from a .env file and the process environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<PathBuf>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a .env file. If None, `.env` in the current
    ///   directory is loaded when present.
    ///
    /// Variables already set in the process win over the file.
    pub fn new(env_file: Option<&Path>) -> Self {
        let loaded = match env_file {
            Some(path) => match dotenv::from_path(path) {
                Ok(()) => Some(path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load .env file");
                    None
                }
            },
            None if Path::new(".env").exists() => dotenv::dotenv().ok(),
            None => None,
        };

        Self { env_file: loaded }
    }

    /// The .env file that was actually loaded, if any.
    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    /// Read a variable, treating empty values as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        lookup(key)
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Process-environment lookup with empty values treated as unset.
pub fn lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
