//! Observability setup.
//!
//! All modules log through `tracing` macros with structured fields; this
//! module installs the process-wide subscriber once at startup.
//!
//! # Example
//!
//! ```no_run
//! use cerebro::config::LoggingSettings;
//! use cerebro::observability::init_tracing;
//!
//! init_tracing(&LoggingSettings::default()).unwrap();
//! tracing::info!(server = "chart", "Starting");
//! ```

use anyhow::{anyhow, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed. An unparsable filter falls
/// back to `info`.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let env_filter = build_filter(&settings.filter);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    result.map_err(|e| anyhow!("failed to initialize tracing subscriber: {}", e))?;

    tracing::debug!(filter = %settings.filter, json = settings.json, "Tracing initialized");
    Ok(())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}; using 'info'", directive, e);
        EnvFilter::new("info")
    })
}
