//! Structured logging setup for binaries using the client.
//!
//! The library itself only emits `tracing` events; applications decide where
//! they go. `init_logging` installs a global subscriber with an env filter and
//! either pretty or JSON output.

use std::env;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted for the filter when `RUST_LOG` is unset
pub const LOG_FILTER_ENV: &str = "FLO_LOG";
/// Environment variable switching to JSON output
pub const LOG_JSON_ENV: &str = "FLO_LOG_JSON";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info,flo_client=debug`
    pub log_filter: String,
    pub enable_json_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = env::var(LOG_FILTER_ENV) {
            config.log_filter = filter;
        }
        if let Ok(json) = env::var(LOG_JSON_ENV) {
            config.enable_json_logging = json.eq_ignore_ascii_case("true") || json == "1";
        }
        config
    }

    /// `RUST_LOG` wins over the configured directive
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter))
    }
}

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.enable_json_logging {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
            .context("Failed to set global default subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
            .context("Failed to set global default subscriber")?;
    }

    debug!(
        log_format = if config.enable_json_logging { "json" } else { "pretty" },
        "Logging initialized"
    );

    Ok(())
}
