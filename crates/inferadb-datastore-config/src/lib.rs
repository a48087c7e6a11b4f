//! # InferaDB Datastore Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables.
//!
//! The datastore reads its settings from the `datastore:` section of a shared
//! configuration file, so the same file can also carry sections for other
//! services:
//!
//! ```yaml
//! datastore:
//!   logging: "info"
//!   revisions:
//!     quantization_period_ms: 5000
//!     gc_window_ms: 86400000
//!     follower_read_delay_ms: 0
//!     max_revision_staleness_ms: 500
//!   reader:
//!     default_query_limit: 1000
//! ```
//!
//! All revision settings are fixed once a consistency controller is built from
//! them; there is no runtime reconfiguration.

pub mod validation;

use std::{path::Path, time::Duration};

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Root configuration wrapper for shared config file support.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootConfig {
    /// Datastore-specific configuration
    #[serde(default)]
    pub datastore: Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_logging")]
    pub logging: String,

    #[serde(default)]
    pub revisions: RevisionsConfig,

    #[serde(default)]
    pub reader: ReaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: default_logging(),
            revisions: RevisionsConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

fn default_logging() -> String {
    "info".to_string()
}

/// Revision quantization and validation windows, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionsConfig {
    /// Bucket width for optimized revisions (0 disables quantization)
    #[serde(default = "default_quantization_period_ms")]
    pub quantization_period_ms: u64,

    /// How far back a caller-supplied revision may reach before it is stale
    #[serde(default = "default_gc_window_ms")]
    pub gc_window_ms: u64,

    /// Delay subtracted from the backend clock so follower replicas have
    /// caught up with the revision handed out
    #[serde(default = "default_follower_read_delay_ms")]
    pub follower_read_delay_ms: u64,

    /// Extra time a quantized revision may be reused past its bucket
    #[serde(default = "default_max_revision_staleness_ms")]
    pub max_revision_staleness_ms: u64,
}

impl Default for RevisionsConfig {
    fn default() -> Self {
        Self {
            quantization_period_ms: default_quantization_period_ms(),
            gc_window_ms: default_gc_window_ms(),
            follower_read_delay_ms: default_follower_read_delay_ms(),
            max_revision_staleness_ms: default_max_revision_staleness_ms(),
        }
    }
}

impl RevisionsConfig {
    pub fn quantization_period(&self) -> Duration {
        Duration::from_millis(self.quantization_period_ms)
    }

    pub fn gc_window(&self) -> Duration {
        Duration::from_millis(self.gc_window_ms)
    }

    pub fn follower_read_delay(&self) -> Duration {
        Duration::from_millis(self.follower_read_delay_ms)
    }

    pub fn max_revision_staleness(&self) -> Duration {
        Duration::from_millis(self.max_revision_staleness_ms)
    }
}

fn default_quantization_period_ms() -> u64 {
    5_000 // 5 seconds
}

fn default_gc_window_ms() -> u64 {
    86_400_000 // 24 hours
}

fn default_follower_read_delay_ms() -> u64 {
    0
}

fn default_max_revision_staleness_ms() -> u64 {
    500 // 10% of the default quantization period
}

/// Revisioned reader settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Limit applied to relationship queries that do not set one
    #[serde(default)]
    pub default_query_limit: Option<u64>,
}

/// Load configuration with layered precedence: defaults → file → env vars
///
/// 1. Defaults come from the `#[serde(default)]` annotations
/// 2. Values from the config file override them (if the file exists)
/// 3. Environment variables override both
///
/// Environment variables use the `INFERADB__DATASTORE__` prefix:
/// - `INFERADB__DATASTORE__LOGGING=debug`
/// - `INFERADB__DATASTORE__REVISIONS__QUANTIZATION_PERIOD_MS=1000`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let builder = ConfigBuilder::builder().add_source(File::from(path.as_ref()).required(false));

    let builder =
        builder.add_source(Environment::with_prefix("INFERADB").separator("__").try_parsing(true));

    let root: RootConfig = builder.build()?.try_deserialize()?;
    Ok(root.datastore)
}

/// Load configuration, falling back to defaults if loading fails
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
    match load(path.as_ref()) {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully from {:?}", path.as_ref());
            config
        },
        Err(e) => {
            tracing::warn!(
                "Failed to load config from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Config::default()
        },
    }
}

impl Config {
    /// Validate configuration at startup
    pub fn validate(&self) -> anyhow::Result<()> {
        validation::validate(self).map_err(|e| anyhow::anyhow!(e))?;

        if self.revisions.quantization_period_ms == 0 {
            tracing::warn!(
                "revisions.quantization_period_ms is 0. Every read will use a distinct revision."
            );
        }

        Ok(())
    }
}
