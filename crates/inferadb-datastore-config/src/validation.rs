//! Configuration validation
//!
//! Validates configuration values and ensures consistency between them

use thiserror::Error;

use crate::{Config, ReaderConfig, RevisionsConfig};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("max_revision_staleness_ms ({staleness}) must not exceed gc_window_ms ({gc_window})")]
    StalenessExceedsGcWindow { staleness: u64, gc_window: u64 },

    #[error("follower_read_delay_ms ({delay}) must be less than gc_window_ms ({gc_window})")]
    FollowerDelayExceedsGcWindow { delay: u64, gc_window: u64 },

    #[error("Invalid default query limit: 0 (must be > 0 when set)")]
    InvalidQueryLimit,

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Validate complete configuration
pub fn validate(config: &Config) -> Result<()> {
    let mut errors: Vec<ValidationError> = [
        validate_logging(&config.logging),
        validate_revisions(&config.revisions),
        validate_reader(&config.reader),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Validate logging level
pub fn validate_logging(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::InvalidLogLevel(level.to_string())),
    }
}

/// Validate revision windows
///
/// A staleness tolerance wider than the GC window would let the controller
/// hand out revisions that `check_revision` rejects as stale.
pub fn validate_revisions(config: &RevisionsConfig) -> Result<()> {
    if config.max_revision_staleness_ms > config.gc_window_ms {
        return Err(ValidationError::StalenessExceedsGcWindow {
            staleness: config.max_revision_staleness_ms,
            gc_window: config.gc_window_ms,
        });
    }

    if config.follower_read_delay_ms >= config.gc_window_ms {
        return Err(ValidationError::FollowerDelayExceedsGcWindow {
            delay: config.follower_read_delay_ms,
            gc_window: config.gc_window_ms,
        });
    }

    Ok(())
}

/// Validate reader configuration
pub fn validate_reader(config: &ReaderConfig) -> Result<()> {
    if config.default_query_limit == Some(0) {
        return Err(ValidationError::InvalidQueryLimit);
    }
    Ok(())
}
