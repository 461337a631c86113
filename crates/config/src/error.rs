//! Error types for settings loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON or misses a required field.
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A threshold is zero, negative, or not finite.
    #[error("invalid value for '{field}': {value} (must be finite and greater than zero)")]
    InvalidThreshold { field: &'static str, value: f64 },

    /// Unrecognized aggregation mode name.
    #[error("unknown aggregation mode '{0}' (expected 'union' or 'intersection')")]
    UnknownAggregation(String),
}
