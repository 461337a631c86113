//! Error types for the recognition registry.

use crate::config::ConfigId;
use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors reported by [`crate::RecognitionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A priority was already set for this recognizer/configuration pair.
    ///
    /// Priorities are write-once; the first value stays in effect.
    #[error(
        "priority for {recognizer} ({config}) is already {existing}, refusing to change it to {requested}"
    )]
    PriorityRedefined {
        recognizer: &'static str,
        config: ConfigId,
        existing: i32,
        requested: i32,
    },
}
