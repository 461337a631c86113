//! Error types for the surface.

use tactus_config::ConfigError;
use tactus_contacts::{GroupId, TraceId};
use thiserror::Error;

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Errors that can occur while driving a surface.
///
/// Everything except `Config` and `RunnerStopped` means the clustering books
/// are corrupt; callers should treat those as fatal.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The settings handed to the surface are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A trace id is referenced by the clusterer but no longer stored.
    #[error("clustering invariant violated: {0} is referenced but missing")]
    MissingTrace(TraceId),

    /// A group id is referenced by the clusterer but no longer stored.
    #[error("clustering invariant violated: {0} is referenced but missing")]
    MissingGroup(GroupId),

    /// The runner thread has exited and no longer accepts input.
    #[error("surface runner has stopped")]
    RunnerStopped,

    /// The runner thread could not be spawned.
    #[error("failed to spawn surface thread: {0}")]
    Spawn(#[source] std::io::Error),
}
