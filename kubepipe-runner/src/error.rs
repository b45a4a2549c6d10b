//! Error types for pipeline runs

use kubepipe_client::PlatformError;
use kubepipe_core::ResourceKind;
use kubepipe_spec::LoadError;
use thiserror::Error;
use tokio::task::JoinError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum RunError {
    /// The pipeline file has no Pipe document
    #[error("pipe not found")]
    SpecMissing,

    /// The pipeline file could not be loaded
    #[error(transparent)]
    Load(LoadError),

    /// The platform refused to create a resource
    #[error("failed to create {kind} {name}: {source}")]
    Create {
        kind: ResourceKind,
        name: String,
        #[source]
        source: PlatformError,
    },

    /// A workload did not reach a target phase in time
    #[error("timeout running workload {workload}")]
    Timeout { workload: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// A stage could not be attached to the run
    #[error("failed to schedule stage '{stage}': {reason}")]
    Composition { stage: String, reason: String },

    /// An engine task panicked or was cancelled
    #[error("engine task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

impl From<LoadError> for RunError {
    fn from(err: LoadError) -> Self {
        if err.is_pipe_not_found() {
            Self::SpecMissing
        } else {
            Self::Load(err)
        }
    }
}

impl RunError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
