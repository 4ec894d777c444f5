//! Error types for the release engine
//!
//! Uses `thiserror` for library errors. The variants mirror the failure
//! taxonomy of the release protocol: configuration problems are rejected
//! before any network traffic, upload and activation failures carry enough
//! context (deploy, target, destination) for the caller to decide between
//! retry and abort.

use thiserror::Error;

use crate::domain::ports::AdapterError;
use crate::domain::services::PatchResolutionError;
use crate::domain::value_objects::{DeployId, PathError, ReleaseTarget, SiteId};

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Adapter configuration rejected before any side effect
    #[error("invalid configuration for adapter '{adapter}': {reason}")]
    ConfigInvalid { adapter: String, reason: String },

    /// Transfer to the destination failed; the live state is untouched
    #[error("upload of deploy '{deploy}' to '{destination}' failed: {source}")]
    UploadFailed {
        deploy: DeployId,
        destination: String,
        source: AdapterError,
    },

    /// The destination rejected or failed the atomic switch
    #[error("activation of deploy '{deploy}' for {target} on '{destination}' failed: {source}")]
    ActivationFailed {
        deploy: DeployId,
        target: ReleaseTarget,
        destination: String,
        source: AdapterError,
    },

    /// Rollback requested to a deploy with no recorded upload at the destination
    #[error("deploy '{deploy}' was never uploaded to '{destination}', cannot roll back to it")]
    RollbackTargetNotFound {
        deploy: DeployId,
        destination: String,
    },

    /// Patch manifest or chain problem (cycle, conflict, missing base)
    #[error(transparent)]
    PatchResolution(#[from] PatchResolutionError),

    /// Path failed normalization
    #[error(transparent)]
    PathInvalid(#[from] PathError),

    /// Referenced site does not exist
    #[error("site '{site}' not found")]
    SiteNotFound { site: SiteId },

    /// Referenced deploy does not exist
    #[error("deploy '{deploy}' not found")]
    DeployNotFound { deploy: DeployId },

    /// Staging refused: the id already names a finalized deploy
    #[error("deploy '{deploy}' already exists")]
    DeployAlreadyExists { deploy: DeployId },

    /// Deploy belongs to a different site than the one named in the request
    #[error("deploy '{deploy}' does not belong to site '{site}'")]
    DeploySiteMismatch { deploy: DeployId, site: SiteId },

    /// Persistence layer failure
    #[error("repository error: {0}")]
    Repository(#[from] crate::domain::ports::RepositoryError),
}
