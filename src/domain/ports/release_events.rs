//! Release Event Port
//!
//! Observable interface for release operations. One event per
//! stage/upload/activate/rollback transition, carrying (site, deploy,
//! target, outcome) for the audit collaborator.

use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

/// Event emitted during release operations
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A deploy was recorded as staged
    Staged {
        site: SiteId,
        deploy: DeployId,
        is_patch: bool,
        file_count: usize,
    },

    /// Files landed in the destination's release slot
    Uploaded {
        site: SiteId,
        deploy: DeployId,
        adapter: String,
        destination_ref: Option<String>,
    },

    /// The destination's current pointer switched to the deploy
    Activated {
        site: SiteId,
        deploy: DeployId,
        target: ReleaseTarget,
        /// Deploy that was live before this activation, now staged again
        superseded: Option<DeployId>,
    },

    /// The atomic switch failed; the previous deploy remains live
    ActivationFailed {
        site: SiteId,
        deploy: DeployId,
        target: ReleaseTarget,
        error: String,
    },

    /// A target was pointed back at an earlier upload
    RolledBack {
        site: SiteId,
        deploy: DeployId,
        target: ReleaseTarget,
        superseded: Option<DeployId>,
    },

    /// Optional retention sweep finished
    CleanupRan {
        site: SiteId,
        adapter: String,
        removed: usize,
        kept: usize,
    },
}

/// Trait for receiving release events
///
/// Implementations can forward to an audit log, stream NDJSON for CI, or
/// stay silent.
pub trait ReleaseEventSink: Send + Sync {
    fn on_event(&self, event: ReleaseEvent);
}

/// No-op event sink for silent operation
pub struct NoopEventSink;

impl ReleaseEventSink for NoopEventSink {
    fn on_event(&self, _event: ReleaseEvent) {
        // Do nothing
    }
}
