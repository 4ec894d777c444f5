//! Release record - one activation (or rollback) event
//!
//! Binds a deploy to a (site, target, adapter) triple with the outcome of
//! the attempt. Forward activations and rollbacks are distinct audit
//! actions even though their destination mechanics are near-identical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

/// Whether the activation moved forward or back in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Activate,
    Rollback,
}

/// Outcome of the destination switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum ReleaseOutcome {
    Succeeded,
    Failed { reason: String },
}

/// A named activation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub site_id: SiteId,
    pub deploy_id: DeployId,
    pub target: ReleaseTarget,
    pub adapter: String,
    pub kind: ReleaseKind,
    pub outcome: ReleaseOutcome,
    pub at: DateTime<Utc>,
}

impl Release {
    pub fn new(
        site_id: SiteId,
        deploy_id: DeployId,
        target: ReleaseTarget,
        adapter: impl Into<String>,
        kind: ReleaseKind,
        outcome: ReleaseOutcome,
    ) -> Self {
        Self {
            site_id,
            deploy_id,
            target,
            adapter: adapter.into(),
            kind,
            outcome,
            at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ReleaseOutcome::Succeeded)
    }
}
