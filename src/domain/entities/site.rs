//! Site entity - owner of deploys and per-target active pointers
//!
//! Created once; the active-pointer map is mutated only by successful
//! activations (the release state machine is the sole writer).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

/// A site with one active deploy slot per serving target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    id: SiteId,
    name: String,
    /// Owning organization reference (opaque to the engine)
    org_ref: String,
    active: BTreeMap<ReleaseTarget, DeployId>,
}

impl Site {
    pub fn new(id: SiteId, name: impl Into<String>, org_ref: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            org_ref: org_ref.into(),
            active: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &SiteId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn org_ref(&self) -> &str {
        &self.org_ref
    }

    /// Currently active deploy for a target, if any
    pub fn active_deploy(&self, target: ReleaseTarget) -> Option<&DeployId> {
        self.active.get(&target)
    }

    /// Point a target at a deploy. Only the release state machine calls
    /// this, after the destination switch succeeded.
    pub(crate) fn set_active(&mut self, target: ReleaseTarget, deploy: DeployId) {
        self.active.insert(target, deploy);
    }
}
