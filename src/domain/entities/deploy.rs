//! Deploy entity - an immutable, versioned snapshot (or patch) of site content
//!
//! A deploy owns its file index; once finalized the index is frozen and any
//! further attempt to change it is an error. Which deploy is live for a
//! target is not decided here - per-target standing is recorded on the
//! deploy but only the release state machine mutates it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId, SitePath};

use super::file_index::FileIndex;

/// Standing of a deploy for one (site, target) slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// Recorded, eligible for activation (also the state a superseded
    /// deploy returns to - it remains a valid rollback target)
    #[default]
    Staged,
    /// Currently live for the target
    Active,
    /// Last activation attempt for the target failed
    Failed,
}

/// The `(base, overrides, deletes)` triple of a patch deploy
///
/// The base may itself be a patch, forming a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchManifest {
    /// Deploy this patch layers over
    pub base_deploy_id: DeployId,
    /// Paths answered by this patch's own index
    pub overrides: BTreeSet<SitePath>,
    /// Paths removed from the effective site (a delete always wins over
    /// anything deeper in the chain)
    pub deletes: BTreeSet<SitePath>,
}

impl PatchManifest {
    pub fn new(base_deploy_id: DeployId) -> Self {
        Self {
            base_deploy_id,
            overrides: BTreeSet::new(),
            deletes: BTreeSet::new(),
        }
    }

    pub fn with_override(mut self, path: SitePath) -> Self {
        self.overrides.insert(path);
        self
    }

    pub fn with_delete(mut self, path: SitePath) -> Self {
        self.deletes.insert(path);
        self
    }

    /// Paths listed in both `overrides` and `deletes` (invalid input;
    /// rejected at patch-creation time)
    pub fn conflicting_paths(&self) -> impl Iterator<Item = &SitePath> {
        self.overrides.intersection(&self.deletes)
    }
}

/// Where the destination says an upload landed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationMetadata {
    /// Destination-side reference to the release slot (e.g. a prefix or
    /// directory)
    pub destination_ref: Option<String>,
    /// Platform-assigned deployment id, for hosted platforms that mint one
    pub platform_deployment_id: Option<String>,
    /// Preview URL reported by the destination, if any
    pub preview_url: Option<String>,
    /// When the upload completed
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl DestinationMetadata {
    /// Whether an upload has been recorded at the destination
    pub fn has_upload(&self) -> bool {
        self.uploaded_at.is_some()
    }
}

/// Error for illegal deploy mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployStateError {
    #[error("deploy '{0}' is finalized; its file index is frozen")]
    AlreadyFinalized(DeployId),
    #[error("deploy '{0}' is not finalized")]
    NotFinalized(DeployId),
}

/// A versioned snapshot (or patch) of site content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
    id: DeployId,
    site_id: SiteId,
    /// Name of the adapter that serves this deploy's destination
    adapter: String,
    index: FileIndex,
    patch: Option<PatchManifest>,
    destination: DestinationMetadata,
    target_status: BTreeMap<ReleaseTarget, TargetStatus>,
    finalized: bool,
    created_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl Deploy {
    /// Create a new staged, unfinalized deploy
    pub fn new(id: DeployId, site_id: SiteId, adapter: impl Into<String>, index: FileIndex) -> Self {
        Self {
            id,
            site_id,
            adapter: adapter.into(),
            index,
            patch: None,
            destination: DestinationMetadata::default(),
            target_status: BTreeMap::new(),
            finalized: false,
            created_at: Utc::now(),
            finalized_at: None,
        }
    }

    /// Mark this deploy as a patch over a base deploy
    pub fn with_patch(mut self, manifest: PatchManifest) -> Self {
        self.patch = Some(manifest);
        self
    }

    pub fn id(&self) -> &DeployId {
        &self.id
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn patch(&self) -> Option<&PatchManifest> {
        self.patch.as_ref()
    }

    pub fn is_patch(&self) -> bool {
        self.patch.is_some()
    }

    pub fn destination(&self) -> &DestinationMetadata {
        &self.destination
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Freeze the file index. Idempotent.
    pub fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            self.finalized_at = Some(Utc::now());
        }
    }

    /// Replace the file index; only legal before finalization
    pub fn set_index(&mut self, index: FileIndex) -> Result<(), DeployStateError> {
        if self.finalized {
            return Err(DeployStateError::AlreadyFinalized(self.id.clone()));
        }
        self.index = index;
        Ok(())
    }

    /// Record the destination's answer to an upload
    pub(crate) fn record_upload(&mut self, metadata: DestinationMetadata) {
        self.destination = metadata;
    }

    /// Standing of this deploy for a target (staged until told otherwise)
    pub fn status_for(&self, target: ReleaseTarget) -> TargetStatus {
        self.target_status.get(&target).copied().unwrap_or_default()
    }

    /// Set per-target standing. Only the release state machine calls this.
    pub(crate) fn set_status(&mut self, target: ReleaseTarget, status: TargetStatus) {
        self.target_status.insert(target, status);
    }
}
