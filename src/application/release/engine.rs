//! Release engine - the state machine over (site, target) slots
//!
//! Orchestrates the release flow:
//! 1. Stage a deploy (validate patch manifest, freeze the file index)
//! 2. Upload its files into the destination's release slot
//! 3. Activate: the adapter switches the destination pointer, then the
//!    engine records the new active deploy and returns the superseded one
//!    to `staged`
//! 4. Roll back: same mechanics aimed at an earlier upload, no re-transfer
//!
//! A failed activation marks only the attempted deploy `failed` for that
//! target; the previously active deploy is never touched, so a site never
//! appears live on a broken deploy.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::entities::{
    Deploy, DestinationMetadata, FileIndex, PatchManifest, Release, ReleaseKind, ReleaseOutcome,
    TargetStatus,
};
use crate::domain::ports::{
    ActivateRequest, AdapterCatalog, AdapterConfig, AdapterContext, AdapterError, CancelFlag,
    DeployRepository, NoopEventSink, ReleaseEvent, ReleaseEventSink, RollbackRequest,
    SiteRepository, SiteSummary, UploadReceipt, UploadRequest,
};
use crate::domain::services::{validate_patch, OverlayChain, Resolution};
use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId, SitePath};
use crate::error::{EngineError, EngineResult};

use super::locks::{DestinationGate, TargetLocks};

/// Tunable engine behavior
#[derive(Debug, Clone)]
pub struct ReleasePolicy {
    /// Destination-side releases to keep after a successful activation.
    /// `None` keeps unlimited history (every superseded deploy stays a
    /// rollback target).
    pub retention_keep: Option<usize>,
    /// Maximum patch-chain depth accepted at stage time (`None` =
    /// unbounded)
    pub max_patch_depth: Option<usize>,
    /// Concurrent destination calls allowed per adapter
    pub destination_parallelism: usize,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            retention_keep: None,
            max_patch_depth: None,
            destination_parallelism: 4,
        }
    }
}

/// Request to record a new deploy
#[derive(Debug)]
pub struct StageRequest {
    pub deploy_id: DeployId,
    pub site_id: SiteId,
    pub adapter: String,
    pub index: FileIndex,
    pub patch: Option<PatchManifest>,
}

/// Result of staging a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    /// The patch changes nothing visible against its base chain; the
    /// deploy is recorded anyway and the caller decides whether to keep it
    NoOp,
}

/// The release state machine
///
/// Parameterized by its persistence ports and an adapter catalog, so the
/// storage technology and destination set are pluggable.
pub struct ReleaseEngine<SR, DR, AC>
where
    SR: SiteRepository,
    DR: DeployRepository,
    AC: AdapterCatalog,
{
    sites: SR,
    deploys: DR,
    adapters: AC,
    events: Arc<dyn ReleaseEventSink>,
    policy: ReleasePolicy,
    locks: TargetLocks,
    gate: DestinationGate,
}

impl<SR, DR, AC> ReleaseEngine<SR, DR, AC>
where
    SR: SiteRepository,
    DR: DeployRepository,
    AC: AdapterCatalog,
{
    pub fn new(sites: SR, deploys: DR, adapters: AC) -> Self {
        let policy = ReleasePolicy::default();
        let gate = DestinationGate::new(policy.destination_parallelism);
        Self {
            sites,
            deploys,
            adapters,
            events: Arc::new(NoopEventSink),
            policy,
            locks: TargetLocks::new(),
            gate,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ReleaseEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_policy(mut self, policy: ReleasePolicy) -> Self {
        self.gate = DestinationGate::new(policy.destination_parallelism);
        self.policy = policy;
        self
    }

    /// Record a new deploy as staged.
    ///
    /// Patch manifests are validated here (override/delete conflict, base
    /// existence, cycles, depth), never deferred to serve-time.
    pub fn stage(&self, request: StageRequest) -> EngineResult<StageOutcome> {
        let site = self.require_site(&request.site_id)?;
        self.require_adapter(&request.adapter)?;

        // A finalized deploy's index is immutable; reusing its id would
        // silently replace it (and would let a patch base itself).
        if self.deploys.get(&request.deploy_id)?.is_some() {
            return Err(EngineError::DeployAlreadyExists {
                deploy: request.deploy_id,
            });
        }

        let mut deploy = Deploy::new(
            request.deploy_id,
            site.id().clone(),
            request.adapter,
            request.index,
        );
        if let Some(manifest) = request.patch {
            deploy = deploy.with_patch(manifest);
        }

        let mut outcome = StageOutcome::Staged;
        if let Some(manifest) = deploy.patch().cloned() {
            validate_patch(&deploy)?;
            let base_chain = self.base_chain(&manifest)?;
            // A patch can only layer over its own site's deploys.
            if base_chain.head().site_id() != site.id() {
                return Err(EngineError::DeploySiteMismatch {
                    deploy: manifest.base_deploy_id.clone(),
                    site: site.id().clone(),
                });
            }
            if Self::patch_is_noop(&deploy, &manifest, &base_chain) {
                outcome = StageOutcome::NoOp;
            }
        }

        deploy.finalize();
        self.deploys.save(&deploy)?;

        self.events.on_event(ReleaseEvent::Staged {
            site: site.id().clone(),
            deploy: deploy.id().clone(),
            is_patch: deploy.is_patch(),
            file_count: deploy.index().len(),
        });

        Ok(outcome)
    }

    /// Transfer a deploy's files into the destination's release slot.
    ///
    /// Never affects what is currently served; safe to cancel via the flag
    /// or to retry after transient failures (the slot is keyed by deploy
    /// id, so re-upload is idempotent).
    pub fn upload(
        &self,
        deploy_id: &DeployId,
        files_dir: &Path,
        config: &AdapterConfig,
        cancel: CancelFlag,
    ) -> EngineResult<UploadReceipt> {
        let mut deploy = self.require_deploy(deploy_id)?;
        let site = self.require_site(deploy.site_id())?;
        let adapter = self.require_adapter(deploy.adapter())?;
        self.check_config(&*adapter, config)?;

        let _permit = self.gate.enter(deploy.adapter());
        let ctx = AdapterContext::new(SiteSummary {
            id: site.id().clone(),
            name: site.name().to_string(),
        })
        .with_cancel(cancel);

        let request = UploadRequest {
            deploy_id: deploy.id(),
            files_dir: files_dir.to_path_buf(),
            index: deploy.index(),
            config,
        };
        let receipt =
            adapter
                .upload(&ctx, &request)
                .map_err(|source| EngineError::UploadFailed {
                    deploy: deploy.id().clone(),
                    destination: deploy.adapter().to_string(),
                    source,
                })?;

        deploy.record_upload(DestinationMetadata {
            destination_ref: receipt.destination_ref.clone(),
            platform_deployment_id: receipt.platform_deployment_id.clone(),
            preview_url: receipt.preview_url.clone(),
            uploaded_at: Some(Utc::now()),
        });
        self.deploys.save(&deploy)?;

        self.events.on_event(ReleaseEvent::Uploaded {
            site: site.id().clone(),
            deploy: deploy.id().clone(),
            adapter: deploy.adapter().to_string(),
            destination_ref: receipt.destination_ref.clone(),
        });

        Ok(receipt)
    }

    /// Atomically make a deploy the one served for a target.
    ///
    /// The only way to change which deploy is live. On success the
    /// superseded deploy returns to `staged` and remains a rollback
    /// target.
    pub fn activate(
        &self,
        deploy_id: &DeployId,
        target: ReleaseTarget,
        config: &AdapterConfig,
    ) -> EngineResult<()> {
        self.switch(deploy_id, target, config, ReleaseKind::Activate)
    }

    /// Point a target back at a previously uploaded deploy.
    ///
    /// Identical mechanics to activation, but no re-upload occurs and the
    /// audit trail records a distinct action.
    pub fn rollback(
        &self,
        to_deploy_id: &DeployId,
        target: ReleaseTarget,
        config: &AdapterConfig,
    ) -> EngineResult<()> {
        self.switch(to_deploy_id, target, config, ReleaseKind::Rollback)
    }

    fn switch(
        &self,
        deploy_id: &DeployId,
        target: ReleaseTarget,
        config: &AdapterConfig,
        kind: ReleaseKind,
    ) -> EngineResult<()> {
        // Serialize per (site, target) before any state read; independent
        // pairs stay parallel.
        let site_id = self.require_deploy(deploy_id)?.site_id().clone();
        let key_lock = self.locks.acquire(&site_id, target);
        let _guard = key_lock.lock().unwrap();

        let mut deploy = self.require_deploy(deploy_id)?;
        let mut site = self.require_site(deploy.site_id())?;
        let adapter = self.require_adapter(deploy.adapter())?;
        self.check_config(&*adapter, config)?;

        // A rollback target must have a prior recorded upload; checked
        // before any destination call so current state is never altered.
        if !deploy.destination().has_upload() {
            return match kind {
                ReleaseKind::Rollback => Err(EngineError::RollbackTargetNotFound {
                    deploy: deploy.id().clone(),
                    destination: deploy.adapter().to_string(),
                }),
                ReleaseKind::Activate => Err(EngineError::ActivationFailed {
                    deploy: deploy.id().clone(),
                    target,
                    destination: deploy.adapter().to_string(),
                    source: AdapterError::ReleaseNotFound {
                        deploy: deploy.id().clone(),
                    },
                }),
            };
        }

        let _permit = self.gate.enter(deploy.adapter());

        let ctx = AdapterContext::new(SiteSummary {
            id: site.id().clone(),
            name: site.name().to_string(),
        });

        let platform_id = deploy.destination().platform_deployment_id.clone();
        let result = match kind {
            ReleaseKind::Activate => adapter.activate(
                &ctx,
                &ActivateRequest {
                    deploy_id: deploy.id(),
                    target,
                    config,
                    platform_deployment_id: platform_id.as_deref(),
                },
            ),
            ReleaseKind::Rollback => adapter.rollback(
                &ctx,
                &RollbackRequest {
                    to_deploy_id: deploy.id(),
                    target,
                    config,
                    platform_deployment_id: platform_id.as_deref(),
                },
            ),
        };

        if let Err(source) = result {
            // The previous active deploy is untouched and stays live.
            deploy.set_status(target, TargetStatus::Failed);
            self.deploys.save(&deploy)?;
            self.deploys.append_release(&Release::new(
                site.id().clone(),
                deploy.id().clone(),
                target,
                deploy.adapter(),
                kind,
                ReleaseOutcome::Failed {
                    reason: source.to_string(),
                },
            ))?;
            self.events.on_event(ReleaseEvent::ActivationFailed {
                site: site.id().clone(),
                deploy: deploy.id().clone(),
                target,
                error: source.to_string(),
            });
            return Err(EngineError::ActivationFailed {
                deploy: deploy.id().clone(),
                target,
                destination: deploy.adapter().to_string(),
                source,
            });
        }

        let superseded = site.active_deploy(target).cloned();
        if let Some(prev_id) = &superseded {
            if prev_id != deploy.id() {
                if let Some(mut prev) = self.deploys.get(prev_id)? {
                    // Never `failed`: a superseded deploy remains a valid
                    // rollback target.
                    prev.set_status(target, TargetStatus::Staged);
                    self.deploys.save(&prev)?;
                }
            }
        }

        deploy.set_status(target, TargetStatus::Active);
        self.deploys.save(&deploy)?;
        site.set_active(target, deploy.id().clone());
        self.sites.save(&site)?;

        self.deploys.append_release(&Release::new(
            site.id().clone(),
            deploy.id().clone(),
            target,
            deploy.adapter(),
            kind,
            ReleaseOutcome::Succeeded,
        ))?;

        let event = match kind {
            ReleaseKind::Activate => ReleaseEvent::Activated {
                site: site.id().clone(),
                deploy: deploy.id().clone(),
                target,
                superseded: superseded.clone(),
            },
            ReleaseKind::Rollback => ReleaseEvent::RolledBack {
                site: site.id().clone(),
                deploy: deploy.id().clone(),
                target,
                superseded: superseded.clone(),
            },
        };
        self.events.on_event(event);

        self.run_retention(&site.id().clone(), &deploy, &ctx, config);

        Ok(())
    }

    /// Best-effort retention sweep after a successful switch
    fn run_retention(
        &self,
        site_id: &SiteId,
        deploy: &Deploy,
        ctx: &AdapterContext,
        config: &AdapterConfig,
    ) {
        let Some(keep) = self.policy.retention_keep else {
            return;
        };
        let Some(adapter) = self.adapters.get(deploy.adapter()) else {
            return;
        };
        if !adapter.supports_cleanup() {
            return;
        }
        if let Ok(report) = adapter.cleanup_old(ctx, config, keep) {
            self.events.on_event(ReleaseEvent::CleanupRan {
                site: site_id.clone(),
                adapter: deploy.adapter().to_string(),
                removed: report.removed.len(),
                kept: report.kept,
            });
        }
    }

    /// Currently active deploy for a (site, target) slot
    pub fn active_deploy(
        &self,
        site_id: &SiteId,
        target: ReleaseTarget,
    ) -> EngineResult<Option<DeployId>> {
        let site = self.require_site(site_id)?;
        Ok(site.active_deploy(target).cloned())
    }

    /// Release history for one (site, target), oldest first
    pub fn history(&self, site_id: &SiteId, target: ReleaseTarget) -> EngineResult<Vec<Release>> {
        self.require_site(site_id)?;
        Ok(self.deploys.releases_for(site_id, target)?)
    }

    /// All deploys recorded for a site, newest first
    pub fn deploys_for(&self, site_id: &SiteId) -> EngineResult<Vec<Deploy>> {
        self.require_site(site_id)?;
        Ok(self.deploys.list_for_site(site_id)?)
    }

    /// Build the verified overlay chain headed by a deploy
    pub fn overlay_chain(&self, head: &DeployId) -> EngineResult<OverlayChain> {
        self.require_deploy(head)?;
        let lookup = |id: &DeployId| self.deploys.get(id).ok().flatten();
        Ok(OverlayChain::build(
            head,
            &lookup,
            self.policy.max_patch_depth,
        )?)
    }

    /// Which deploy serves `path` under the chain headed by `head`.
    ///
    /// This is the query surface for the content-serving layer; it is a
    /// pure function of the stored chain and the path.
    pub fn resolve_path(&self, head: &DeployId, path: &SitePath) -> EngineResult<Resolution> {
        Ok(self.overlay_chain(head)?.resolve(path))
    }

    /// Materialize a patch chain into a new staged non-patch deploy.
    ///
    /// Bounds effective chain depth without losing history; the flattened
    /// deploy has no recorded upload yet and must be uploaded before
    /// activation.
    pub fn flatten(&self, head: &DeployId, new_deploy_id: DeployId) -> EngineResult<Deploy> {
        if self.deploys.get(&new_deploy_id)?.is_some() {
            return Err(EngineError::DeployAlreadyExists {
                deploy: new_deploy_id,
            });
        }
        let chain = self.overlay_chain(head)?;
        let source = chain.head();
        let mut flattened = Deploy::new(
            new_deploy_id,
            source.site_id().clone(),
            source.adapter(),
            chain.materialize(),
        );
        flattened.finalize();
        self.deploys.save(&flattened)?;

        self.events.on_event(ReleaseEvent::Staged {
            site: flattened.site_id().clone(),
            deploy: flattened.id().clone(),
            is_patch: false,
            file_count: flattened.index().len(),
        });

        Ok(flattened)
    }

    fn base_chain(&self, manifest: &PatchManifest) -> EngineResult<OverlayChain> {
        // The new deploy adds one layer on top of its base chain.
        let base_limit = self.policy.max_patch_depth.map(|m| m.saturating_sub(1));
        let lookup = |id: &DeployId| self.deploys.get(id).ok().flatten();
        Ok(OverlayChain::build(
            &manifest.base_deploy_id,
            &lookup,
            base_limit,
        )?)
    }

    /// A patch is a no-op when every override matches the base chain's
    /// effective content and every delete removes nothing visible
    fn patch_is_noop(deploy: &Deploy, manifest: &PatchManifest, base_chain: &OverlayChain) -> bool {
        let overrides_match = manifest.overrides.iter().all(|path| {
            let own = deploy.index().get(path).map(|e| &e.fingerprint);
            let effective = base_chain.effective_fingerprint(path);
            matches!((own, effective), (Some(a), Some(b)) if *a == b)
        });
        let deletes_invisible = manifest
            .deletes
            .iter()
            .all(|path| base_chain.effective_fingerprint(path).is_none());

        overrides_match && deletes_invisible
    }

    fn require_site(&self, id: &SiteId) -> EngineResult<crate::domain::entities::Site> {
        self.sites
            .get(id)?
            .ok_or_else(|| EngineError::SiteNotFound { site: id.clone() })
    }

    fn require_deploy(&self, id: &DeployId) -> EngineResult<Deploy> {
        self.deploys
            .get(id)?
            .ok_or_else(|| EngineError::DeployNotFound {
                deploy: id.clone(),
            })
    }

    fn require_adapter(
        &self,
        name: &str,
    ) -> EngineResult<Arc<dyn crate::domain::ports::DestinationAdapter>> {
        self.adapters
            .get(name)
            .ok_or_else(|| EngineError::ConfigInvalid {
                adapter: name.to_string(),
                reason: "unknown adapter name".to_string(),
            })
    }

    fn check_config(
        &self,
        adapter: &dyn crate::domain::ports::DestinationAdapter,
        config: &AdapterConfig,
    ) -> EngineResult<()> {
        adapter
            .validate_config(config)
            .map_err(|e| EngineError::ConfigInvalid {
                adapter: adapter.name().to_string(),
                reason: e.to_string(),
            })
    }
}
