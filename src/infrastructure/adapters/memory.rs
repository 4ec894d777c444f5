//! In-memory destination adapter
//!
//! Keeps uploaded releases and target pointers in a shared map. Used by
//! the test suite and as a scratch destination; supports failure injection
//! so state-machine error paths can be exercised without a real
//! destination misbehaving on cue.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::ports::{
    ActivateRequest, AdapterConfig, AdapterContext, AdapterError, CleanupReport, ConfigError,
    DestinationAdapter, ReleaseInfo, RollbackRequest, UploadReceipt, UploadRequest,
};
use crate::domain::value_objects::{DeployId, ReleaseTarget};

#[derive(Debug, Clone)]
struct StoredRelease {
    uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    releases: BTreeMap<DeployId, StoredRelease>,
    pointers: BTreeMap<ReleaseTarget, DeployId>,
}

/// Destination that lives entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    state: Mutex<State>,
    fail_next_upload: AtomicBool,
    fail_next_activate: AtomicBool,
    upload_count: AtomicUsize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload fail with a transfer error
    pub fn fail_next_upload(&self) {
        self.fail_next_upload.store(true, Ordering::SeqCst);
    }

    /// Make the next activate or rollback fail with a destination error
    pub fn fail_next_activate(&self) {
        self.fail_next_activate.store(true, Ordering::SeqCst);
    }

    /// Deploy currently pointed at by a target, if any
    pub fn current(&self, target: ReleaseTarget) -> Option<DeployId> {
        self.state.lock().unwrap().pointers.get(&target).cloned()
    }

    /// Number of uploads that ran to completion
    pub fn upload_count(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }

    fn switch_pointer(
        &self,
        deploy_id: &DeployId,
        target: ReleaseTarget,
    ) -> Result<(), AdapterError> {
        if self.fail_next_activate.swap(false, Ordering::SeqCst) {
            return Err(AdapterError::Destination {
                message: "injected activation failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        if !state.releases.contains_key(deploy_id) {
            return Err(AdapterError::ReleaseNotFound {
                deploy: deploy_id.clone(),
            });
        }
        state.pointers.insert(target, deploy_id.clone());
        Ok(())
    }
}

impl DestinationAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn validate_config(&self, _config: &AdapterConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    fn upload(
        &self,
        ctx: &AdapterContext,
        req: &UploadRequest<'_>,
    ) -> Result<UploadReceipt, AdapterError> {
        if ctx.cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        if self.fail_next_upload.swap(false, Ordering::SeqCst) {
            return Err(AdapterError::Transfer {
                message: "injected transfer failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.releases.insert(
            req.deploy_id.clone(),
            StoredRelease {
                uploaded_at: Utc::now(),
            },
        );
        self.upload_count.fetch_add(1, Ordering::SeqCst);

        Ok(UploadReceipt {
            destination_ref: Some(format!("memory://{}", req.deploy_id)),
            platform_deployment_id: Some(format!("mem-{}", req.deploy_id)),
            preview_url: None,
        })
    }

    fn activate(
        &self,
        _ctx: &AdapterContext,
        req: &ActivateRequest<'_>,
    ) -> Result<(), AdapterError> {
        self.switch_pointer(req.deploy_id, req.target)
    }

    fn rollback(
        &self,
        _ctx: &AdapterContext,
        req: &RollbackRequest<'_>,
    ) -> Result<(), AdapterError> {
        self.switch_pointer(req.to_deploy_id, req.target)
    }

    fn list_releases(
        &self,
        _ctx: &AdapterContext,
        _config: &AdapterConfig,
    ) -> Result<Vec<ReleaseInfo>, AdapterError> {
        let state = self.state.lock().unwrap();
        let mut releases: Vec<_> = state
            .releases
            .iter()
            .map(|(id, stored)| ReleaseInfo {
                deploy_id: id.clone(),
                uploaded_at: Some(stored.uploaded_at),
            })
            .collect();
        releases.sort_by_key(|r| r.uploaded_at);
        Ok(releases)
    }

    fn cleanup_old(
        &self,
        _ctx: &AdapterContext,
        _config: &AdapterConfig,
        keep: usize,
    ) -> Result<CleanupReport, AdapterError> {
        let mut state = self.state.lock().unwrap();
        let pointed: Vec<DeployId> = state.pointers.values().cloned().collect();

        let mut removable: Vec<(DeployId, DateTime<Utc>)> = state
            .releases
            .iter()
            .filter(|(id, _)| !pointed.contains(id))
            .map(|(id, stored)| (id.clone(), stored.uploaded_at))
            .collect();
        removable.sort_by_key(|(_, at)| *at);

        let total = state.releases.len();
        if removable.len() <= keep {
            return Ok(CleanupReport {
                removed: Vec::new(),
                kept: total,
            });
        }

        let excess = removable.len() - keep;
        let mut removed = Vec::new();
        for (id, _) in removable.into_iter().take(excess) {
            state.releases.remove(&id);
            removed.push(id);
        }

        Ok(CleanupReport {
            kept: total - removed.len(),
            removed,
        })
    }

    fn supports_cleanup(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::FileIndex;
    use crate::domain::ports::SiteSummary;
    use crate::domain::value_objects::SiteId;
    use std::path::PathBuf;

    fn ctx() -> AdapterContext {
        AdapterContext::new(SiteSummary {
            id: SiteId::new("site-1").unwrap(),
            name: "docs".to_string(),
        })
    }

    fn upload(adapter: &MemoryAdapter, id: &str) -> DeployId {
        let deploy_id = DeployId::new(id).unwrap();
        let index = FileIndex::new();
        adapter
            .upload(
                &ctx(),
                &UploadRequest {
                    deploy_id: &deploy_id,
                    files_dir: PathBuf::from("/nonexistent"),
                    index: &index,
                    config: &AdapterConfig::default(),
                },
            )
            .unwrap();
        deploy_id
    }

    #[test]
    fn activate_requires_prior_upload() {
        let adapter = MemoryAdapter::new();
        let ghost = DeployId::new("ghost").unwrap();
        let result = adapter.activate(
            &ctx(),
            &ActivateRequest {
                deploy_id: &ghost,
                target: ReleaseTarget::Production,
                config: &AdapterConfig::default(),
                platform_deployment_id: None,
            },
        );
        assert!(matches!(result, Err(AdapterError::ReleaseNotFound { .. })));
    }

    #[test]
    fn activate_switches_pointer() {
        let adapter = MemoryAdapter::new();
        let deploy_id = upload(&adapter, "d0");
        adapter
            .activate(
                &ctx(),
                &ActivateRequest {
                    deploy_id: &deploy_id,
                    target: ReleaseTarget::Production,
                    config: &AdapterConfig::default(),
                    platform_deployment_id: None,
                },
            )
            .unwrap();
        assert_eq!(adapter.current(ReleaseTarget::Production), Some(deploy_id));
        assert_eq!(adapter.current(ReleaseTarget::Preview), None);
    }

    #[test]
    fn injected_activation_failure_fires_once() {
        let adapter = MemoryAdapter::new();
        let deploy_id = upload(&adapter, "d0");
        adapter.fail_next_activate();

        let request = ActivateRequest {
            deploy_id: &deploy_id,
            target: ReleaseTarget::Production,
            config: &AdapterConfig::default(),
            platform_deployment_id: None,
        };
        assert!(adapter.activate(&ctx(), &request).is_err());
        assert_eq!(adapter.current(ReleaseTarget::Production), None);
        assert!(adapter.activate(&ctx(), &request).is_ok());
    }

    #[test]
    fn cleanup_keeps_pointed_and_newest() {
        let adapter = MemoryAdapter::new();
        let d0 = upload(&adapter, "d0");
        upload(&adapter, "d1");
        upload(&adapter, "d2");
        adapter
            .activate(
                &ctx(),
                &ActivateRequest {
                    deploy_id: &d0,
                    target: ReleaseTarget::Production,
                    config: &AdapterConfig::default(),
                    platform_deployment_id: None,
                },
            )
            .unwrap();

        let report = adapter
            .cleanup_old(&ctx(), &AdapterConfig::default(), 1)
            .unwrap();
        assert_eq!(report.removed, vec![DeployId::new("d1").unwrap()]);
        assert_eq!(report.kept, 2);
    }
}
