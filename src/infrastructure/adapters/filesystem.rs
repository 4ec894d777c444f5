//! Filesystem destination adapter
//!
//! Serves a site out of a local directory tree:
//!
//! ```text
//! <root>/releases/<deploy_id>/...   uploaded content, never served directly
//! <root>/current-<target>.json      pointer to the live release
//! ```
//!
//! Uploads stage into the unreferenced release slot; nothing is visible
//! until `activate` publishes the pointer. The pointer is written to a
//! temp file in the same directory and renamed into place, under an
//! advisory lock, so a crash mid-activation leaves either the old or the
//! new pointer - never a mix. Re-uploading a file whose fingerprint
//! already matches the slot is a skip, which makes upload retries
//! idempotent.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::ports::{
    ActivateRequest, AdapterConfig, AdapterContext, AdapterError, CleanupReport, ConfigError,
    DestinationAdapter, ReleaseInfo, RollbackRequest, UploadReceipt, UploadRequest,
};
use crate::domain::value_objects::{DeployId, Fingerprint, ReleaseTarget};

/// Content of a `current-<target>.json` pointer file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointerFile {
    deploy_id: DeployId,
    activated_at: DateTime<Utc>,
}

/// Local directory destination
#[derive(Debug, Default)]
pub struct FilesystemAdapter;

impl FilesystemAdapter {
    pub fn new() -> Self {
        Self
    }

    fn root(config: &AdapterConfig) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from(config.require_str("root")?))
    }

    fn release_dir(root: &Path, deploy_id: &DeployId) -> PathBuf {
        root.join("releases").join(deploy_id.as_str())
    }

    fn pointer_path(root: &Path, target: ReleaseTarget) -> PathBuf {
        root.join(format!("current-{}.json", target))
    }

    /// Read the live pointer for a target, if one has been published
    pub fn read_pointer(
        root: &Path,
        target: ReleaseTarget,
    ) -> Result<Option<DeployId>, AdapterError> {
        let path = Self::pointer_path(root, target);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let pointer: PointerFile =
                    serde_json::from_str(&content).map_err(|e| AdapterError::Destination {
                        message: format!("corrupt pointer file {}: {}", path.display(), e),
                    })?;
                Ok(Some(pointer.deploy_id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdapterError::Io(e)),
        }
    }

    /// Publish the pointer atomically: temp file in the same directory,
    /// then rename over the old pointer, all under the destination lock.
    fn write_pointer(
        root: &Path,
        target: ReleaseTarget,
        deploy_id: &DeployId,
    ) -> Result<(), AdapterError> {
        let _lock = DestinationLock::acquire(root)?;

        let pointer = PointerFile {
            deploy_id: deploy_id.clone(),
            activated_at: Utc::now(),
        };
        let content =
            serde_json::to_string_pretty(&pointer).map_err(|e| AdapterError::Destination {
                message: format!("failed to encode pointer: {}", e),
            })?;

        let mut temp = tempfile::NamedTempFile::new_in(root)?;
        use std::io::Write;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(Self::pointer_path(root, target))
            .map_err(|e| AdapterError::Io(e.error))?;
        Ok(())
    }

    /// Deploy ids referenced by any published pointer
    fn pointed_deploys(root: &Path) -> Result<Vec<DeployId>, AdapterError> {
        let mut pointed = Vec::new();
        for target in ReleaseTarget::all() {
            if let Some(id) = Self::read_pointer(root, target)? {
                pointed.push(id);
            }
        }
        Ok(pointed)
    }
}

/// Advisory lock over the destination root's pointer files
struct DestinationLock {
    file: fs::File,
}

impl DestinationLock {
    fn acquire(root: &Path) -> Result<Self, AdapterError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(root.join(".quay-lock"))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

impl DestinationAdapter for FilesystemAdapter {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<(), ConfigError> {
        Self::root(config).map(|_| ())
    }

    fn upload(
        &self,
        ctx: &AdapterContext,
        req: &UploadRequest<'_>,
    ) -> Result<UploadReceipt, AdapterError> {
        let root = Self::root(req.config).map_err(|e| AdapterError::Destination {
            message: e.to_string(),
        })?;
        let slot = Self::release_dir(&root, req.deploy_id);
        fs::create_dir_all(&slot)?;

        for entry in req.index.entries() {
            if ctx.cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }

            let source = req.files_dir.join(entry.path.relative());
            let dest = slot.join(entry.path.relative());

            // Same path + same content is a no-op, so retries after a
            // transient failure never re-transfer confirmed files.
            if let Ok(existing) = fs::File::open(&dest) {
                if Fingerprint::from_reader(existing)? == entry.fingerprint {
                    continue;
                }
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &dest).map_err(|e| AdapterError::Transfer {
                message: format!("copying {}: {}", source.display(), e),
            })?;
        }

        Ok(UploadReceipt {
            destination_ref: Some(format!("releases/{}", req.deploy_id)),
            platform_deployment_id: None,
            preview_url: None,
        })
    }

    fn activate(
        &self,
        _ctx: &AdapterContext,
        req: &ActivateRequest<'_>,
    ) -> Result<(), AdapterError> {
        let root = Self::root(req.config).map_err(|e| AdapterError::Destination {
            message: e.to_string(),
        })?;
        let slot = Self::release_dir(&root, req.deploy_id);
        if !slot.is_dir() {
            return Err(AdapterError::ReleaseNotFound {
                deploy: req.deploy_id.clone(),
            });
        }
        Self::write_pointer(&root, req.target, req.deploy_id)
    }

    fn rollback(
        &self,
        _ctx: &AdapterContext,
        req: &RollbackRequest<'_>,
    ) -> Result<(), AdapterError> {
        let root = Self::root(req.config).map_err(|e| AdapterError::Destination {
            message: e.to_string(),
        })?;
        let slot = Self::release_dir(&root, req.to_deploy_id);
        if !slot.is_dir() {
            return Err(AdapterError::ReleaseNotFound {
                deploy: req.to_deploy_id.clone(),
            });
        }
        Self::write_pointer(&root, req.target, req.to_deploy_id)
    }

    fn list_releases(
        &self,
        _ctx: &AdapterContext,
        config: &AdapterConfig,
    ) -> Result<Vec<ReleaseInfo>, AdapterError> {
        let root = Self::root(config).map_err(|e| AdapterError::Destination {
            message: e.to_string(),
        })?;
        let releases_dir = root.join("releases");
        if !releases_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut releases = Vec::new();
        for entry in fs::read_dir(&releases_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(deploy_id) = DeployId::new(entry.file_name().to_string_lossy().as_ref()) else {
                continue;
            };
            let uploaded_at = entry
                .metadata()?
                .modified()
                .ok()
                .map(DateTime::<Utc>::from);
            releases.push(ReleaseInfo {
                deploy_id,
                uploaded_at,
            });
        }
        // Oldest first, so retention can drop from the front.
        releases.sort_by_key(|r| r.uploaded_at);
        Ok(releases)
    }

    fn cleanup_old(
        &self,
        ctx: &AdapterContext,
        config: &AdapterConfig,
        keep: usize,
    ) -> Result<CleanupReport, AdapterError> {
        let root = Self::root(config).map_err(|e| AdapterError::Destination {
            message: e.to_string(),
        })?;
        let releases = self.list_releases(ctx, config)?;
        let pointed = Self::pointed_deploys(&root)?;

        let removable: Vec<_> = releases
            .iter()
            .filter(|r| !pointed.contains(&r.deploy_id))
            .collect();
        if removable.len() <= keep {
            return Ok(CleanupReport {
                removed: Vec::new(),
                kept: releases.len(),
            });
        }

        let mut removed = Vec::new();
        let excess = removable.len() - keep;
        for release in removable.into_iter().take(excess) {
            fs::remove_dir_all(Self::release_dir(&root, &release.deploy_id))?;
            removed.push(release.deploy_id.clone());
        }

        Ok(CleanupReport {
            kept: releases.len() - removed.len(),
            removed,
        })
    }

    fn supports_cleanup(&self) -> bool {
        true
    }
}
