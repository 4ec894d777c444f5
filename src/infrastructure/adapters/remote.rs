//! Remote destination adapter
//!
//! Publishes to a remote host over SSH. Uploads use rsync into a
//! non-serving release directory; activation swaps a `current-<target>`
//! symlink on the remote side with `ln -sfn` followed by `mv -T`, so the
//! link flips in a single rename and a reader never sees a half-switched
//! destination.
//!
//! Layout on the remote host mirrors the filesystem adapter:
//!
//! ```text
//! <root>/releases/<deploy_id>/...
//! <root>/current-<target>      symlink to releases/<deploy_id>
//! ```

use std::process::{Command, Stdio};

use crate::domain::ports::{
    ActivateRequest, AdapterConfig, AdapterContext, AdapterError, CleanupReport, ConfigError,
    DestinationAdapter, ReleaseInfo, RollbackRequest, UploadReceipt, UploadRequest,
};
use crate::domain::value_objects::{DeployId, ReleaseTarget};

/// SSH/rsync destination
#[derive(Debug, Default)]
pub struct RemoteAdapter;

/// Parsed remote destination settings
struct RemoteSettings {
    host: String,
    root: String,
    user: Option<String>,
}

impl RemoteSettings {
    fn from_config(config: &AdapterConfig) -> Result<Self, ConfigError> {
        let host = config.require_str("host")?.to_string();
        let root = config.require_str("root")?.to_string();
        if !root.starts_with('/') {
            return Err(ConfigError::InvalidField {
                field: "root".to_string(),
                reason: "must be an absolute remote path".to_string(),
            });
        }
        Ok(Self {
            host,
            root,
            user: config.get_str("user").map(str::to_string),
        })
    }

    /// SSH destination (`user@host` or bare `host`)
    fn ssh_destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    fn release_dir(&self, deploy_id: &DeployId) -> String {
        format!("{}/releases/{}", self.root, deploy_id)
    }

    fn link_path(&self, target: ReleaseTarget) -> String {
        format!("{}/current-{}", self.root, target)
    }
}

/// Quote a value for safe use in a remote shell command
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

impl RemoteAdapter {
    pub fn new() -> Self {
        Self
    }

    fn run_ssh(&self, settings: &RemoteSettings, command: &str) -> Result<String, AdapterError> {
        let output = Command::new("ssh")
            .arg(settings.ssh_destination())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(AdapterError::CommandFailed {
                command: format!("ssh {}", settings.ssh_destination()),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Switch the `current-<target>` symlink atomically.
    ///
    /// `ln -sfn` builds the new link under a temp name and `mv -T` renames
    /// it over the old one; the old release directory stays untouched.
    fn switch_link(
        &self,
        settings: &RemoteSettings,
        deploy_id: &DeployId,
        target: ReleaseTarget,
    ) -> Result<(), AdapterError> {
        let release_dir = settings.release_dir(deploy_id);
        let link = settings.link_path(target);
        let staging_link = format!("{}.next", link);

        let script = format!(
            "test -d {dir} || exit 42; ln -sfn {dir} {staging} && mv -T {staging} {link}",
            dir = shell_quote(&release_dir),
            staging = shell_quote(&staging_link),
            link = shell_quote(&link),
        );

        match self.run_ssh(settings, &script) {
            Ok(_) => Ok(()),
            Err(AdapterError::CommandFailed { detail, .. }) if detail.is_empty() => {
                // exit 42 carries no stderr: the release slot is missing
                Err(AdapterError::ReleaseNotFound {
                    deploy: deploy_id.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

impl DestinationAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        "remote"
    }

    fn validate_config(&self, config: &AdapterConfig) -> Result<(), ConfigError> {
        RemoteSettings::from_config(config).map(|_| ())
    }

    fn upload(
        &self,
        ctx: &AdapterContext,
        req: &UploadRequest<'_>,
    ) -> Result<UploadReceipt, AdapterError> {
        if ctx.cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        let settings =
            RemoteSettings::from_config(req.config).map_err(|e| AdapterError::Destination {
                message: e.to_string(),
            })?;

        let release_dir = settings.release_dir(req.deploy_id);
        self.run_ssh(&settings, &format!("mkdir -p {}", shell_quote(&release_dir)))?;

        // Trailing slash: copy the directory's contents, not the directory.
        // Rsync's checksum-based delta makes retries idempotent on its own.
        let source = format!("{}/", req.files_dir.display());
        let dest = format!("{}:{}", settings.ssh_destination(), release_dir);

        let output = Command::new("rsync")
            .arg("-az")
            .arg("--delete")
            .arg("-e")
            .arg("ssh")
            .arg(&source)
            .arg(&dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(AdapterError::Transfer {
                message: format!(
                    "rsync to {} failed: {}",
                    dest,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(UploadReceipt {
            destination_ref: Some(dest),
            platform_deployment_id: None,
            preview_url: None,
        })
    }

    fn activate(
        &self,
        _ctx: &AdapterContext,
        req: &ActivateRequest<'_>,
    ) -> Result<(), AdapterError> {
        let settings =
            RemoteSettings::from_config(req.config).map_err(|e| AdapterError::Destination {
                message: e.to_string(),
            })?;
        self.switch_link(&settings, req.deploy_id, req.target)
    }

    fn rollback(
        &self,
        _ctx: &AdapterContext,
        req: &RollbackRequest<'_>,
    ) -> Result<(), AdapterError> {
        let settings =
            RemoteSettings::from_config(req.config).map_err(|e| AdapterError::Destination {
                message: e.to_string(),
            })?;
        self.switch_link(&settings, req.to_deploy_id, req.target)
    }

    fn list_releases(
        &self,
        _ctx: &AdapterContext,
        config: &AdapterConfig,
    ) -> Result<Vec<ReleaseInfo>, AdapterError> {
        let settings =
            RemoteSettings::from_config(config).map_err(|e| AdapterError::Destination {
                message: e.to_string(),
            })?;

        let listing = self.run_ssh(
            &settings,
            &format!(
                "ls -1t {} 2>/dev/null || true",
                shell_quote(&format!("{}/releases", settings.root))
            ),
        )?;

        // `ls -1t` is newest first; retention wants oldest first.
        let mut releases = Vec::new();
        for line in listing.lines().rev() {
            if let Ok(deploy_id) = DeployId::new(line.trim()) {
                releases.push(ReleaseInfo {
                    deploy_id,
                    uploaded_at: None,
                });
            }
        }
        Ok(releases)
    }

    fn cleanup_old(
        &self,
        ctx: &AdapterContext,
        config: &AdapterConfig,
        keep: usize,
    ) -> Result<CleanupReport, AdapterError> {
        let settings =
            RemoteSettings::from_config(config).map_err(|e| AdapterError::Destination {
                message: e.to_string(),
            })?;

        let releases = self.list_releases(ctx, config)?;

        // Resolve what the current symlinks point at so those slots survive.
        let mut pointed = Vec::new();
        for target in ReleaseTarget::all() {
            let resolved = self.run_ssh(
                &settings,
                &format!(
                    "readlink {} 2>/dev/null || true",
                    shell_quote(&settings.link_path(target))
                ),
            )?;
            if let Some(name) = resolved.rsplit('/').next() {
                if let Ok(id) = DeployId::new(name) {
                    pointed.push(id);
                }
            }
        }

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
            self.run_ssh(
                &settings,
                &format!(
                    "rm -rf {}",
                    shell_quote(&settings.release_dir(&release.deploy_id))
                ),
            )?;
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
