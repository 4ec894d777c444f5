//! Destination Adapter Port
//!
//! The uniform interface the release state machine drives for every
//! destination type. Contract:
//!
//! - `validate_config` is pure (no I/O) and runs before any network
//!   operation.
//! - `upload` stages files into a non-serving release slot keyed by deploy
//!   id (`releases/<deploy_id>/`). It must never affect what is currently
//!   served, so a partial failure leaves the live state intact and a retry
//!   is idempotent (same path + same content is a no-op).
//! - `activate` atomically switches the destination's current pointer to a
//!   previously uploaded release. Destinations without atomic rename use a
//!   two-step publish: content first, pointer last, so a crash leaves
//!   either the old or the new pointer, never a mix.
//! - `rollback` is `activate` aimed at an earlier upload; it must not
//!   re-transfer files.
//! - `list_releases`/`cleanup_old` are optional retention capabilities.
//!
//! Adapters confine side effects to the destination named in the config;
//! they never touch local release/deploy state. That bookkeeping belongs
//! to the caller after a successful call.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entities::FileIndex;
use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

/// Error when adapter configuration is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Error during destination operations
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// File transfer failed (possibly transient; safe to retry)
    #[error("transfer failed: {message}")]
    Transfer { message: String },

    /// The destination rejected or failed an operation
    #[error("destination error: {message}")]
    Destination { message: String },

    /// No uploaded release exists for the requested deploy
    #[error("no uploaded release for deploy '{deploy}' at this destination")]
    ReleaseNotFound { deploy: DeployId },

    /// Optional capability not implemented by this adapter
    #[error("operation '{operation}' is not supported by this adapter")]
    NotSupported { operation: &'static str },

    /// Upload cancelled by the caller before activation
    #[error("upload cancelled")]
    Cancelled,

    /// External command (ssh, rsync) failed
    #[error("command '{command}' failed: {detail}")]
    CommandFailed { command: String, detail: String },

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Already-validated, already-decrypted adapter configuration
///
/// Supplied by the credential collaborator as a flat JSON object. The
/// engine never persists or decrypts secrets itself.
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    values: serde_json::Map<String, serde_json::Value>,
}

impl AdapterConfig {
    pub fn new(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Build a config from string key/value pairs (convenience for tests
    /// and simple destinations)
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), serde_json::Value::String(v.into())))
            .collect();
        Self { values }
    }

    /// Get an optional string field
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_str())
    }

    /// Get a required string field
    pub fn require_str(&self, field: &str) -> Result<&str, ConfigError> {
        match self.values.get(field) {
            None => Err(ConfigError::MissingField {
                field: field.to_string(),
            }),
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s),
            Some(serde_json::Value::String(_)) => Err(ConfigError::InvalidField {
                field: field.to_string(),
                reason: "must not be empty".to_string(),
            }),
            Some(other) => Err(ConfigError::InvalidField {
                field: field.to_string(),
                reason: format!("expected a string, got {}", json_type_name(other)),
            }),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Cooperative cancellation flag for uploads
///
/// Adapters check it between files. Activation and rollback never observe
/// it: a pointer switch runs to completion or failure, never abandoned
/// mid-switch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Minimal site description passed to adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSummary {
    pub id: SiteId,
    pub name: String,
}

/// Call context shared by all adapter operations
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub site: SiteSummary,
    pub cancel: CancelFlag,
}

impl AdapterContext {
    pub fn new(site: SiteSummary) -> Self {
        Self {
            site,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Request to stage a deploy's files at the destination
#[derive(Debug)]
pub struct UploadRequest<'a> {
    pub deploy_id: &'a DeployId,
    /// Finalized local directory holding the deploy's files
    pub files_dir: PathBuf,
    pub index: &'a FileIndex,
    pub config: &'a AdapterConfig,
}

/// What the destination reported back for an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub destination_ref: Option<String>,
    pub platform_deployment_id: Option<String>,
    pub preview_url: Option<String>,
}

/// Request to switch the current pointer to an uploaded release
#[derive(Debug)]
pub struct ActivateRequest<'a> {
    pub deploy_id: &'a DeployId,
    pub target: ReleaseTarget,
    pub config: &'a AdapterConfig,
    pub platform_deployment_id: Option<&'a str>,
}

/// Request to point a target back at a previously uploaded release
#[derive(Debug)]
pub struct RollbackRequest<'a> {
    pub to_deploy_id: &'a DeployId,
    pub target: ReleaseTarget,
    pub config: &'a AdapterConfig,
    pub platform_deployment_id: Option<&'a str>,
}

/// One release slot known to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub deploy_id: DeployId,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Report from an optional retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<DeployId>,
    pub kept: usize,
}

/// Uniform destination interface
///
/// Implementations must be safe to share across threads; the engine runs
/// destination calls on worker threads with bounded per-destination
/// parallelism.
pub trait DestinationAdapter: Send + Sync {
    /// Adapter name used for registry lookup and deploy records
    fn name(&self) -> &str;

    /// Pure configuration check; runs before any network operation
    fn validate_config(&self, config: &AdapterConfig) -> Result<(), ConfigError>;

    /// Transfer files into a non-serving release slot
    fn upload(&self, ctx: &AdapterContext, req: &UploadRequest<'_>)
        -> Result<UploadReceipt, AdapterError>;

    /// Atomically switch the current pointer to an uploaded release
    fn activate(&self, ctx: &AdapterContext, req: &ActivateRequest<'_>) -> Result<(), AdapterError>;

    /// Point the target back at a previously uploaded release without
    /// re-transferring files
    fn rollback(&self, ctx: &AdapterContext, req: &RollbackRequest<'_>) -> Result<(), AdapterError>;

    /// List release slots present at the destination (optional capability)
    fn list_releases(
        &self,
        _ctx: &AdapterContext,
        _config: &AdapterConfig,
    ) -> Result<Vec<ReleaseInfo>, AdapterError> {
        Err(AdapterError::NotSupported {
            operation: "list_releases",
        })
    }

    /// Delete the oldest releases beyond `keep`, never the active one
    /// (optional capability)
    fn cleanup_old(
        &self,
        _ctx: &AdapterContext,
        _config: &AdapterConfig,
        _keep: usize,
    ) -> Result<CleanupReport, AdapterError> {
        Err(AdapterError::NotSupported {
            operation: "cleanup_old",
        })
    }

    /// Whether the optional retention capability is implemented
    fn supports_cleanup(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn DestinationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationAdapter({})", self.name())
    }
}

/// Name-keyed adapter lookup consumed by the release state machine
///
/// An unknown name is a configuration error for the caller, never a
/// crash.
pub trait AdapterCatalog: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<dyn DestinationAdapter>>;
}
