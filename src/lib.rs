//! Quay - release engine for static site deploys
//!
//! Quay tracks which version of a site is live on each serving target and
//! drives the upload/activate/rollback protocol uniformly across destination
//! types (local directories, remote servers, in-process destinations).
//! Incremental changes ship as patch deploys: a set of overrides and deletes
//! layered over a base deploy, resolved per path without re-uploading the
//! whole site.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-exports for convenience
pub use application::release::{ReleaseEngine, ReleasePolicy, StageOutcome, StageRequest};
pub use domain::entities::{Deploy, FileIndex, FileIndexEntry, PatchManifest, Release, Site};
pub use domain::ports::{
    AdapterConfig, AdapterContext, CancelFlag, DestinationAdapter, NoopEventSink, ReleaseEvent,
    ReleaseEventSink,
};
pub use domain::services::{OverlayChain, Resolution};
pub use domain::value_objects::{DeployId, Fingerprint, ReleaseTarget, SiteId, SitePath};
pub use error::{EngineError, EngineResult};
pub use infrastructure::adapters::{builtin_registry, AdapterRegistry};
