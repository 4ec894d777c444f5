//! Domain Value Objects
//!
//! Validated, immutable types used throughout the engine.

pub mod fingerprint;
pub mod ids;
pub mod site_path;
pub mod target;

pub use fingerprint::Fingerprint;
pub use ids::{DeployId, IdError, SiteId};
pub use site_path::{PathError, SitePath};
pub use target::ReleaseTarget;
