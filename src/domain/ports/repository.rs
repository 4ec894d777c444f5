//! Repository Ports
//!
//! Storage-technology-agnostic persistence for sites, deploys and release
//! records. Required lookups: by id, and by (site, target) for history.

use crate::domain::entities::{Deploy, Release, Site};
use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

/// Error from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence for sites
pub trait SiteRepository: Send + Sync {
    fn get(&self, id: &SiteId) -> Result<Option<Site>, RepositoryError>;
    fn save(&self, site: &Site) -> Result<(), RepositoryError>;
}

/// Persistence for deploys and the release log
pub trait DeployRepository: Send + Sync {
    fn get(&self, id: &DeployId) -> Result<Option<Deploy>, RepositoryError>;
    fn save(&self, deploy: &Deploy) -> Result<(), RepositoryError>;

    /// All deploys belonging to a site, newest first
    fn list_for_site(&self, site: &SiteId) -> Result<Vec<Deploy>, RepositoryError>;

    /// Append one release record to the audit log
    fn append_release(&self, release: &Release) -> Result<(), RepositoryError>;

    /// Release history for one (site, target), oldest first
    fn releases_for(
        &self,
        site: &SiteId,
        target: ReleaseTarget,
    ) -> Result<Vec<Release>, RepositoryError>;
}
