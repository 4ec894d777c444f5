//! In-memory repositories
//!
//! Mutex-guarded maps behind the repository ports. The release log is an
//! append-only vector; history queries filter it in insertion order.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::entities::{Deploy, Release, Site};
use crate::domain::ports::{DeployRepository, RepositoryError, SiteRepository};
use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};

#[derive(Debug, Default)]
pub struct InMemorySiteRepository {
    sites: Mutex<HashMap<SiteId, Site>>,
}

impl InMemorySiteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SiteRepository for InMemorySiteRepository {
    fn get(&self, id: &SiteId) -> Result<Option<Site>, RepositoryError> {
        Ok(self.sites.lock().unwrap().get(id).cloned())
    }

    fn save(&self, site: &Site) -> Result<(), RepositoryError> {
        self.sites
            .lock()
            .unwrap()
            .insert(site.id().clone(), site.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeployRepository {
    deploys: Mutex<HashMap<DeployId, Deploy>>,
    releases: Mutex<Vec<Release>>,
}

impl InMemoryDeployRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeployRepository for InMemoryDeployRepository {
    fn get(&self, id: &DeployId) -> Result<Option<Deploy>, RepositoryError> {
        Ok(self.deploys.lock().unwrap().get(id).cloned())
    }

    fn save(&self, deploy: &Deploy) -> Result<(), RepositoryError> {
        self.deploys
            .lock()
            .unwrap()
            .insert(deploy.id().clone(), deploy.clone());
        Ok(())
    }

    fn list_for_site(&self, site: &SiteId) -> Result<Vec<Deploy>, RepositoryError> {
        let mut deploys: Vec<Deploy> = self
            .deploys
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.site_id() == site)
            .cloned()
            .collect();
        deploys.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(deploys)
    }

    fn append_release(&self, release: &Release) -> Result<(), RepositoryError> {
        self.releases.lock().unwrap().push(release.clone());
        Ok(())
    }

    fn releases_for(
        &self,
        site: &SiteId,
        target: ReleaseTarget,
    ) -> Result<Vec<Release>, RepositoryError> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.site_id == site && r.target == target)
            .cloned()
            .collect())
    }
}
