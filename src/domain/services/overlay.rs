//! Patch overlay resolver
//!
//! Given a patch chain `D_n -> D_{n-1} -> ... -> D_0` and a requested
//! path, decides which deploy's file index answers it. Walking from the
//! most recent patch toward the base:
//!
//! 1. a path in a layer's `deletes` is NotFound, terminal - deeper layers
//!    are never consulted;
//! 2. a path in a layer's `overrides` is served by that layer's own index;
//! 3. otherwise the walk continues, ending at the base deploy's index.
//!
//! Resolution is a pure function of `(chain, path)`: safe to compute per
//! request, and `materialize` (the eager merged index) gives identical
//! answers to per-path `resolve`.

use std::collections::HashSet;

use crate::domain::entities::{Deploy, FileIndex, FileIndexEntry, IndexError};
use crate::domain::value_objects::{DeployId, Fingerprint, SitePath};

/// Error building or validating a patch chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchResolutionError {
    /// A base id equals one of its own ancestors
    #[error("patch chain contains a cycle through deploy '{deploy}'")]
    CycleDetected { deploy: DeployId },

    /// A path appears in both `overrides` and `deletes` of one deploy
    #[error("path '{path}' is listed in both overrides and deletes of deploy '{deploy}'")]
    OverrideDeleteConflict { deploy: DeployId, path: SitePath },

    /// An override path has no entry in the patch's own file index
    #[error("override path '{path}' has no file index entry in deploy '{deploy}'")]
    OverrideWithoutEntry { deploy: DeployId, path: SitePath },

    /// The referenced base deploy does not exist
    #[error("base deploy '{deploy}' not found")]
    MissingBase { deploy: DeployId },

    /// Chain exceeds the configured maximum depth
    #[error("patch chain is {depth} layers deep, maximum is {max}")]
    ChainTooDeep { depth: usize, max: usize },
}

/// Per-path answer from overlay resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Served by a specific deploy's file index entry
    Served {
        deploy_id: DeployId,
        entry: FileIndexEntry,
    },
    /// No layer answers the path (or a delete removed it)
    NotFound,
}

impl Resolution {
    pub fn serving_deploy(&self) -> Option<&DeployId> {
        match self {
            Resolution::Served { deploy_id, .. } => Some(deploy_id),
            Resolution::NotFound => None,
        }
    }
}

/// Lookup used to follow base references while building a chain
pub trait DeployLookup {
    fn lookup(&self, id: &DeployId) -> Option<Deploy>;
}

impl<F> DeployLookup for F
where
    F: Fn(&DeployId) -> Option<Deploy>,
{
    fn lookup(&self, id: &DeployId) -> Option<Deploy> {
        self(id)
    }
}

/// Validate a patch deploy's manifest at creation time
///
/// Rejects override/delete conflicts and override paths missing from the
/// patch's own index; an ambiguous manifest must never reach serve-time.
pub fn validate_patch(deploy: &Deploy) -> Result<(), PatchResolutionError> {
    let Some(manifest) = deploy.patch() else {
        return Ok(());
    };

    if let Some(path) = manifest.conflicting_paths().next() {
        return Err(PatchResolutionError::OverrideDeleteConflict {
            deploy: deploy.id().clone(),
            path: path.clone(),
        });
    }

    for path in &manifest.overrides {
        if !deploy.index().contains(path) {
            return Err(PatchResolutionError::OverrideWithoutEntry {
                deploy: deploy.id().clone(),
                path: path.clone(),
            });
        }
    }

    Ok(())
}

/// A verified patch chain, most recent layer first, base last
///
/// Building the chain performs cycle detection and manifest validation up
/// front, so resolution itself cannot fail.
#[derive(Debug, Clone)]
pub struct OverlayChain {
    /// Layers newest-first; the last element is the non-patch base
    layers: Vec<Deploy>,
}

impl OverlayChain {
    /// Follow base references from `head` down to the non-patch base.
    ///
    /// `max_depth` bounds the number of layers when set (`None` preserves
    /// the source's unbounded-chain behavior).
    pub fn build(
        head: &DeployId,
        lookup: &impl DeployLookup,
        max_depth: Option<usize>,
    ) -> Result<Self, PatchResolutionError> {
        let mut layers = Vec::new();
        let mut seen: HashSet<DeployId> = HashSet::new();
        let mut current = head.clone();

        loop {
            if !seen.insert(current.clone()) {
                return Err(PatchResolutionError::CycleDetected { deploy: current });
            }

            let deploy = lookup
                .lookup(&current)
                .ok_or_else(|| PatchResolutionError::MissingBase {
                    deploy: current.clone(),
                })?;
            validate_patch(&deploy)?;

            if let Some(max) = max_depth {
                if layers.len() >= max {
                    return Err(PatchResolutionError::ChainTooDeep {
                        depth: layers.len() + 1,
                        max,
                    });
                }
            }

            let next = deploy.patch().map(|m| m.base_deploy_id.clone());
            layers.push(deploy);

            match next {
                Some(base) => current = base,
                None => break,
            }
        }

        Ok(Self { layers })
    }

    /// Number of layers, base included
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// The deploy at the head of the chain
    pub fn head(&self) -> &Deploy {
        &self.layers[0]
    }

    /// The non-patch base deploy
    pub fn base(&self) -> &Deploy {
        &self.layers[self.layers.len() - 1]
    }

    /// Layers newest-first
    pub fn layers(&self) -> &[Deploy] {
        &self.layers
    }

    /// Resolve one path lazily (per-request)
    pub fn resolve(&self, path: &SitePath) -> Resolution {
        for (i, layer) in self.layers.iter().enumerate() {
            let is_base = i == self.layers.len() - 1;
            if let Some(manifest) = layer.patch() {
                if manifest.deletes.contains(path) {
                    return Resolution::NotFound;
                }
                if manifest.overrides.contains(path) {
                    // validate_patch guaranteed the entry exists
                    let entry = layer
                        .index()
                        .get(path)
                        .expect("override path validated against index")
                        .clone();
                    return Resolution::Served {
                        deploy_id: layer.id().clone(),
                        entry,
                    };
                }
            } else if is_base {
                return match layer.index().get(path) {
                    Some(entry) => Resolution::Served {
                        deploy_id: layer.id().clone(),
                        entry: entry.clone(),
                    },
                    None => Resolution::NotFound,
                };
            }
        }
        Resolution::NotFound
    }

    /// Effective fingerprint for a path, if served
    pub fn effective_fingerprint(&self, path: &SitePath) -> Option<Fingerprint> {
        match self.resolve(path) {
            Resolution::Served { entry, .. } => Some(entry.fingerprint),
            Resolution::NotFound => None,
        }
    }

    /// Materialize the merged effective index eagerly.
    ///
    /// Walks base-first and applies each patch layer's deletes then
    /// overrides on top, which yields the same winner per path as the
    /// newest-first lazy walk.
    pub fn materialize(&self) -> FileIndex {
        let mut merged: std::collections::BTreeMap<SitePath, FileIndexEntry> = self
            .base()
            .index()
            .entries()
            .map(|e| (e.path.clone(), e.clone()))
            .collect();

        for layer in self.layers.iter().rev() {
            let Some(manifest) = layer.patch() else {
                continue;
            };
            for path in &manifest.deletes {
                merged.remove(path);
            }
            for path in &manifest.overrides {
                if let Some(entry) = layer.index().get(path) {
                    merged.insert(path.clone(), entry.clone());
                }
            }
        }

        FileIndex::from_entries(merged.into_values())
            .unwrap_or_else(|e: IndexError| unreachable!("merged map has unique paths: {e}"))
    }

    /// All paths mentioned anywhere in the chain (indexes and deletes)
    pub fn mentioned_paths(&self) -> impl Iterator<Item = SitePath> {
        let mut paths: HashSet<SitePath> = HashSet::new();
        for layer in &self.layers {
            paths.extend(layer.index().paths().cloned());
            if let Some(manifest) = layer.patch() {
                paths.extend(manifest.deletes.iter().cloned());
                paths.extend(manifest.overrides.iter().cloned());
            }
        }
        paths.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PatchManifest;
    use crate::domain::value_objects::SiteId;
    use std::collections::HashMap;

    fn path(p: &str) -> SitePath {
        SitePath::parse(p).unwrap()
    }

    fn entry(p: &str, content: &[u8]) -> FileIndexEntry {
        FileIndexEntry::new(path(p), content.len() as u64, Fingerprint::from_bytes(content))
    }

    fn base_deploy(id: &str, files: &[(&str, &[u8])]) -> Deploy {
        let index =
            FileIndex::from_entries(files.iter().map(|(p, c)| entry(p, c))).unwrap();
        Deploy::new(
            DeployId::new(id).unwrap(),
            SiteId::new("site-1").unwrap(),
            "memory",
            index,
        )
    }

    fn patch_deploy(
        id: &str,
        base: &str,
        overrides: &[(&str, &[u8])],
        deletes: &[&str],
    ) -> Deploy {
        let index =
            FileIndex::from_entries(overrides.iter().map(|(p, c)| entry(p, c))).unwrap();
        let mut manifest = PatchManifest::new(DeployId::new(base).unwrap());
        for (p, _) in overrides {
            manifest = manifest.with_override(path(p));
        }
        for p in deletes {
            manifest = manifest.with_delete(path(p));
        }
        Deploy::new(
            DeployId::new(id).unwrap(),
            SiteId::new("site-1").unwrap(),
            "memory",
            index,
        )
        .with_patch(manifest)
    }

    struct MapLookup(HashMap<DeployId, Deploy>);

    impl MapLookup {
        fn of(deploys: Vec<Deploy>) -> Self {
            Self(
                deploys
                    .into_iter()
                    .map(|d| (d.id().clone(), d))
                    .collect(),
            )
        }
    }

    impl DeployLookup for MapLookup {
        fn lookup(&self, id: &DeployId) -> Option<Deploy> {
            self.0.get(id).cloned()
        }
    }

    fn chain(head: &str, deploys: Vec<Deploy>) -> OverlayChain {
        OverlayChain::build(
            &DeployId::new(head).unwrap(),
            &MapLookup::of(deploys),
            None,
        )
        .unwrap()
    }

    #[test]
    fn override_served_by_patch_rest_by_base() {
        let d0 = base_deploy("d0", &[("/index.html", b"home"), ("/app.js", b"v1")]);
        let d1 = patch_deploy("d1", "d0", &[("/app.js", b"v2")], &[]);
        let chain = chain("d1", vec![d0, d1]);

        let index_html = chain.resolve(&path("/index.html"));
        assert_eq!(index_html.serving_deploy().unwrap().as_str(), "d0");

        let app_js = chain.resolve(&path("/app.js"));
        assert_eq!(app_js.serving_deploy().unwrap().as_str(), "d1");
    }

    #[test]
    fn delete_dominates_override_deeper_in_chain() {
        let d0 = base_deploy("d0", &[("/index.html", b"home"), ("/app.js", b"v1")]);
        let d1 = patch_deploy("d1", "d0", &[("/app.js", b"v2")], &[]);
        let d2 = patch_deploy("d2", "d1", &[], &["/app.js"]);
        let chain = chain("d2", vec![d0, d1, d2]);

        assert_eq!(chain.resolve(&path("/app.js")), Resolution::NotFound);
        // Unrelated paths still fall through to the base.
        assert!(chain.resolve(&path("/index.html")).serving_deploy().is_some());
    }

    #[test]
    fn unknown_path_is_not_found() {
        let d0 = base_deploy("d0", &[("/index.html", b"home")]);
        let chain = chain("d0", vec![d0]);
        assert_eq!(chain.resolve(&path("/missing.txt")), Resolution::NotFound);
    }

    #[test]
    fn resolution_is_deterministic() {
        let d0 = base_deploy("d0", &[("/a", b"1"), ("/b", b"2")]);
        let d1 = patch_deploy("d1", "d0", &[("/a", b"3")], &["/b"]);
        let chain = chain("d1", vec![d0, d1]);

        for p in ["/a", "/b", "/c"] {
            let first = chain.resolve(&path(p));
            let second = chain.resolve(&path(p));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn materialize_agrees_with_lazy_resolution() {
        let d0 = base_deploy("d0", &[("/a", b"1"), ("/b", b"2"), ("/c", b"3")]);
        let d1 = patch_deploy("d1", "d0", &[("/a", b"1b"), ("/d", b"4")], &["/b"]);
        let d2 = patch_deploy("d2", "d1", &[("/c", b"3b")], &["/d"]);
        let chain = chain("d2", vec![d0, d1, d2]);

        let merged = chain.materialize();
        for p in chain.mentioned_paths() {
            match chain.resolve(&p) {
                Resolution::Served { entry, .. } => {
                    assert_eq!(merged.get(&p), Some(&entry), "path {}", p);
                }
                Resolution::NotFound => {
                    assert!(merged.get(&p).is_none(), "path {}", p);
                }
            }
        }
    }

    #[test]
    fn cycle_is_detected_before_resolution() {
        // d1 -> d2 -> d1
        let d1 = patch_deploy("d1", "d2", &[], &[]);
        let d2 = patch_deploy("d2", "d1", &[], &[]);
        let result = OverlayChain::build(
            &DeployId::new("d1").unwrap(),
            &MapLookup::of(vec![d1, d2]),
            None,
        );
        assert!(matches!(
            result,
            Err(PatchResolutionError::CycleDetected { .. })
        ));
    }

    #[test]
    fn missing_base_is_an_error() {
        let d1 = patch_deploy("d1", "ghost", &[], &[]);
        let result = OverlayChain::build(
            &DeployId::new("d1").unwrap(),
            &MapLookup::of(vec![d1]),
            None,
        );
        assert_eq!(
            result.unwrap_err(),
            PatchResolutionError::MissingBase {
                deploy: DeployId::new("ghost").unwrap()
            }
        );
    }

    #[test]
    fn override_delete_conflict_rejected() {
        let d0 = base_deploy("d0", &[("/a", b"1")]);
        let bad = patch_deploy("d1", "d0", &[("/a", b"2")], &["/a"]);
        let result = OverlayChain::build(
            &DeployId::new("d1").unwrap(),
            &MapLookup::of(vec![d0, bad]),
            None,
        );
        assert!(matches!(
            result,
            Err(PatchResolutionError::OverrideDeleteConflict { .. })
        ));
    }

    #[test]
    fn override_without_index_entry_rejected() {
        let d0 = base_deploy("d0", &[("/a", b"1")]);
        // Manifest lists /b as an override but the patch index has no /b.
        let mut bad = base_deploy("d1", &[]);
        bad = bad.with_patch(
            PatchManifest::new(DeployId::new("d0").unwrap()).with_override(path("/b")),
        );
        let result = OverlayChain::build(
            &DeployId::new("d1").unwrap(),
            &MapLookup::of(vec![d0, bad]),
            None,
        );
        assert!(matches!(
            result,
            Err(PatchResolutionError::OverrideWithoutEntry { .. })
        ));
    }

    #[test]
    fn depth_limit_enforced() {
        let d0 = base_deploy("d0", &[]);
        let d1 = patch_deploy("d1", "d0", &[], &[]);
        let d2 = patch_deploy("d2", "d1", &[], &[]);
        let result = OverlayChain::build(
            &DeployId::new("d2").unwrap(),
            &MapLookup::of(vec![d0, d1, d2]),
            Some(2),
        );
        assert!(matches!(
            result,
            Err(PatchResolutionError::ChainTooDeep { .. })
        ));
    }
}
