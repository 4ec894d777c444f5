//! Patch overlay resolution integration tests
//!
//! Builds patch chains through the engine and checks per-path resolution,
//! chain flattening and the depth limit.

use std::sync::Arc;

use quay::domain::services::Resolution;
use quay::infrastructure::adapters::MemoryAdapter;
use quay::infrastructure::repositories::{InMemoryDeployRepository, InMemorySiteRepository};
use quay::{
    AdapterRegistry, DeployId, EngineError, FileIndex, FileIndexEntry, Fingerprint, PatchManifest,
    ReleaseEngine, ReleasePolicy, Site, SiteId, SitePath, StageRequest,
};

type Engine = ReleaseEngine<InMemorySiteRepository, InMemoryDeployRepository, AdapterRegistry>;

fn site_id() -> SiteId {
    SiteId::new("docs").unwrap()
}

fn deploy_id(id: &str) -> DeployId {
    DeployId::new(id).unwrap()
}

fn path(p: &str) -> SitePath {
    SitePath::parse(p).unwrap()
}

fn index_of(files: &[(&str, &str)]) -> FileIndex {
    FileIndex::from_entries(files.iter().map(|(p, content)| {
        FileIndexEntry::new(
            path(p),
            content.len() as u64,
            Fingerprint::from_bytes(content.as_bytes()),
        )
    }))
    .unwrap()
}

fn engine() -> Engine {
    let sites = InMemorySiteRepository::new();
    use quay::domain::ports::SiteRepository;
    sites.save(&Site::new(site_id(), "docs", "org-1")).unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register_builtin(Arc::new(MemoryAdapter::new()));
    ReleaseEngine::new(sites, InMemoryDeployRepository::new(), registry)
}

fn stage_base(engine: &Engine, id: &str, files: &[(&str, &str)]) {
    engine
        .stage(StageRequest {
            deploy_id: deploy_id(id),
            site_id: site_id(),
            adapter: "memory".to_string(),
            index: index_of(files),
            patch: None,
        })
        .unwrap();
}

fn stage_patch(
    engine: &Engine,
    id: &str,
    base: &str,
    overrides: &[(&str, &str)],
    deletes: &[&str],
) {
    let mut manifest = PatchManifest::new(deploy_id(base));
    for (p, _) in overrides {
        manifest = manifest.with_override(path(p));
    }
    for p in deletes {
        manifest = manifest.with_delete(path(p));
    }
    engine
        .stage(StageRequest {
            deploy_id: deploy_id(id),
            site_id: site_id(),
            adapter: "memory".to_string(),
            index: index_of(overrides),
            patch: Some(manifest),
        })
        .unwrap();
}

fn served_by(engine: &Engine, head: &str, p: &str) -> Option<DeployId> {
    match engine.resolve_path(&deploy_id(head), &path(p)).unwrap() {
        Resolution::Served { deploy_id, .. } => Some(deploy_id),
        Resolution::NotFound => None,
    }
}

#[test]
fn patch_overrides_and_deletes_take_precedence() {
    let engine = engine();
    stage_base(
        &engine,
        "base",
        &[("/index.html", "v1"), ("/style.css", "c1"), ("/old.txt", "x")],
    );
    stage_patch(
        &engine,
        "patch",
        "base",
        &[("/index.html", "v2")],
        &["/old.txt"],
    );

    // Overridden path is served by the patch itself.
    assert_eq!(served_by(&engine, "patch", "/index.html"), Some(deploy_id("patch")));
    // Untouched path falls through to the base.
    assert_eq!(served_by(&engine, "patch", "/style.css"), Some(deploy_id("base")));
    // Deleted path is gone even though the base still has it.
    assert_eq!(served_by(&engine, "patch", "/old.txt"), None);
    // Unknown path is not found anywhere.
    assert_eq!(served_by(&engine, "patch", "/missing.txt"), None);
}

#[test]
fn newest_layer_wins_in_stacked_patches() {
    let engine = engine();
    stage_base(&engine, "base", &[("/a.txt", "base-a"), ("/b.txt", "base-b")]);
    stage_patch(&engine, "p1", "base", &[("/a.txt", "p1-a")], &["/b.txt"]);
    // p2 resurrects /b.txt and leaves /a.txt to p1.
    stage_patch(&engine, "p2", "p1", &[("/b.txt", "p2-b")], &[]);

    assert_eq!(served_by(&engine, "p2", "/a.txt"), Some(deploy_id("p1")));
    assert_eq!(served_by(&engine, "p2", "/b.txt"), Some(deploy_id("p2")));

    // Resolution through p1 alone still sees the delete.
    assert_eq!(served_by(&engine, "p1", "/b.txt"), None);
}

#[test]
fn delete_dominates_older_override() {
    let engine = engine();
    stage_base(&engine, "base", &[("/a.txt", "base-a")]);
    stage_patch(&engine, "p1", "base", &[("/a.txt", "p1-a")], &[]);
    stage_patch(&engine, "p2", "p1", &[], &["/a.txt"]);

    assert_eq!(served_by(&engine, "p2", "/a.txt"), None);
}

#[test]
fn materialized_chain_matches_lazy_resolution() {
    let engine = engine();
    stage_base(
        &engine,
        "base",
        &[("/a.txt", "base-a"), ("/b.txt", "base-b"), ("/c.txt", "base-c")],
    );
    stage_patch(&engine, "p1", "base", &[("/b.txt", "p1-b")], &["/c.txt"]);
    stage_patch(&engine, "p2", "p1", &[("/d.txt", "p2-d")], &["/a.txt"]);

    let chain = engine.overlay_chain(&deploy_id("p2")).unwrap();
    let flat = chain.materialize();

    for p in chain.mentioned_paths() {
        let lazy = chain.effective_fingerprint(&p);
        let eager = flat.get(&p).map(|e| e.fingerprint.clone());
        assert_eq!(lazy, eager, "divergence at {}", p);
    }
    assert_eq!(flat.len(), 2); // /b.txt and /d.txt survive
}

#[test]
fn flatten_produces_equivalent_base_deploy() {
    let engine = engine();
    stage_base(&engine, "base", &[("/a.txt", "v1"), ("/b.txt", "v1")]);
    stage_patch(&engine, "p1", "base", &[("/a.txt", "v2")], &["/b.txt"]);

    let flattened = engine
        .flatten(&deploy_id("p1"), deploy_id("flat"))
        .unwrap();
    assert!(!flattened.is_patch());

    // The flattened deploy resolves every path on its own.
    let chain = engine.overlay_chain(&deploy_id("flat")).unwrap();
    assert_eq!(chain.depth(), 1);
    assert_eq!(served_by(&engine, "flat", "/a.txt"), Some(deploy_id("flat")));
    assert_eq!(served_by(&engine, "flat", "/b.txt"), None);
    assert_eq!(
        chain.effective_fingerprint(&path("/a.txt")),
        Some(Fingerprint::from_bytes(b"v2"))
    );
}

#[test]
fn patch_chain_depth_is_bounded_by_policy() {
    let sites = InMemorySiteRepository::new();
    use quay::domain::ports::SiteRepository;
    sites.save(&Site::new(site_id(), "docs", "org-1")).unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register_builtin(Arc::new(MemoryAdapter::new()));
    let engine = ReleaseEngine::new(sites, InMemoryDeployRepository::new(), registry).with_policy(
        ReleasePolicy {
            max_patch_depth: Some(2),
            ..ReleasePolicy::default()
        },
    );

    stage_base(&engine, "base", &[("/a.txt", "v1")]);
    stage_patch(&engine, "p1", "base", &[("/a.txt", "v2")], &[]);

    // base + p1 + p2 would be depth 3, over the limit of 2.
    let result = engine.stage(StageRequest {
        deploy_id: deploy_id("p2"),
        site_id: site_id(),
        adapter: "memory".to_string(),
        index: index_of(&[("/a.txt", "v3")]),
        patch: Some(PatchManifest::new(deploy_id("p1")).with_override(path("/a.txt"))),
    });
    assert!(matches!(result, Err(EngineError::PatchResolution(_))));
}

#[test]
fn patch_with_missing_base_is_rejected() {
    let engine = engine();
    let result = engine.stage(StageRequest {
        deploy_id: deploy_id("patch"),
        site_id: site_id(),
        adapter: "memory".to_string(),
        index: index_of(&[]),
        patch: Some(PatchManifest::new(deploy_id("ghost"))),
    });
    assert!(matches!(result, Err(EngineError::PatchResolution(_))));
}

#[test]
fn override_delete_conflict_is_rejected() {
    let engine = engine();
    stage_base(&engine, "base", &[("/a.txt", "v1")]);

    let result = engine.stage(StageRequest {
        deploy_id: deploy_id("patch"),
        site_id: site_id(),
        adapter: "memory".to_string(),
        index: index_of(&[("/a.txt", "v2")]),
        patch: Some(
            PatchManifest::new(deploy_id("base"))
                .with_override(path("/a.txt"))
                .with_delete(path("/a.txt")),
        ),
    });
    assert!(matches!(result, Err(EngineError::PatchResolution(_))));
}
