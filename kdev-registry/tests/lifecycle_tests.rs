//! Registry lifecycle against the in-memory engine.

use kdev_config::Distribution;
use kdev_engine::mock::MockEngine;
use kdev_engine::{
    ContainerSpec, EngineClient, EngineError, EngineHandle, EngineKind, MountKind, ResourceKind,
    VolumeMount,
};
use kdev_registry::{
    ensure, ensure_all, list_managed, teardown, teardown_all, EnsureOutcome, RegistryError,
    RegistrySpec, TeardownOutcome, DEFAULT_REGISTRY_IMAGE, REGISTRY_DATA_PATH, REGISTRY_LABEL,
};
use std::path::Path;
use std::sync::Arc;

fn setup() -> (Arc<MockEngine>, EngineHandle) {
    let engine = Arc::new(MockEngine::new());
    let handle = EngineHandle::new(engine.clone(), EngineKind::Docker, "mock");
    (engine, handle)
}

fn k3d_registry(cluster: &str) -> RegistrySpec {
    RegistrySpec::new("k3d-registry")
        .with_host_port(5001)
        .for_cluster(Distribution::K3d, cluster)
}

#[tokio::test]
async fn test_ensure_creates_and_starts() {
    let (engine, handle) = setup();

    let outcome = ensure(&handle, &k3d_registry("dev")).await.unwrap();

    assert!(matches!(outcome, EnsureOutcome::Created { .. }));
    let container = engine.container("k3d-registry").unwrap();
    assert!(container.running);
    assert!(container.networks.contains("k3d-dev"));
    assert_eq!(
        container.labels.get(REGISTRY_LABEL).map(String::as_str),
        Some("k3d-registry")
    );
    assert!(engine.has_volume("registry"));
    assert_eq!(engine.call_count("pull_image"), 1);
}

#[tokio::test]
async fn test_ensure_is_idempotent() {
    let (engine, handle) = setup();
    let spec = k3d_registry("dev");

    ensure(&handle, &spec).await.unwrap();
    let second = ensure(&handle, &spec).await.unwrap();

    assert_eq!(second, EnsureOutcome::AlreadyExists);
    assert_eq!(engine.container_count(), 1);
    assert_eq!(engine.volume_count(), 1);
    assert_eq!(engine.call_count("create_container"), 1);
    assert_eq!(engine.call_count("create_volume"), 1);
}

#[tokio::test]
async fn test_ensure_reuses_existing_volume() {
    let (engine, handle) = setup();
    engine.add_volume("registry");

    ensure(&handle, &k3d_registry("dev")).await.unwrap();

    assert_eq!(engine.call_count("create_volume"), 0);
    assert_eq!(engine.volume_count(), 1);
}

#[tokio::test]
async fn test_conflict_on_create_counts_as_existing() {
    let (engine, handle) = setup();
    engine.fail_on(
        "create_container",
        EngineError::Conflict("name already in use".to_string()),
    );

    let outcome = ensure(&handle, &k3d_registry("dev")).await.unwrap();

    assert_eq!(outcome, EnsureOutcome::AlreadyExists);
    assert_eq!(engine.call_count("start_container"), 0);
}

#[tokio::test]
async fn test_pull_failure_is_wrapped() {
    let (engine, handle) = setup();
    engine.fail_on("pull_image", EngineError::Api("manifest unknown".to_string()));

    let err = ensure(&handle, &k3d_registry("dev")).await.unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Operation { op: "pull image", .. }
    ));
    assert!(err.to_string().contains("registry:3"));
    assert!(err.to_string().contains("manifest unknown"));
    assert_eq!(engine.volume_count(), 0);
}

#[tokio::test]
async fn test_create_failure_rolls_back_new_volume() {
    let (engine, handle) = setup();
    engine.fail_on("create_container", EngineError::Api("no space left".to_string()));

    let err = ensure(&handle, &k3d_registry("dev")).await.unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Operation { op: "create container", .. }
    ));
    assert_eq!(engine.volume_count(), 0);
    assert_eq!(engine.container_count(), 0);
}

#[tokio::test]
async fn test_create_failure_keeps_preexisting_volume() {
    let (engine, handle) = setup();
    engine.add_volume("registry");
    engine.fail_on("create_container", EngineError::Api("no space left".to_string()));

    ensure(&handle, &k3d_registry("dev")).await.unwrap_err();

    assert!(engine.has_volume("registry"));
}

#[tokio::test]
async fn test_start_failure_rolls_back_container_and_volume() {
    let (engine, handle) = setup();
    engine.fail_on("start_container", EngineError::Api("port is already allocated".to_string()));

    let err = ensure(&handle, &k3d_registry("dev")).await.unwrap_err();

    assert!(err.to_string().contains("port is already allocated"));
    assert_eq!(engine.container_count(), 0);
    assert_eq!(engine.volume_count(), 0);
}

#[tokio::test]
async fn test_proxy_config_exists_only_while_creating() {
    let (engine, handle) = setup();
    let spec = RegistrySpec::new("kind-docker-io")
        .with_host_port(5000)
        .with_upstream("https://registry-1.docker.io")
        .for_cluster(Distribution::Kind, "dev");

    ensure(&handle, &spec).await.unwrap();

    let created = engine.container_spec("kind-docker-io").unwrap();
    let bind = created
        .mounts
        .iter()
        .find(|m| m.kind == MountKind::Bind)
        .unwrap();
    assert!(bind.read_only);
    assert_eq!(bind.target, "/etc/distribution/config.yml");
    assert_eq!(engine.bind_sources_present_at_create("kind-docker-io"), Some(true));
    assert!(!Path::new(&bind.source).exists());
}

#[tokio::test]
async fn test_proxy_config_removed_after_failure() {
    let (engine, handle) = setup();
    engine.fail_on("start_container", EngineError::Api("boom".to_string()));
    let spec = RegistrySpec::new("kind-ghcr-io").with_upstream("https://ghcr.io");

    ensure(&handle, &spec).await.unwrap_err();

    let created = engine.container_spec("kind-ghcr-io").unwrap();
    let bind = created
        .mounts
        .iter()
        .find(|m| m.kind == MountKind::Bind)
        .unwrap();
    assert!(!Path::new(&bind.source).exists());
}

#[tokio::test]
async fn test_teardown_exclusive_registry() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TeardownOutcome::Removed {
            volume: Some("registry".to_string())
        }
    );
    assert_eq!(engine.container_count(), 0);
    assert!(!engine.has_volume("registry"));
}

#[tokio::test]
async fn test_teardown_keeps_volume_by_default() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), false)
        .await
        .unwrap();

    assert_eq!(outcome, TeardownOutcome::Removed { volume: None });
    assert!(engine.has_volume("registry"));
}

#[tokio::test]
async fn test_teardown_leaves_shared_registry_running() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();
    engine.attach_network("k3d-registry", "k3d-other");

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();

    match outcome {
        TeardownOutcome::StillShared { networks } => {
            assert_eq!(networks.into_iter().collect::<Vec<_>>(), vec!["k3d-other"]);
        }
        other => panic!("expected StillShared, got {other:?}"),
    }
    let container = engine.container("k3d-registry").unwrap();
    assert!(container.running);
    assert!(!container.networks.contains("k3d-dev"));
    assert!(container.networks.contains("k3d-other"));
    assert!(engine.has_volume("registry"));
    assert_eq!(engine.call_count("stop_container"), 0);
}

#[tokio::test]
async fn test_teardown_ignores_non_cluster_networks() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();
    engine.attach_network("k3d-registry", "bridge");

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), false)
        .await
        .unwrap();

    assert_eq!(outcome, TeardownOutcome::Removed { volume: None });
}

#[tokio::test]
async fn test_teardown_missing_registry() {
    let (engine, handle) = setup();

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();

    assert_eq!(outcome, TeardownOutcome::NotFound);
    assert_eq!(engine.call_count("remove_container"), 0);
}

#[tokio::test]
async fn test_teardown_twice_is_safe() {
    let (_engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();

    teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();
    let second = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();

    assert_eq!(second, TeardownOutcome::NotFound);
}

#[tokio::test]
async fn test_teardown_tolerates_missing_volume() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();
    engine.fail_on(
        "remove_volume",
        EngineError::not_found(ResourceKind::Volume, "registry"),
    );

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap();

    assert_eq!(outcome, TeardownOutcome::Removed { volume: None });
}

#[tokio::test]
async fn test_teardown_tolerates_already_disconnected_network() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();
    engine.fail_on(
        "disconnect_network",
        EngineError::not_found(ResourceKind::Network, "k3d-dev"),
    );

    let outcome = teardown(&handle, "k3d-registry", Some("k3d-dev"), false)
        .await
        .unwrap();

    assert_eq!(outcome, TeardownOutcome::Removed { volume: None });
    assert_eq!(engine.call_count("disconnect_network"), 1);
    assert_eq!(engine.container_count(), 0);
}

#[tokio::test]
async fn test_teardown_disconnect_failure_keeps_container() {
    let (engine, handle) = setup();
    ensure(&handle, &k3d_registry("dev")).await.unwrap();
    engine.fail_on(
        "disconnect_network",
        EngineError::Api("network is busy".to_string()),
    );

    let err = teardown(&handle, "k3d-registry", Some("k3d-dev"), true)
        .await
        .unwrap_err();

    match err {
        RegistryError::Operation { op, resource, .. } => {
            assert_eq!(op, "disconnect network");
            assert_eq!(resource, "k3d-dev");
        }
        other => panic!("expected Operation, got {other:?}"),
    }
    let container = engine.container("k3d-registry").unwrap();
    assert!(container.running);
    assert!(engine.has_volume("registry"));
    assert_eq!(engine.call_count("stop_container"), 0);
    assert_eq!(engine.call_count("remove_container"), 0);
}

#[tokio::test]
async fn test_teardown_removes_the_mounted_volume() {
    let (engine, handle) = setup();
    engine.add_image(DEFAULT_REGISTRY_IMAGE);
    engine.add_volume("registry");
    let spec = ContainerSpec {
        image: DEFAULT_REGISTRY_IMAGE.to_string(),
        mounts: vec![VolumeMount::volume("mirror-blobs", REGISTRY_DATA_PATH)],
        network: Some("kind".to_string()),
        ..Default::default()
    };
    engine.create_container("kind-registry", &spec).await.unwrap();

    let outcome = teardown(&handle, "kind-registry", Some("kind"), true)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TeardownOutcome::Removed {
            volume: Some("mirror-blobs".to_string())
        }
    );
    assert!(!engine.has_volume("mirror-blobs"));
    assert!(engine.has_volume("registry"));
}

#[tokio::test]
async fn test_ensure_all_stops_at_first_failure() {
    let (engine, handle) = setup();
    let specs = vec![
        RegistrySpec::new("kind-a").with_host_port(5001),
        RegistrySpec::new("kind-b").with_image("ghcr.io/missing/registry:1"),
        RegistrySpec::new("kind-c").with_host_port(5003),
    ];
    engine.fail_on(
        "pull_image",
        EngineError::not_found(ResourceKind::Image, "ghcr.io/missing/registry:1"),
    );
    engine.add_image("registry:3");

    let results = ensure_all(&handle, &specs).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "kind-a");
    assert!(matches!(results[0].1, Ok(EnsureOutcome::Created { .. })));
    assert_eq!(results[1].0, "kind-b");
    assert!(matches!(
        results[1].1,
        Err(RegistryError::Operation { op: "pull image", .. })
    ));
    // Earlier registries stay; later ones are never attempted.
    assert!(engine.container("kind-a").is_some());
    assert!(engine.container("kind-b").is_none());
    assert!(engine.container("kind-c").is_none());
    assert!(!engine.has_volume("c"));
}

#[tokio::test]
async fn test_ensure_all_then_teardown_all() {
    let (engine, handle) = setup();
    let specs = vec![
        RegistrySpec::new("kind-a").for_cluster(Distribution::Kind, "dev"),
        RegistrySpec::new("kind-b").for_cluster(Distribution::Kind, "dev"),
    ];

    let created = ensure_all(&handle, &specs).await.unwrap();
    assert!(created.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(list_managed(&handle).await.unwrap().len(), 2);

    let removed = teardown_all(&handle, &specs, true).await;

    assert!(removed
        .iter()
        .all(|(_, result)| matches!(result, Ok(TeardownOutcome::Removed { .. }))));
    assert_eq!(engine.container_count(), 0);
    assert_eq!(engine.volume_count(), 0);
}

#[tokio::test]
async fn test_teardown_all_reports_each_registry() {
    let (engine, handle) = setup();
    let specs = vec![
        RegistrySpec::new("k3d-a").for_cluster(Distribution::K3d, "dev"),
        RegistrySpec::new("k3d-b").for_cluster(Distribution::K3d, "dev"),
    ];
    ensure(&handle, &specs[0]).await.unwrap();
    engine.attach_network("k3d-a", "k3d-other");

    let results = teardown_all(&handle, &specs, false).await;

    assert!(matches!(
        results[0].1,
        Ok(TeardownOutcome::StillShared { .. })
    ));
    assert!(matches!(results[1].1, Ok(TeardownOutcome::NotFound)));
}

#[tokio::test]
async fn test_list_managed_sorted_by_name() {
    let (_engine, handle) = setup();
    ensure(&handle, &RegistrySpec::new("kind-zot")).await.unwrap();
    ensure(&handle, &RegistrySpec::new("kind-alpha")).await.unwrap();

    let names: Vec<String> = list_managed(&handle)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();

    assert_eq!(names, vec!["kind-alpha", "kind-zot"]);
}
