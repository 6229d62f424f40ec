//! Registry container lifecycle.
//!
//! Nothing here is cached: every call re-reads the engine, which is the only
//! source of truth, so running the same operation twice is always safe.

use kdev_engine::{
    ContainerFilter, ContainerSpec, ContainerSummary, EngineClient, EngineHandle, PortMapping,
    VolumeMount,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::compensation::{Compensation, Compensations};
use crate::config::{config_mount_path, write_proxy_config};
use crate::error::{RegistryError, Result};
use crate::types::{
    is_cluster_network, resolve_volume_name, EnsureOutcome, ManagedRegistry, RegistrySpec,
    TeardownOutcome,
};
use crate::{CLUSTER_LABEL, DEFAULT_REGISTRY_PORT, REGISTRY_DATA_PATH, REGISTRY_LABEL};

/// Looks a container up by exact name. Engines filter names by substring,
/// so the listing is narrowed here.
async fn find_container(client: &dyn EngineClient, name: &str) -> Result<Option<ContainerSummary>> {
    let containers = client
        .list_containers(&ContainerFilter::by_name(name))
        .await
        .map_err(RegistryError::op("list containers", name))?;
    Ok(containers.into_iter().find(|c| c.name == name))
}

fn labels_for(spec: &RegistrySpec) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([(REGISTRY_LABEL.to_string(), spec.name.clone())]);
    if let Some(cluster) = &spec.cluster_name {
        labels.insert(CLUSTER_LABEL.to_string(), cluster.clone());
    }
    labels
}

/// Container configuration for a registry spec.
pub fn container_spec(spec: &RegistrySpec, volume: &str, config_file: Option<&Path>) -> ContainerSpec {
    let mut mounts = vec![VolumeMount::volume(volume, REGISTRY_DATA_PATH)];
    if let Some(path) = config_file {
        mounts.push(VolumeMount::bind_read_only(
            path.display().to_string(),
            config_mount_path(&spec.image),
        ));
    }

    ContainerSpec {
        image: spec.image.clone(),
        labels: labels_for(spec),
        env: Vec::new(),
        port: spec.host_port.map(|host_port| PortMapping {
            container_port: DEFAULT_REGISTRY_PORT,
            host_ip: spec.host_address.clone(),
            host_port,
        }),
        mounts,
        restart_always: true,
        network: spec.network_name.clone(),
    }
}

/// Makes sure a registry container for `spec` exists and is started.
///
/// An existing container with the same name is left untouched. Otherwise the
/// image is pulled if missing, the volume created if missing, and the
/// container created and started. If a later step fails, whatever this call
/// created is removed again before the error is returned.
pub async fn ensure(engine: &EngineHandle, spec: &RegistrySpec) -> Result<EnsureOutcome> {
    spec.validate()?;
    let client = engine.client();

    if find_container(client, &spec.name).await?.is_some() {
        debug!(registry = %spec.name, "Registry container already exists");
        return Ok(EnsureOutcome::AlreadyExists);
    }

    let present = client
        .image_exists(&spec.image)
        .await
        .map_err(RegistryError::op("inspect image", &spec.image))?;
    if !present {
        info!(registry = %spec.name, image = %spec.image, "Pulling registry image");
        client
            .pull_image(&spec.image)
            .await
            .map_err(RegistryError::op("pull image", &spec.image))?;
    }

    let mut compensations = Compensations::new();
    match provision(client, spec, &mut compensations).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            let leftovers = compensations.unwind(client).await;
            if !leftovers.is_empty() {
                warn!(
                    registry = %spec.name,
                    count = leftovers.len(),
                    "Rollback left resources behind"
                );
            }
            Err(e)
        }
    }
}

async fn provision(
    client: &dyn EngineClient,
    spec: &RegistrySpec,
    compensations: &mut Compensations,
) -> Result<EnsureOutcome> {
    let volume = spec.volume_name();
    let volume_exists = client
        .volume_exists(&volume)
        .await
        .map_err(RegistryError::op("inspect volume", &volume))?;
    if !volume_exists {
        client
            .create_volume(&volume, &labels_for(spec))
            .await
            .map_err(RegistryError::op("create volume", &volume))?;
        compensations.push(Compensation::RemoveVolume(volume.clone()));
        debug!(registry = %spec.name, volume = %volume, "Created registry volume");
    }

    // Deleted when dropped, on every path out of this function.
    let config_file = match &spec.upstream_url {
        Some(upstream) => Some(write_proxy_config(upstream)?),
        None => None,
    };

    let container = container_spec(spec, &volume, config_file.as_ref().map(|f| f.path()));
    let container_id = match client.create_container(&spec.name, &container).await {
        Ok(id) => id,
        Err(e) if e.is_conflict() => {
            // Another invocation won the race; its container is as good as ours.
            debug!(registry = %spec.name, "Registry container created concurrently");
            return Ok(EnsureOutcome::AlreadyExists);
        }
        Err(e) => return Err(RegistryError::op("create container", &spec.name)(e)),
    };
    compensations.push(Compensation::RemoveContainer(spec.name.clone()));

    client
        .start_container(&spec.name)
        .await
        .map_err(RegistryError::op("start container", &spec.name))?;

    let endpoint = spec.endpoint().unwrap_or_else(|| "unpublished".to_string());
    info!(
        registry = %spec.name,
        endpoint = %endpoint,
        proxy = spec.is_proxy(),
        "Registry started"
    );
    Ok(EnsureOutcome::Created { container_id })
}

/// Per-registry results of a batch operation, in input order.
pub type BatchResults<T> = Vec<(String, Result<T>)>;

/// Ensures specs in order and stops at the first failure.
///
/// The returned list holds every registry attempted: the ones already
/// ensured, then the failing one as its last entry. Registries after it are
/// not touched, and the ones before it are not rolled back. A name declared
/// twice fails the whole batch before any engine call.
pub async fn ensure_all(
    engine: &EngineHandle,
    specs: &[RegistrySpec],
) -> Result<BatchResults<EnsureOutcome>> {
    let mut names = BTreeSet::new();
    for spec in specs {
        if !names.insert(spec.name.as_str()) {
            return Err(RegistryError::InvalidSpec(format!(
                "registry '{}' is declared more than once",
                spec.name
            )));
        }
    }

    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        let result = ensure(engine, spec).await;
        let failed = result.is_err();
        if let Err(e) = &result {
            warn!(
                registry = %spec.name,
                skipped = specs.len() - results.len() - 1,
                "Registry setup failed, stopping: {}", e
            );
        }
        results.push((spec.name.clone(), result));
        if failed {
            break;
        }
    }
    Ok(results)
}

/// Creates a cluster network if it does not exist yet, so registries can
/// join it before the cluster tool runs. Returns whether it was created.
///
/// Kind and K3d both adopt a pre-existing network of the expected name.
pub async fn ensure_network(engine: &EngineHandle, name: &str) -> Result<bool> {
    let client = engine.client();
    let exists = client
        .network_exists(name)
        .await
        .map_err(RegistryError::op("inspect network", name))?;
    if exists {
        return Ok(false);
    }

    let labels = BTreeMap::from([(CLUSTER_LABEL.to_string(), name.to_string())]);
    match client.create_network(name, &labels).await {
        Ok(()) => {
            info!(network = %name, "Created cluster network");
            Ok(true)
        }
        Err(e) if e.is_conflict() => Ok(false),
        Err(e) => Err(RegistryError::op("create network", name)(e)),
    }
}

/// Removes a network that [`ensure_network`] created, once nothing is
/// attached to it. Returns whether it was removed.
///
/// Networks without the cluster label belong to the cluster tool and are
/// never touched. One that still has endpoints is left for its last user.
pub async fn release_network(engine: &EngineHandle, name: &str) -> Result<bool> {
    let client = engine.client();
    let labels = match client.network_labels(name).await {
        Ok(labels) => labels,
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(RegistryError::op("inspect network", name)(e)),
    };
    if !labels.contains_key(CLUSTER_LABEL) {
        debug!(network = %name, "Network not created by kdev, leaving it");
        return Ok(false);
    }

    match client.remove_network(name).await {
        Ok(()) => {
            info!(network = %name, "Removed cluster network");
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) if e.is_conflict() => {
            info!(network = %name, "Cluster network still in use, leaving it");
            Ok(false)
        }
        Err(e) => Err(RegistryError::op("remove network", name)(e)),
    }
}

/// Removes a registry container unless another cluster still uses it.
///
/// When `cluster_network` is given the container is first disconnected from
/// it. If any other Kind/K3d network is still attached afterwards the
/// registry is left running. Otherwise it is stopped and removed, along with
/// its volume when `delete_volume` is set.
pub async fn teardown(
    engine: &EngineHandle,
    name: &str,
    cluster_network: Option<&str>,
    delete_volume: bool,
) -> Result<TeardownOutcome> {
    let client = engine.client();

    if find_container(client, name).await?.is_none() {
        debug!(registry = %name, "Registry container not found");
        return Ok(TeardownOutcome::NotFound);
    }

    let Some(mut details) = inspect(client, name).await? else {
        return Ok(TeardownOutcome::NotFound);
    };

    if let Some(network) = cluster_network {
        if details.networks.contains(network) {
            match client.disconnect_network(network, name).await {
                Ok(()) => debug!(registry = %name, network = %network, "Disconnected registry"),
                Err(e) if e.is_not_found() => {
                    debug!(registry = %name, network = %network, "Registry already disconnected")
                }
                Err(e) => return Err(RegistryError::op("disconnect network", network)(e)),
            }
            details = match inspect(client, name).await? {
                Some(details) => details,
                None => return Ok(TeardownOutcome::NotFound),
            };
        }
    }

    // A disconnect that raced with another client can still show the
    // caller's network here; it never counts as another user.
    let shared: BTreeSet<String> = details
        .networks
        .iter()
        .filter(|n| Some(n.as_str()) != cluster_network && is_cluster_network(n))
        .cloned()
        .collect();
    if !shared.is_empty() {
        info!(registry = %name, networks = ?shared, "Registry still used by other clusters");
        return Ok(TeardownOutcome::StillShared { networks: shared });
    }

    if details.running {
        client
            .stop_container(name)
            .await
            .map_err(RegistryError::op("stop container", name))?;
    }
    client
        .remove_container(name)
        .await
        .map_err(RegistryError::op("remove container", name))?;
    info!(registry = %name, "Registry removed");

    let mut removed_volume = None;
    if delete_volume {
        let volume = details
            .volume_at(REGISTRY_DATA_PATH)
            .map(str::to_string)
            .unwrap_or_else(|| resolve_volume_name(name));
        match client.remove_volume(&volume).await {
            Ok(()) => {
                info!(registry = %name, volume = %volume, "Registry volume removed");
                removed_volume = Some(volume);
            }
            Err(e) if e.is_not_found() => {
                debug!(registry = %name, volume = %volume, "Registry volume already gone")
            }
            Err(e) => return Err(RegistryError::op("remove volume", volume)(e)),
        }
    }

    Ok(TeardownOutcome::Removed {
        volume: removed_volume,
    })
}

async fn inspect(
    client: &dyn EngineClient,
    name: &str,
) -> Result<Option<kdev_engine::ContainerDetails>> {
    match client.inspect_container(name).await {
        Ok(details) => Ok(Some(details)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(RegistryError::op("inspect container", name)(e)),
    }
}

/// Tears down every spec's registry against its own cluster network,
/// reporting each result separately.
pub async fn teardown_all(
    engine: &EngineHandle,
    specs: &[RegistrySpec],
    delete_volume: bool,
) -> BatchResults<TeardownOutcome> {
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        let result = teardown(
            engine,
            &spec.name,
            spec.network_name.as_deref(),
            delete_volume,
        )
        .await;
        if let Err(e) = &result {
            warn!(registry = %spec.name, "Registry teardown failed: {}", e);
        }
        results.push((spec.name.clone(), result));
    }
    results
}

/// Lists every container carrying the registry label.
pub async fn list_managed(engine: &EngineHandle) -> Result<Vec<ManagedRegistry>> {
    let containers = engine
        .client()
        .list_containers(&ContainerFilter::by_label(REGISTRY_LABEL))
        .await
        .map_err(RegistryError::op("list containers", REGISTRY_LABEL))?;

    let mut registries: Vec<ManagedRegistry> = containers
        .into_iter()
        .map(|c| ManagedRegistry {
            name: c.name,
            running: c.running,
            networks: c.networks,
        })
        .collect();
    registries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(registries)
}
