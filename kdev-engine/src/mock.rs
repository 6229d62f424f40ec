//! In-memory engine for tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::client::EngineClient;
use crate::error::{EngineError, ResourceKind, Result};
use crate::types::{
    ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary, MountInfo, MountKind,
};

#[derive(Debug, Default)]
struct MockState {
    containers: BTreeMap<String, ContainerDetails>,
    specs: HashMap<String, ContainerSpec>,
    bind_sources_present: HashMap<String, bool>,
    volumes: BTreeSet<String>,
    networks: BTreeMap<String, BTreeMap<String, String>>,
    images: BTreeSet<String>,
    failures: HashMap<String, EngineError>,
    calls: Vec<String>,
    next_id: u64,
}

/// An engine whose whole state lives in a mutex.
///
/// Every trait call is appended to a call log, and any operation can be made
/// to fail with [`MockEngine::fail_on`].
#[derive(Debug)]
pub struct MockEngine {
    reachable: bool,
    version: Option<String>,
    state: Mutex<MockState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            reachable: true,
            version: Some("Docker Engine - Community".to_string()),
            state: Mutex::new(MockState::default()),
        }
    }

    /// An engine that fails every ping.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// `None` makes the version query fail.
    pub fn with_version(version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
            ..Self::new()
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, op: &str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.calls.push(op.to_string());
        match state.failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(state),
        }
    }

    /// Makes every later call to `op` fail with `err`.
    pub fn fail_on(&self, op: &str, err: EngineError) {
        self.state().failures.insert(op.to_string(), err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == op).count()
    }

    pub fn add_image(&self, image: &str) {
        self.state().images.insert(image.to_string());
    }

    pub fn add_volume(&self, name: &str) {
        self.state().volumes.insert(name.to_string());
    }

    /// Connects an existing container to another network, as a second
    /// cluster sharing the registry would.
    pub fn attach_network(&self, container: &str, network: &str) {
        if let Some(details) = self.state().containers.get_mut(container) {
            details.networks.insert(network.to_string());
        }
    }

    pub fn container(&self, name: &str) -> Option<ContainerDetails> {
        self.state().containers.get(name).cloned()
    }

    pub fn container_spec(&self, name: &str) -> Option<ContainerSpec> {
        self.state().specs.get(name).cloned()
    }

    /// Whether every bind-mount source existed on disk when `name` was created.
    pub fn bind_sources_present_at_create(&self, name: &str) -> Option<bool> {
        self.state().bind_sources_present.get(name).copied()
    }

    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.state().volumes.contains(name)
    }

    pub fn volume_count(&self) -> usize {
        self.state().volumes.len()
    }

    /// Adds an unlabelled network, as a cluster tool would create it.
    pub fn add_network(&self, name: &str) {
        self.state().networks.insert(name.to_string(), BTreeMap::new());
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state().networks.contains_key(name)
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn ping(&self) -> Result<()> {
        let _state = self.enter("ping")?;
        if self.reachable {
            Ok(())
        } else {
            Err(EngineError::Connect {
                endpoint: "mock".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    async fn server_version(&self) -> Result<String> {
        let _state = self.enter("server_version")?;
        self.version
            .clone()
            .ok_or_else(|| EngineError::Api("version endpoint unavailable".to_string()))
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let state = self.enter("list_containers")?;
        Ok(state
            .containers
            .values()
            .filter(|c| filter.matches(&c.name, &c.labels))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                running: c.running,
                labels: c.labels.clone(),
                networks: c.networks.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerDetails> {
        let state = self.enter("inspect_container")?;
        state
            .containers
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::not_found(ResourceKind::Container, name))
    }

    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.enter("create_container")?;
        if state.containers.contains_key(name) {
            return Err(EngineError::Conflict(format!(
                "container name \"/{name}\" is already in use"
            )));
        }
        if !state.images.contains(&spec.image) {
            return Err(EngineError::not_found(ResourceKind::Image, spec.image.clone()));
        }

        let mut mounts = Vec::new();
        let mut binds_present = true;
        for mount in &spec.mounts {
            match mount.kind {
                MountKind::Volume => {
                    state.volumes.insert(mount.source.clone());
                    mounts.push(MountInfo {
                        kind: MountKind::Volume,
                        name: Some(mount.source.clone()),
                        source: format!("/var/lib/docker/volumes/{}/_data", mount.source),
                        destination: mount.target.clone(),
                    });
                }
                MountKind::Bind => {
                    binds_present &= Path::new(&mount.source).exists();
                    mounts.push(MountInfo {
                        kind: MountKind::Bind,
                        name: None,
                        source: mount.source.clone(),
                        destination: mount.target.clone(),
                    });
                }
            }
        }

        state.next_id += 1;
        let id = format!("mock{:012}", state.next_id);
        let networks = BTreeSet::from([spec.network.clone().unwrap_or_else(|| "bridge".to_string())]);
        state.containers.insert(
            name.to_string(),
            ContainerDetails {
                id: id.clone(),
                name: name.to_string(),
                image: spec.image.clone(),
                running: false,
                labels: spec.labels.clone(),
                networks,
                mounts,
            },
        );
        state.specs.insert(name.to_string(), spec.clone());
        state.bind_sources_present.insert(name.to_string(), binds_present);
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        let mut state = self.enter("start_container")?;
        let container = state
            .containers
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Container, name))?;
        container.running = true;
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let mut state = self.enter("stop_container")?;
        let container = state
            .containers
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Container, name))?;
        container.running = false;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let mut state = self.enter("remove_container")?;
        state
            .containers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(ResourceKind::Container, name))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let state = self.enter("image_exists")?;
        Ok(state.images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut state = self.enter("pull_image")?;
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        let state = self.enter("volume_exists")?;
        Ok(state.volumes.contains(name))
    }

    async fn create_volume(&self, name: &str, _labels: &BTreeMap<String, String>) -> Result<()> {
        let mut state = self.enter("create_volume")?;
        state.volumes.insert(name.to_string());
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.enter("remove_volume")?;
        if state.volumes.remove(name) {
            Ok(())
        } else {
            Err(EngineError::not_found(ResourceKind::Volume, name))
        }
    }

    async fn network_exists(&self, name: &str) -> Result<bool> {
        let state = self.enter("network_exists")?;
        Ok(state.networks.contains_key(name))
    }

    async fn create_network(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let mut state = self.enter("create_network")?;
        if state.networks.contains_key(name) {
            return Err(EngineError::Conflict(format!("network {name} already exists")));
        }
        state.networks.insert(name.to_string(), labels.clone());
        Ok(())
    }

    async fn network_labels(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let state = self.enter("network_labels")?;
        state
            .networks
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::not_found(ResourceKind::Network, name))
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        let mut state = self.enter("remove_network")?;
        if !state.networks.contains_key(name) {
            return Err(EngineError::not_found(ResourceKind::Network, name));
        }
        if state.containers.values().any(|c| c.networks.contains(name)) {
            return Err(EngineError::Conflict(format!(
                "network {name} has active endpoints"
            )));
        }
        state.networks.remove(name);
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut state = self.enter("disconnect_network")?;
        let details = state
            .containers
            .get_mut(container)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Container, container))?;
        if details.networks.remove(network) {
            Ok(())
        } else {
            Err(EngineError::not_found(ResourceKind::Network, network))
        }
    }
}
