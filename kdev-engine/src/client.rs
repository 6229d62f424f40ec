//! The engine client capability.
//!
//! Everything the registry subsystem does to a container engine goes
//! through this trait. [`crate::docker::BollardClient`] implements it over
//! the Docker-compatible API (Docker itself, or Podman's compat socket).

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary};

#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Platform and component names reported by the engine, joined into
    /// one string for classification.
    async fn server_version(&self) -> Result<String>;

    /// Lists running and stopped containers matching `filter`.
    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>>;

    /// Fails with [`EngineError::NotFound`](crate::EngineError::NotFound)
    /// when no container has that name.
    async fn inspect_container(&self, name: &str) -> Result<ContainerDetails>;

    /// Creates a container and returns its id. A name clash surfaces as
    /// [`EngineError::Conflict`](crate::EngineError::Conflict).
    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<String>;

    async fn start_container(&self, name: &str) -> Result<()>;

    async fn stop_container(&self, name: &str) -> Result<()>;

    async fn remove_container(&self, name: &str) -> Result<()>;

    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pulls an image, draining the progress stream.
    async fn pull_image(&self, image: &str) -> Result<()>;

    async fn volume_exists(&self, name: &str) -> Result<bool>;

    async fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;

    async fn remove_volume(&self, name: &str) -> Result<()>;

    async fn network_exists(&self, name: &str) -> Result<bool>;

    async fn create_network(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;

    /// Labels of an existing network; `NotFound` when there is none.
    async fn network_labels(&self, name: &str) -> Result<BTreeMap<String, String>>;

    /// Fails with `Conflict` while containers are still attached.
    async fn remove_network(&self, name: &str) -> Result<()>;

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()>;
}
