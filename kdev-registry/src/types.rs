//! Type definitions for mirror registries.

use kdev_config::Distribution;
use std::collections::BTreeSet;

use crate::error::{RegistryError, Result};
use crate::{DEFAULT_HOST, DEFAULT_REGISTRY_IMAGE};

/// Prefixes distributions put on registry names. Stripping them keeps the
/// storage volume stable when a registry is recreated under another
/// distribution's naming.
const DISTRIBUTION_PREFIXES: [&str; 2] = ["kind-", "k3d-"];

/// A mirror registry that should exist before a cluster is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySpec {
    /// Container name and value of the registry label.
    pub name: String,
    /// Host port bound to the registry port; `None` publishes nothing.
    pub host_port: Option<u16>,
    /// Upstream to proxy pulls to; `None` makes a plain mirror.
    pub upstream_url: Option<String>,
    pub cluster_name: Option<String>,
    /// Cluster network the container joins at creation.
    pub network_name: Option<String>,
    pub image: String,
    pub host_address: String,
}

impl RegistrySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host_port: None,
            upstream_url: None,
            cluster_name: None,
            network_name: None,
            image: DEFAULT_REGISTRY_IMAGE.to_string(),
            host_address: DEFAULT_HOST.to_string(),
        }
    }

    pub fn with_host_port(mut self, port: u16) -> Self {
        self.host_port = Some(port);
        self
    }

    pub fn with_upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_host_address(mut self, address: impl Into<String>) -> Self {
        self.host_address = address.into();
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network_name = Some(network.into());
        self
    }

    /// Scopes the registry to a cluster, joining that cluster's network.
    pub fn for_cluster(mut self, distribution: Distribution, cluster: &str) -> Self {
        self.cluster_name = Some(cluster.to_string());
        self.network_name = Some(distribution.network_name(cluster));
        self
    }

    pub fn volume_name(&self) -> String {
        resolve_volume_name(&self.name)
    }

    pub fn is_proxy(&self) -> bool {
        self.upstream_url.is_some()
    }

    /// `host:port` reachable from the host, when a port is published.
    pub fn endpoint(&self) -> Option<String> {
        self.host_port
            .map(|port| format!("{}:{}", self.host_address, port))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec(
                "registry name must not be empty".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(RegistryError::InvalidSpec(format!(
                "registry '{}' has no image",
                self.name
            )));
        }
        if self.host_port == Some(0) {
            return Err(RegistryError::InvalidSpec(format!(
                "registry '{}' has host port 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Volume name for a registry: its name with one distribution prefix removed.
///
/// A name that is nothing but a prefix is kept whole.
pub fn resolve_volume_name(name: &str) -> String {
    DISTRIBUTION_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name)
        .to_string()
}

/// Whether a network name follows the Kind/K3d cluster-network convention.
pub fn is_cluster_network(name: &str) -> bool {
    matches!(name, "kind" | "k3d") || DISTRIBUTION_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// What [`crate::ensure`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A container with the registry's name was already present.
    AlreadyExists,
    Created { container_id: String },
}

/// What [`crate::teardown`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// No container had that name.
    NotFound,
    /// Other cluster networks remain attached; nothing was removed.
    StillShared { networks: BTreeSet<String> },
    Removed { volume: Option<String> },
}

/// A registry container found by its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRegistry {
    pub name: String,
    pub running: bool,
    pub networks: BTreeSet<String>,
}
