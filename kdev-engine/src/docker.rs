//! Docker-API client backed by `bollard`.
//!
//! Podman serves the same API on its compat socket, so one adapter covers
//! both engines; only the connection strategy differs.

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerSummary as ApiContainerSummary, ContainerSummaryStateEnum,
    EndpointSettings, HostConfig, MountPointTypeEnum, NetworkCreateRequest,
    NetworkDisconnectRequest, NetworkingConfig, PortBinding,
    RestartPolicy, RestartPolicyNameEnum, VolumeCreateOptions,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, InspectNetworkOptions,
    ListContainersOptions, RemoveContainerOptions, RemoveVolumeOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::client::EngineClient;
use crate::detector::Candidate;
use crate::error::{EngineError, ResourceKind, Result};
use crate::types::{
    ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary, MountInfo, MountKind,
};

/// Seconds bollard waits on a single request before giving up.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Podman's rootful API socket.
pub const PODMAN_SYSTEM_SOCKET: &str = "/run/podman/podman.sock";

pub struct BollardClient {
    docker: Docker,
    endpoint: String,
}

impl BollardClient {
    /// Connects the way the `docker` CLI does, honouring `DOCKER_HOST`.
    pub fn from_env() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| EngineError::Connect {
            endpoint: "docker environment".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            docker,
            endpoint: "docker environment".to_string(),
        })
    }

    /// Connects to a unix socket, failing fast when the socket file is absent.
    #[cfg(unix)]
    pub fn from_socket(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Err(EngineError::Connect {
                endpoint: path.to_string(),
                message: "socket does not exist".to_string(),
            });
        }
        let docker = Docker::connect_with_unix(path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            .map_err(|e| EngineError::Connect {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            docker,
            endpoint: path.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Podman's rootless API socket for the current user.
#[cfg(unix)]
pub fn podman_user_socket() -> String {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("/run/user/{}", nix::unistd::getuid()));
    format!("{runtime_dir}/podman/podman.sock")
}

/// The default detection order: the native Docker environment, then
/// Podman's user socket, then Podman's system socket.
pub fn default_candidates() -> Vec<Candidate> {
    let mut candidates = vec![Candidate::new("docker", || {
        Ok(Arc::new(BollardClient::from_env()?) as Arc<dyn EngineClient>)
    })];

    #[cfg(unix)]
    {
        candidates.push(Candidate::new("podman-user", || {
            Ok(Arc::new(BollardClient::from_socket(&podman_user_socket())?) as Arc<dyn EngineClient>)
        }));
        candidates.push(Candidate::new("podman-system", || {
            Ok(Arc::new(BollardClient::from_socket(PODMAN_SYSTEM_SOCKET)?) as Arc<dyn EngineClient>)
        }));
    }

    candidates
}

fn map_error(kind: ResourceKind, name: &str) -> impl FnOnce(BollardError) -> EngineError + '_ {
    move |err| match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::not_found(kind, name),
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } => EngineError::Conflict(message),
        other => EngineError::Api(format!("{kind} '{name}': {other}")),
    }
}

fn into_btree(map: Option<HashMap<String, String>>) -> BTreeMap<String, String> {
    map.unwrap_or_default().into_iter().collect()
}

fn bollard_restart(always: bool) -> RestartPolicyNameEnum {
    if always {
        RestartPolicyNameEnum::ALWAYS
    } else {
        RestartPolicyNameEnum::NO
    }
}

fn summarize(c: ApiContainerSummary) -> ContainerSummary {
    let name = c
        .names
        .unwrap_or_default()
        .first()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    let networks = c
        .network_settings
        .and_then(|s| s.networks)
        .map(|n| n.into_keys().collect())
        .unwrap_or_default();
    ContainerSummary {
        id: c.id.unwrap_or_default(),
        name,
        running: c.state == Some(ContainerSummaryStateEnum::RUNNING),
        labels: into_btree(c.labels),
        networks,
    }
}

/// Translates a [`ContainerSpec`] into the API create body.
pub fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    let port_bindings = spec.port.as_ref().map(|port| {
        HashMap::from([(
            format!("{}/tcp", port.container_port),
            Some(vec![PortBinding {
                host_ip: Some(port.host_ip.clone()),
                host_port: Some(port.host_port.to_string()),
            }]),
        )])
    });

    let binds: Vec<String> = spec.mounts.iter().map(|m| m.to_bind_string()).collect();

    let host_config = HostConfig {
        port_bindings,
        binds: (!binds.is_empty()).then_some(binds),
        restart_policy: Some(RestartPolicy {
            name: Some(bollard_restart(spec.restart_always)),
            maximum_retry_count: None,
        }),
        ..Default::default()
    };

    let networking_config = spec.network.as_ref().map(|network| NetworkingConfig {
        endpoints_config: Some(HashMap::from([(
            network.clone(),
            EndpointSettings::default(),
        )])),
    });

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        labels: Some(spec.labels.clone().into_iter().collect()),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        host_config: Some(host_config),
        networking_config,
        ..Default::default()
    }
}

#[async_trait]
impl EngineClient for BollardClient {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Connect {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })
    }

    async fn server_version(&self) -> Result<String> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| EngineError::Api(e.to_string()))?;

        let mut parts = Vec::new();
        if let Some(platform) = version.platform {
            parts.push(platform.name);
        }
        for component in version.components.unwrap_or_default() {
            parts.push(component.name);
        }
        Ok(parts.join(" "))
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(name) = &filter.name {
            filters.insert("name".to_string(), vec![name.clone()]);
        }
        if let Some(label) = filter.label_expr() {
            filters.insert("label".to_string(), vec![label]);
        }

        let options = ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(format!("list containers: {e}")))?;

        Ok(containers.into_iter().map(summarize).collect())
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerDetails> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(map_error(ResourceKind::Container, name))?;

        let config = info.config.unwrap_or_default();
        let networks: BTreeSet<String> = info
            .network_settings
            .and_then(|s| s.networks)
            .map(|n| n.into_keys().collect())
            .unwrap_or_default();
        let mounts = info
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let kind = if matches!(m.typ, Some(MountPointTypeEnum::VOLUME)) {
                    MountKind::Volume
                } else {
                    MountKind::Bind
                };
                MountInfo {
                    kind,
                    name: m.name,
                    source: m.source.unwrap_or_default(),
                    destination: m.destination.unwrap_or_default(),
                }
            })
            .collect();

        Ok(ContainerDetails {
            id: info.id.unwrap_or_default(),
            name: info
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| name.to_string()),
            image: config.image.unwrap_or_default(),
            running: info.state.and_then(|s| s.running).unwrap_or(false),
            labels: into_btree(config.labels),
            networks,
            mounts,
        })
    }

    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<String> {
        let options = CreateContainerOptions {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), create_body(spec))
            .await
            .map_err(map_error(ResourceKind::Container, name))?;
        for warning in response.warnings {
            debug!(container = name, "Engine warning on create: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .map_err(map_error(ResourceKind::Container, name))
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.docker
            .stop_container(name, None::<StopContainerOptions>)
            .await
            .map_err(map_error(ResourceKind::Container, name))
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(map_error(ResourceKind::Container, name))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = map_error(ResourceKind::Image, image)(e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(map_error(ResourceKind::Image, image))?;
            if let Some(status) = info.status {
                debug!(image, "{}", status);
            }
        }
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        match self.docker.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = map_error(ResourceKind::Volume, name)(e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let options = VolumeCreateOptions {
            name: Some(name.to_string()),
            labels: Some(labels.clone().into_iter().collect()),
            ..Default::default()
        };
        self.docker
            .create_volume(options)
            .await
            .map(|_| ())
            .map_err(map_error(ResourceKind::Volume, name))
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.docker
            .remove_volume(name, None::<RemoveVolumeOptions>)
            .await
            .map_err(map_error(ResourceKind::Volume, name))
    }

    async fn network_exists(&self, name: &str) -> Result<bool> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = map_error(ResourceKind::Network, name)(e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_network(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let request = NetworkCreateRequest {
            name: name.to_string(),
            driver: Some("bridge".to_string()),
            labels: Some(labels.clone().into_iter().collect()),
            ..Default::default()
        };
        self.docker
            .create_network(request)
            .await
            .map(|_| ())
            .map_err(map_error(ResourceKind::Network, name))
    }

    async fn network_labels(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let network = self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
            .map_err(map_error(ResourceKind::Network, name))?;
        Ok(into_btree(network.labels))
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        // Docker answers 403 while endpoints are still attached.
        self.docker.remove_network(name).await.map_err(|e| match e {
            BollardError::DockerResponseServerError {
                status_code: 403,
                message,
            } => EngineError::Conflict(message),
            other => map_error(ResourceKind::Network, name)(other),
        })
    }

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        let request = NetworkDisconnectRequest {
            container: Some(container.to_string()),
            force: Some(true),
        };
        self.docker
            .disconnect_network(network, request)
            .await
            .map_err(map_error(ResourceKind::Network, network))
    }
}
