// Command handlers for kdev operations

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::cli::{Args, Command};
use kdev_config::project::DEFAULT_ENGINE_TIMEOUT_SECS;
use kdev_config::{load_distribution_config, ConfigLoader, DistributionConfig, ProjectConfig};
use kdev_core::KdevError;
use kdev_engine::{EngineError, EngineHandle};
use kdev_registry::extract::PlanOptions;
use kdev_registry::{plan_registries, RegistrySpec};

pub mod cluster;
pub mod engine;
pub mod registry;

/// Main command dispatcher
pub async fn execute_command(args: Args) -> Result<()> {
    match &args.command {
        Command::Engine => {
            debug!("Handling engine command");
            // Engine detection works without a project file.
            let timeout = match ConfigLoader::new(args.config.clone()).load() {
                Ok(project) => Duration::from_secs(project.spec.engine_timeout_seconds),
                Err(_) => Duration::from_secs(DEFAULT_ENGINE_TIMEOUT_SECS),
            };
            engine::handle_engine(timeout).await
        }
        Command::Registry { command } => {
            debug!("Handling registry command");
            let project = Project::load(args.config.clone())?;
            registry::handle_registry_command(command, &project).await
        }
        Command::Cluster { command } => {
            debug!("Handling cluster command");
            let project = Project::load(args.config.clone())?;
            cluster::handle_cluster_command(command, &project).await
        }
    }
}

/// A loaded project file together with its distribution config.
pub struct Project {
    pub config: ProjectConfig,
    pub distribution: DistributionConfig,
}

impl Project {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config = ConfigLoader::new(path)
            .load()
            .context("Failed to load project configuration")?;
        let distribution = load_distribution_config(&config)
            .context("Failed to load distribution configuration")?;
        debug!(
            cluster = config.cluster_name(),
            distribution = %config.distribution(),
            "Loaded project"
        );
        Ok(Self {
            config,
            distribution,
        })
    }

    pub fn cluster_name(&self) -> &str {
        self.config.cluster_name()
    }

    /// Engine network the cluster's nodes and registries share.
    pub fn network_name(&self) -> String {
        self.config.distribution().network_name(self.cluster_name())
    }

    /// Every registry the project declares, in ensure order.
    pub fn registries(&self) -> Result<Vec<RegistrySpec>> {
        let spec = &self.config.spec;
        let options = PlanOptions {
            cluster: self.cluster_name(),
            image: spec.registry.image.as_deref(),
            host_address: spec.registry.host_address.as_deref(),
            mirrors: &spec.mirror_registries,
        };
        plan_registries(&self.distribution, &options)
            .context("Failed to read registry declarations")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.spec.engine_timeout_seconds)
    }
}

/// Detects the container engine, bounded by `limit`.
pub async fn connect_engine(limit: Duration) -> Result<EngineHandle, KdevError> {
    let detected = with_timeout(limit, "engine detection", kdev_engine::detect(Vec::new())).await?;
    detected.map_err(|e| match e {
        EngineError::NoEngineAvailable => KdevError::NoEngineAvailable,
        other => KdevError::Engine(other.to_string()),
    })
}

/// Runs `future` to completion unless `limit` elapses first, in which case
/// the future is dropped mid-flight.
pub async fn with_timeout<F, T>(limit: Duration, what: &str, future: F) -> Result<T, KdevError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future).await.map_err(|_| {
        KdevError::Timeout(format!("{what} did not finish within {}s", limit.as_secs()))
    })
}

pub fn is_engine_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<KdevError>()
            .is_some_and(KdevError::is_engine_unavailable)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let err = with_timeout(Duration::from_millis(10), "registry setup", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await
        .unwrap_err();

        assert!(matches!(err, KdevError::Timeout(_)));
        assert!(err.to_string().contains("registry setup"));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_value_through() {
        let value = with_timeout(Duration::from_secs(5), "noop", async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_engine_unavailable_found_through_context() {
        let err = anyhow::Error::new(KdevError::NoEngineAvailable).context("Failed to set up");
        assert!(is_engine_unavailable(&err));
        assert!(!is_engine_unavailable(&anyhow::anyhow!("other")));
    }

    #[test]
    fn test_project_registries_scoped_to_cluster() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_file = dir.path().join("kdev.yaml");
        std::fs::write(
            &project_file,
            "metadata:\n  name: dev\nspec:\n  distribution: K3d\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("k3d.yaml"),
            "registries:\n  use:\n    - k3d-registry:5001\n",
        )
        .unwrap();

        let project = Project::load(Some(project_file)).unwrap();
        let registries = project.registries().unwrap();

        assert_eq!(project.network_name(), "k3d-dev");
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].network_name.as_deref(), Some("k3d-dev"));
        assert_eq!(registries[0].host_port, Some(5001));
    }
}
