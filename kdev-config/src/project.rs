//! The `kdev.yaml` project file.

use crate::distribution::Distribution;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CLUSTER_NAME: &str = "kdev";
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub spec: ProjectSpec,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default = "default_cluster_name")]
    pub name: String,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub distribution: Distribution,

    /// Distribution config path, relative to the project file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_config: Option<PathBuf>,

    #[serde(default)]
    pub registry: RegistrySettings,

    /// Pull-through mirrors as `<host>=<upstream-url>`.
    #[serde(default)]
    pub mirror_registries: Vec<String>,

    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_seconds: u64,
}

impl Default for ProjectSpec {
    fn default() -> Self {
        Self {
            distribution: Distribution::default(),
            distribution_config: None,
            registry: RegistrySettings::default(),
            mirror_registries: Vec::new(),
            engine_timeout_seconds: default_engine_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySettings {
    /// Overrides the default registry image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Overrides the loopback bind address for published ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_address: Option<String>,
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

fn default_engine_timeout() -> u64 {
    DEFAULT_ENGINE_TIMEOUT_SECS
}

impl ProjectConfig {
    pub fn from_yaml(contents: &str, origin: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ProjectConfig =
            serde_yaml_ng::from_str(contents).map_err(|source| ConfigError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn cluster_name(&self) -> &str {
        &self.metadata.name
    }

    pub fn distribution(&self) -> Distribution {
        self.spec.distribution
    }

    /// Applies `KDEV_*` overrides on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("KDEV_CLUSTER_NAME").filter(|v| !v.is_empty()) {
            self.metadata.name = name;
        }
        if let Some(distribution) = lookup("KDEV_DISTRIBUTION").filter(|v| !v.is_empty()) {
            self.spec.distribution = distribution.parse()?;
        }
        if let Some(image) = lookup("KDEV_REGISTRY_IMAGE").filter(|v| !v.is_empty()) {
            self.spec.registry.image = Some(image);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metadata.name must not be empty".to_string(),
            ));
        }
        if self.spec.engine_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "spec.engineTimeoutSeconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
