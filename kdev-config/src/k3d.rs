//! K3d simple configuration (`k3d.io/v1alpha5`).

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K3dConfig {
    #[serde(default)]
    pub metadata: K3dMetadata,
    #[serde(default)]
    pub registries: K3dRegistries,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K3dMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K3dRegistries {
    /// Registry references of the form `<name>:<port>`.
    #[serde(default, rename = "use")]
    pub use_refs: Vec<String>,
}

impl K3dConfig {
    pub fn from_yaml(contents: &str, origin: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }
}
