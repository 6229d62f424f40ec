//! Kind cluster configuration (`kind.x-k8s.io/v1alpha4`).
//!
//! Only the fields the registry subsystem reads are modelled; everything
//! else in the document is accepted and ignored.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form containerd TOML fragments merged into every node.
    #[serde(default)]
    pub containerd_config_patches: Vec<String>,
}

impl KindConfig {
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
