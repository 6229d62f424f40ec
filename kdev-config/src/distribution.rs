//! Kubernetes distribution identifiers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The cluster tool a project provisions with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Distribution {
    #[default]
    #[serde(alias = "kind")]
    Kind,
    #[serde(alias = "k3d")]
    K3d,
}

impl Distribution {
    /// Prefix the distribution puts in front of the names it owns.
    pub fn prefix(&self) -> &'static str {
        match self {
            Distribution::Kind => "kind",
            Distribution::K3d => "k3d",
        }
    }

    /// Name of the external binary that provisions clusters.
    pub fn binary(&self) -> &'static str {
        self.prefix()
    }

    /// Default distribution config file name next to `kdev.yaml`.
    pub fn default_config_file(&self) -> &'static str {
        match self {
            Distribution::Kind => "kind.yaml",
            Distribution::K3d => "k3d.yaml",
        }
    }

    /// Engine network the cluster's node containers are attached to.
    ///
    /// Every Kind cluster shares the single `kind` network, while K3d
    /// creates one network per cluster.
    pub fn network_name(&self, cluster: &str) -> String {
        match self {
            Distribution::Kind => "kind".to_string(),
            Distribution::K3d => format!("k3d-{cluster}"),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Kind => write!(f, "Kind"),
            Distribution::K3d => write!(f, "K3d"),
        }
    }
}

impl FromStr for Distribution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kind" => Ok(Distribution::Kind),
            "k3d" => Ok(Distribution::K3d),
            other => Err(ConfigError::Invalid(format!(
                "unknown distribution '{other}' (expected Kind or K3d)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        assert_eq!(Distribution::Kind.network_name("dev"), "kind");
        assert_eq!(Distribution::K3d.network_name("dev"), "k3d-dev");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("KIND".parse::<Distribution>().unwrap(), Distribution::Kind);
        assert_eq!(" k3d ".parse::<Distribution>().unwrap(), Distribution::K3d);
        assert!("minikube".parse::<Distribution>().is_err());
    }

    #[test]
    fn test_deserialize_accepts_lowercase_alias() {
        let d: Distribution = serde_yaml_ng::from_str("k3d").unwrap();
        assert_eq!(d, Distribution::K3d);
        let d: Distribution = serde_yaml_ng::from_str("Kind").unwrap();
        assert_eq!(d, Distribution::Kind);
    }
}
