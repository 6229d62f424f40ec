//! Engine-neutral descriptions of containers, mounts and filters.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Volume,
    Bind,
}

/// A mount requested at container creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub kind: MountKind,
    /// Volume name for [`MountKind::Volume`], host path for [`MountKind::Bind`].
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn volume(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Volume,
            source: name.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn bind_read_only(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Bind,
            source: path.into(),
            target: target.into(),
            read_only: true,
        }
    }

    /// `source:target[:ro]`, the form the engine API accepts in `Binds`.
    pub fn to_bind_string(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.source, self.target)
        } else {
            format!("{}:{}", self.source, self.target)
        }
    }
}

/// A published TCP port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_ip: String,
    pub host_port: u16,
}

/// Everything needed to create a container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub port: Option<PortMapping>,
    pub mounts: Vec<VolumeMount>,
    /// Restart with the engine daemon and after crashes.
    pub restart_always: bool,
    pub network: Option<String>,
}

/// A mount as reported by inspecting a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub kind: MountKind,
    /// Volume name; `None` for bind mounts.
    pub name: Option<String>,
    pub source: String,
    pub destination: String,
}

/// Row from a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub labels: BTreeMap<String, String>,
    pub networks: BTreeSet<String>,
}

/// Result of inspecting a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub labels: BTreeMap<String, String>,
    pub networks: BTreeSet<String>,
    pub mounts: Vec<MountInfo>,
}

impl ContainerDetails {
    /// Name of the volume mounted at `destination`, if any.
    pub fn volume_at(&self, destination: &str) -> Option<&str> {
        self.mounts
            .iter()
            .find(|m| m.kind == MountKind::Volume && m.destination == destination)
            .and_then(|m| m.name.as_deref())
    }
}

/// Filter for [`EngineClient::list_containers`](crate::EngineClient::list_containers).
///
/// Engines match `name` as a substring; callers wanting an exact match
/// compare [`ContainerSummary::name`] themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerFilter {
    pub name: Option<String>,
    /// `key` alone matches any value.
    pub label: Option<(String, Option<String>)>,
}

impl ContainerFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            label: None,
        }
    }

    pub fn by_label(key: impl Into<String>) -> Self {
        Self {
            name: None,
            label: Some((key.into(), None)),
        }
    }

    /// The `label=` filter value in engine API syntax.
    pub fn label_expr(&self) -> Option<String> {
        self.label.as_ref().map(|(key, value)| match value {
            Some(v) => format!("{key}={v}"),
            None => key.clone(),
        })
    }

    pub fn matches(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        let name_ok = self.name.as_ref().is_none_or(|n| name.contains(n.as_str()));
        let label_ok = self.label.as_ref().is_none_or(|(key, value)| {
            labels
                .get(key)
                .is_some_and(|v| value.as_ref().is_none_or(|want| want == v))
        });
        name_ok && label_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_strings() {
        assert_eq!(
            VolumeMount::volume("data", "/var/lib/registry").to_bind_string(),
            "data:/var/lib/registry"
        );
        assert_eq!(
            VolumeMount::bind_read_only("/tmp/c.yml", "/etc/c.yml").to_bind_string(),
            "/tmp/c.yml:/etc/c.yml:ro"
        );
    }

    #[test]
    fn test_filter_matching() {
        let mut labels = BTreeMap::new();
        labels.insert("io.kdev.registry".to_string(), "kind-registry".to_string());

        assert!(ContainerFilter::by_name("registry").matches("kind-registry", &labels));
        assert!(ContainerFilter::by_label("io.kdev.registry").matches("x", &labels));
        assert!(!ContainerFilter::by_label("other").matches("x", &labels));

        let exact = ContainerFilter {
            name: None,
            label: Some(("io.kdev.registry".to_string(), Some("nope".to_string()))),
        };
        assert!(!exact.matches("kind-registry", &labels));
        assert_eq!(exact.label_expr().as_deref(), Some("io.kdev.registry=nope"));
    }

    #[test]
    fn test_volume_at() {
        let details = ContainerDetails {
            id: "abc".into(),
            name: "reg".into(),
            image: "registry:3".into(),
            running: true,
            labels: BTreeMap::new(),
            networks: BTreeSet::new(),
            mounts: vec![
                MountInfo {
                    kind: MountKind::Bind,
                    name: None,
                    source: "/tmp/config.yml".into(),
                    destination: "/etc/distribution/config.yml".into(),
                },
                MountInfo {
                    kind: MountKind::Volume,
                    name: Some("reg-data".into()),
                    source: "/var/lib/docker/volumes/reg-data/_data".into(),
                    destination: "/var/lib/registry".into(),
                },
            ],
        };
        assert_eq!(details.volume_at("/var/lib/registry"), Some("reg-data"));
        assert_eq!(details.volume_at("/etc/distribution/config.yml"), None);
    }
}
