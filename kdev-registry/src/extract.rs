//! Registry reference extraction from distribution configs.
//!
//! Each dialect has its own parser. K3d references are strict and fail
//! loudly; Kind patches are free-form TOML fragments, so anything that does
//! not match is skipped without error.

use kdev_config::{Distribution, DistributionConfig, K3dConfig, KindConfig};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::types::RegistrySpec;
use crate::{DEFAULT_REGISTRY_IMAGE, DEFAULT_REGISTRY_PORT};

fn mirror_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\[\s*plugins\.[^\]\n]*?\.registry\.mirrors\."([^"]+)"\s*\]"#)
            .expect("mirror section pattern is valid")
    })
}

fn endpoint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"endpoint\s*=\s*\[\s*"(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?([^":/\]\s]+)(?::(\d+))?"#)
            .expect("endpoint pattern is valid")
    })
}

fn image_or_default(image: Option<&str>) -> &str {
    image.unwrap_or(DEFAULT_REGISTRY_IMAGE)
}

/// Parses K3d `registries.use` entries of the form `<name>:<port>`.
pub fn parse_k3d_registries(config: &K3dConfig, image: Option<&str>) -> Result<Vec<RegistrySpec>> {
    config
        .registries
        .use_refs
        .iter()
        .map(|reference| parse_k3d_reference(reference, image))
        .collect()
}

fn parse_k3d_reference(reference: &str, image: Option<&str>) -> Result<RegistrySpec> {
    let invalid = |reason: &str| RegistryError::InvalidReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = reference.split(':').collect();
    if parts.len() != 2 {
        return Err(invalid("expected <name>:<port>"));
    }
    let (name, port) = (parts[0].trim(), parts[1].trim());
    if name.is_empty() {
        return Err(invalid("registry name is empty"));
    }
    let port: u16 = port
        .parse()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| invalid("port must be a number between 1 and 65535"))?;

    Ok(RegistrySpec::new(name)
        .with_host_port(port)
        .with_image(image_or_default(image)))
}

/// Extracts mirror registries from Kind `containerdConfigPatches`.
///
/// Within a patch, the i-th mirror section is paired with the i-th endpoint
/// declaration. The name comes from the endpoint host and the host port from
/// the mirror key, defaulting to [`DEFAULT_REGISTRY_PORT`]. Duplicate
/// `(name, port)` pairs across patches collapse into one spec.
pub fn parse_kind_patches(config: &KindConfig, image: Option<&str>) -> Vec<RegistrySpec> {
    let mut seen: BTreeSet<(String, u16)> = BTreeSet::new();
    let mut specs = Vec::new();

    for patch in &config.containerd_config_patches {
        let mirrors: Vec<&str> = mirror_section_re()
            .captures_iter(patch)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let endpoints: Vec<&str> = endpoint_re()
            .captures_iter(patch)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        if mirrors.len() != endpoints.len() {
            debug!(
                mirrors = mirrors.len(),
                endpoints = endpoints.len(),
                "Kind patch has unpaired mirror sections"
            );
        }

        for (mirror_key, endpoint_host) in mirrors.iter().zip(endpoints.iter()) {
            let Some(host_port) = mirror_key_port(mirror_key) else {
                debug!(mirror = %mirror_key, "Skipping mirror with unparseable port");
                continue;
            };
            let name = endpoint_host.to_string();
            if !seen.insert((name.clone(), host_port)) {
                continue;
            }
            specs.push(
                RegistrySpec::new(name)
                    .with_host_port(host_port)
                    .with_image(image_or_default(image)),
            );
        }
    }

    specs
}

/// Port in a `host[:port]` mirror key. `None` when a port is present but
/// not a valid number.
fn mirror_key_port(key: &str) -> Option<u16> {
    match key.rsplit_once(':') {
        Some((_, port)) => port.parse().ok().filter(|p| *p != 0),
        None => Some(DEFAULT_REGISTRY_PORT),
    }
}

/// Parses `<host>=<upstream-url>` mirror flags into pull-through specs.
///
/// Names are `<distribution>-<host>` with dots and colons replaced by
/// dashes. Host ports are handed out upward from [`DEFAULT_REGISTRY_PORT`],
/// skipping `taken_ports`.
pub fn parse_mirror_flags(
    flags: &[String],
    distribution: Distribution,
    taken_ports: &BTreeSet<u16>,
    image: Option<&str>,
) -> Result<Vec<RegistrySpec>> {
    let mut used = taken_ports.clone();
    let mut next_port = DEFAULT_REGISTRY_PORT;
    let mut specs = Vec::with_capacity(flags.len());

    for flag in flags {
        let invalid = |reason: &str| RegistryError::InvalidReference {
            reference: flag.clone(),
            reason: reason.to_string(),
        };

        let (host, upstream) = flag
            .split_once('=')
            .map(|(h, u)| (h.trim(), u.trim()))
            .ok_or_else(|| invalid("expected <host>=<upstream-url>"))?;
        if host.is_empty() || upstream.is_empty() {
            return Err(invalid("host and upstream must both be set"));
        }
        if !(upstream.starts_with("http://") || upstream.starts_with("https://")) {
            return Err(invalid("upstream must be an http:// or https:// URL"));
        }

        while used.contains(&next_port) {
            next_port = next_port
                .checked_add(1)
                .ok_or_else(|| invalid("no free host port left"))?;
        }
        used.insert(next_port);

        let name = format!(
            "{}-{}",
            distribution.prefix(),
            host.replace(['.', ':'], "-")
        );
        specs.push(
            RegistrySpec::new(name)
                .with_host_port(next_port)
                .with_upstream(upstream)
                .with_image(image_or_default(image)),
        );
    }

    Ok(specs)
}

/// Inputs to [`plan_registries`] beyond the distribution config.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions<'a> {
    pub cluster: &'a str,
    pub image: Option<&'a str>,
    pub host_address: Option<&'a str>,
    pub mirrors: &'a [String],
}

/// Every registry a cluster needs, in the order they should be ensured:
/// those declared by the distribution config, then mirror flags whose name
/// is not already taken.
pub fn plan_registries(
    config: &DistributionConfig,
    options: &PlanOptions<'_>,
) -> Result<Vec<RegistrySpec>> {
    let distribution = config.distribution();
    let mut specs = match config {
        DistributionConfig::K3d(k3d) => parse_k3d_registries(k3d, options.image)?,
        DistributionConfig::Kind(kind) => parse_kind_patches(kind, options.image),
    };

    let taken: BTreeSet<u16> = specs.iter().filter_map(|s| s.host_port).collect();
    for mirror in parse_mirror_flags(options.mirrors, distribution, &taken, options.image)? {
        if specs.iter().any(|s| s.name == mirror.name) {
            debug!(registry = %mirror.name, "Mirror already declared by distribution config");
            continue;
        }
        specs.push(mirror);
    }

    Ok(specs
        .into_iter()
        .map(|spec| {
            let spec = spec.for_cluster(distribution, options.cluster);
            match options.host_address {
                Some(address) => spec.with_host_address(address),
                None => spec,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdev_config::k3d::K3dRegistries;

    fn k3d(refs: &[&str]) -> K3dConfig {
        K3dConfig {
            registries: K3dRegistries {
                use_refs: refs.iter().map(|r| r.to_string()).collect(),
            },
            ..Default::default()
        }
    }

    fn kind(patches: &[&str]) -> KindConfig {
        KindConfig {
            name: None,
            containerd_config_patches: patches.iter().map(|p| p.to_string()).collect(),
        }
    }

    const LOCAL_PATCH: &str = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."localhost:5001"]
  endpoint = ["http://kind-registry:5000"]"#;

    #[test]
    fn test_k3d_reference() {
        let specs = parse_k3d_registries(&k3d(&["k3d-registry:5000"]), None).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "k3d-registry");
        assert_eq!(specs[0].host_port, Some(5000));
        assert_eq!(specs[0].image, DEFAULT_REGISTRY_IMAGE);
        assert!(specs[0].upstream_url.is_none());
    }

    #[test]
    fn test_k3d_reference_without_colon_fails() {
        let err = parse_k3d_registries(&k3d(&["badformat"]), None).unwrap_err();
        match err {
            RegistryError::InvalidReference { reference, .. } => assert_eq!(reference, "badformat"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_k3d_reference_with_extra_segment_fails() {
        assert!(parse_k3d_registries(&k3d(&["host:5000:extra"]), None).is_err());
        assert!(parse_k3d_registries(&k3d(&[":5000"]), None).is_err());
        assert!(parse_k3d_registries(&k3d(&["reg:http"]), None).is_err());
    }

    #[test]
    fn test_k3d_one_bad_reference_fails_whole_list() {
        assert!(parse_k3d_registries(&k3d(&["good:5000", "bad"]), None).is_err());
    }

    #[test]
    fn test_k3d_image_override() {
        let specs = parse_k3d_registries(&k3d(&["r:5000"]), Some("registry:2")).unwrap();
        assert_eq!(specs[0].image, "registry:2");
    }

    #[test]
    fn test_kind_patch() {
        let specs = parse_kind_patches(&kind(&[LOCAL_PATCH]), None);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "kind-registry");
        assert_eq!(specs[0].host_port, Some(5001));
        assert_eq!(specs[0].image, DEFAULT_REGISTRY_IMAGE);
    }

    #[test]
    fn test_kind_mirror_without_port_uses_default() {
        let patch = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."docker.io"]
  endpoint = ["http://kind-docker-io:5000"]"#;
        let specs = parse_kind_patches(&kind(&[patch]), None);
        assert_eq!(specs[0].name, "kind-docker-io");
        assert_eq!(specs[0].host_port, Some(DEFAULT_REGISTRY_PORT));
    }

    #[test]
    fn test_kind_duplicates_across_patches_collapse() {
        let specs = parse_kind_patches(&kind(&[LOCAL_PATCH, LOCAL_PATCH]), None);
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_kind_positional_pairing() {
        let patch = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."docker.io"]
  endpoint = ["http://kind-docker-io:5000"]
[plugins."io.containerd.grpc.v1.cri".registry.mirrors."ghcr.io:5002"]
  endpoint = ["http://kind-ghcr-io:5000"]"#;
        let specs = parse_kind_patches(&kind(&[patch]), None);
        let pairs: Vec<(&str, Option<u16>)> =
            specs.iter().map(|s| (s.name.as_str(), s.host_port)).collect();
        assert_eq!(
            pairs,
            vec![("kind-docker-io", Some(5000)), ("kind-ghcr-io", Some(5002))]
        );
    }

    #[test]
    fn test_kind_unmatched_patch_is_skipped() {
        let unrelated = r#"[plugins."io.containerd.grpc.v1.cri".containerd]
  snapshotter = "overlayfs""#;
        let no_endpoint = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."localhost:5001"]"#;
        assert!(parse_kind_patches(&kind(&[unrelated, no_endpoint, "garbage ["]), None).is_empty());
    }

    #[test]
    fn test_kind_bad_mirror_port_is_skipped() {
        let patch = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."localhost:abc"]
  endpoint = ["http://kind-registry:5000"]"#;
        assert!(parse_kind_patches(&kind(&[patch]), None).is_empty());
    }

    #[test]
    fn test_mirror_flags_allocate_ports() {
        let flags = vec![
            "docker.io=https://registry-1.docker.io".to_string(),
            "ghcr.io=https://ghcr.io".to_string(),
        ];
        let taken = BTreeSet::from([5000]);
        let specs = parse_mirror_flags(&flags, Distribution::Kind, &taken, None).unwrap();

        assert_eq!(specs[0].name, "kind-docker-io");
        assert_eq!(specs[0].host_port, Some(5001));
        assert_eq!(specs[0].upstream_url.as_deref(), Some("https://registry-1.docker.io"));
        assert_eq!(specs[1].name, "kind-ghcr-io");
        assert_eq!(specs[1].host_port, Some(5002));
    }

    #[test]
    fn test_mirror_flags_reject_malformed() {
        let bad = |flag: &str| {
            parse_mirror_flags(&[flag.to_string()], Distribution::K3d, &BTreeSet::new(), None)
                .is_err()
        };
        assert!(bad("docker.io"));
        assert!(bad("=https://x"));
        assert!(bad("docker.io="));
        assert!(bad("docker.io=registry-1.docker.io"));
    }

    #[test]
    fn test_plan_scopes_specs_to_cluster() {
        let config = DistributionConfig::K3d(k3d(&["k3d-registry:5000"]));
        let mirrors = vec!["docker.io=https://registry-1.docker.io".to_string()];
        let specs = plan_registries(
            &config,
            &PlanOptions {
                cluster: "dev",
                image: None,
                host_address: Some("0.0.0.0"),
                mirrors: &mirrors,
            },
        )
        .unwrap();

        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|s| s.network_name.as_deref() == Some("k3d-dev")));
        assert!(specs.iter().all(|s| s.host_address == "0.0.0.0"));
        assert_eq!(specs[1].name, "k3d-docker-io");
        assert_eq!(specs[1].host_port, Some(5001));
    }

    #[test]
    fn test_plan_skips_mirror_already_declared() {
        let patch = r#"[plugins."io.containerd.grpc.v1.cri".registry.mirrors."docker.io"]
  endpoint = ["http://kind-docker-io:5000"]"#;
        let config = DistributionConfig::Kind(kind(&[patch]));
        let mirrors = vec!["docker.io=https://registry-1.docker.io".to_string()];
        let specs = plan_registries(
            &config,
            &PlanOptions {
                cluster: "dev",
                mirrors: &mirrors,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].network_name.as_deref(), Some("kind"));
    }
}
