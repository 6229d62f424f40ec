//! Configuration generation for pull-through registries

use std::io::Write;
use tempfile::NamedTempFile;
use tera::{Context as TeraContext, Tera};

use crate::error::Result;
use crate::{DEFAULT_REGISTRY_PORT, REGISTRY_DATA_PATH};

const PROXY_CONFIG_TEMPLATE: &str = r#"version: 0.1
log:
  level: info
  fields:
    service: registry
storage:
  filesystem:
    rootdirectory: {{ data_path }}
  cache:
    blobdescriptor: inmemory
  delete:
    enabled: true
http:
  addr: :{{ port }}
  headers:
    X-Content-Type-Options: [nosniff]
health:
  storagedriver:
    enabled: true
    interval: 10s
    threshold: 3
proxy:
  remoteurl: "{{ upstream_url }}"
"#;

/// Where the image expects its config file. `registry:2` predates the
/// move to the distribution project's paths.
pub fn config_mount_path(image: &str) -> &'static str {
    let tag = image.rsplit_once(':').map(|(_, tag)| tag).unwrap_or("");
    if image.contains("registry") && tag.starts_with('2') {
        "/etc/docker/registry/config.yml"
    } else {
        "/etc/distribution/config.yml"
    }
}

/// Renders the registry config that proxies pulls to `upstream_url`.
pub fn render_proxy_config(upstream_url: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("data_path", REGISTRY_DATA_PATH);
    context.insert("port", &DEFAULT_REGISTRY_PORT);
    context.insert("upstream_url", upstream_url);

    Ok(Tera::one_off(PROXY_CONFIG_TEMPLATE, &context, false)?)
}

/// Writes the proxy config to a temporary file that is deleted on drop.
pub fn write_proxy_config(upstream_url: &str) -> Result<NamedTempFile> {
    let rendered = render_proxy_config(upstream_url)?;
    let mut file = tempfile::Builder::new()
        .prefix("kdev-registry-")
        .suffix(".yml")
        .tempfile()?;
    file.write_all(rendered.as_bytes())?;
    file.flush()?;
    Ok(file)
}
