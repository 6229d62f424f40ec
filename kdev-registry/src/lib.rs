//! # kdev registry
//!
//! Mirror registries that must exist before a Kind or K3d cluster is
//! created, and that must survive as long as any cluster still uses them.
//!
//! ## Features
//!
//! - **Reference extraction**: reads K3d `registries.use`, Kind
//!   `containerdConfigPatches` and `host=upstream` mirror flags into
//!   [`RegistrySpec`]s
//! - **Idempotent ensure**: repeated runs never duplicate containers or volumes
//! - **Pull-through mode**: specs with an upstream get a rendered proxy config
//! - **Shared-aware teardown**: a registry still attached to another
//!   cluster's network is left running
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kdev_registry::{manager, RegistrySpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = kdev_engine::detect(Vec::new()).await?;
//! let spec = RegistrySpec::new("kind-registry").with_host_port(5001);
//! manager::ensure(&engine, &spec).await?;
//! # Ok(())
//! # }
//! ```

pub mod compensation;
pub mod config;
pub mod error;
pub mod extract;
pub mod manager;
pub mod types;

pub use error::{RegistryError, Result};
pub use extract::{parse_k3d_registries, parse_kind_patches, parse_mirror_flags, plan_registries};
pub use manager::{
    ensure, ensure_all, ensure_network, list_managed, release_network, teardown, teardown_all,
    BatchResults,
};
pub use types::{
    is_cluster_network, resolve_volume_name, EnsureOutcome, ManagedRegistry, RegistrySpec,
    TeardownOutcome,
};

/// Image used for every registry unless the caller overrides it.
pub const DEFAULT_REGISTRY_IMAGE: &str = "registry:3";

/// Port the registry listens on inside its container, and the first host
/// port handed out when none is given.
pub const DEFAULT_REGISTRY_PORT: u16 = 5000;

/// Host address published ports bind to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Label carried by every container and volume this crate creates. Its
/// value is the registry name.
pub const REGISTRY_LABEL: &str = "io.kdev.registry";

/// Label recording which cluster first created the registry.
pub const CLUSTER_LABEL: &str = "io.kdev.cluster";

/// Where the registry stores blobs inside its container.
pub const REGISTRY_DATA_PATH: &str = "/var/lib/registry";
