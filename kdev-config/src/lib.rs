//! Configuration for kdev: the `kdev.yaml` project file and the Kind/K3d
//! distribution configs it points at.

pub mod distribution;
pub mod error;
pub mod k3d;
pub mod kind;
pub mod loader;
pub mod project;

pub use distribution::Distribution;
pub use error::ConfigError;
pub use k3d::K3dConfig;
pub use kind::KindConfig;
pub use loader::{
    distribution_config_path, load_distribution_config, ConfigLoader, DistributionConfig,
};
pub use project::ProjectConfig;
