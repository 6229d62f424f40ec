// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use tracing::debug;

// Internal imports
use crate::distribution::Distribution;
use crate::error::{ConfigError, Result};
use crate::k3d::K3dConfig;
use crate::kind::KindConfig;
use crate::project::ProjectConfig;

pub const PROJECT_FILE: &str = "kdev.yaml";

/// A distribution config, already parsed into its dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionConfig {
    Kind(KindConfig),
    K3d(K3dConfig),
}

impl DistributionConfig {
    pub fn distribution(&self) -> Distribution {
        match self {
            DistributionConfig::Kind(_) => Distribution::Kind,
            DistributionConfig::K3d(_) => Distribution::K3d,
        }
    }
}

/// A loader responsible for finding and loading the `kdev.yaml` project file.
///
/// Discovery order:
/// 1. **Explicit path:** the `--config` argument, when given.
/// 2. **Current Directory:** `kdev.yaml` in the working directory.
/// 3. **Parent Directories:** walks up the tree looking for `kdev.yaml`.
///
/// When nothing is found the defaults are used, so a bare `kdev` invocation
/// still works against a Kind cluster named `kdev`.
#[derive(Default)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Loads the project config and applies environment overrides.
    pub fn load(&self) -> Result<ProjectConfig> {
        let mut config = match self.locate()? {
            Some(path) => {
                debug!("Loading config from: {}", path.display());
                load_project_file(&path)?
            }
            None => {
                debug!("No {} found, using defaults", PROJECT_FILE);
                ProjectConfig::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn locate(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                return Err(ConfigError::Missing(path.display().to_string()));
            }
            return Ok(Some(path.clone()));
        }

        let current_dir = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(find_in_parent_dirs(&current_dir, PROJECT_FILE))
    }
}

/// Finds a file by walking up the directory tree from `start`.
pub fn find_in_parent_dirs(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

pub fn load_project_file(path: &Path) -> Result<ProjectConfig> {
    let contents = read(path)?;
    let mut config = ProjectConfig::from_yaml(&contents, &path.display().to_string())?;
    config.source_path = Some(path.to_path_buf());
    Ok(config)
}

/// Where a project's distribution config lives. Relative paths resolve
/// against the project file's directory.
pub fn distribution_config_path(project: &ProjectConfig) -> PathBuf {
    let distribution = project.distribution();
    let base_dir = project
        .source_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let relative = project
        .spec
        .distribution_config
        .clone()
        .unwrap_or_else(|| PathBuf::from(distribution.default_config_file()));
    if relative.is_absolute() {
        relative
    } else {
        base_dir.join(relative)
    }
}

/// Loads the distribution config referenced by a project.
///
/// A missing file is not an error: the distribution then declares no
/// registries.
pub fn load_distribution_config(project: &ProjectConfig) -> Result<DistributionConfig> {
    let distribution = project.distribution();
    let path = distribution_config_path(project);

    let contents = if path.exists() {
        debug!("Loading {} config from: {}", distribution, path.display());
        read(&path)?
    } else {
        debug!(
            "{} config {} not found, assuming no registries",
            distribution,
            path.display()
        );
        String::new()
    };

    let origin = path.display().to_string();
    Ok(match distribution {
        Distribution::Kind => DistributionConfig::Kind(KindConfig::from_yaml(&contents, &origin)?),
        Distribution::K3d => DistributionConfig::K3d(K3dConfig::from_yaml(&contents, &origin)?),
    })
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_in_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a").join(PROJECT_FILE), "metadata:\n  name: x\n").unwrap();

        let found = find_in_parent_dirs(&nested, PROJECT_FILE).unwrap();
        assert_eq!(found, dir.path().join("a").join(PROJECT_FILE));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let loader = ConfigLoader::new(Some(PathBuf::from("/definitely/not/here/kdev.yaml")));
        assert!(matches!(loader.load(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_distribution_config_path_defaults_next_to_project() {
        let mut project = ProjectConfig::default();
        project.spec.distribution = Distribution::K3d;
        project.source_path = Some(PathBuf::from("/work/app/kdev.yaml"));
        assert_eq!(
            distribution_config_path(&project),
            PathBuf::from("/work/app/k3d.yaml")
        );

        project.spec.distribution_config = Some(PathBuf::from("/etc/k3d/dev.yaml"));
        assert_eq!(
            distribution_config_path(&project),
            PathBuf::from("/etc/k3d/dev.yaml")
        );
    }
}
