//! Error types for the registry subsystem.

use kdev_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// A K3d `registries.use` entry that is not `<name>:<port>`.
    #[error("invalid registry reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("invalid registry spec: {0}")]
    InvalidSpec(String),

    /// An engine call failed; `op` names the call and `resource` its target.
    #[error("failed to {op} '{resource}': {source}")]
    Operation {
        op: &'static str,
        resource: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to render registry config: {0}")]
    Render(#[from] tera::Error),

    #[error("failed to write registry config: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Wraps an engine error with the operation and resource it concerned.
    pub(crate) fn op(
        op: &'static str,
        resource: impl Into<String>,
    ) -> impl FnOnce(EngineError) -> RegistryError {
        let resource = resource.into();
        move |source| RegistryError::Operation {
            op,
            resource,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
