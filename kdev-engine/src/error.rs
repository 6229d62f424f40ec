//! Error types for container engine operations.

use std::fmt;
use thiserror::Error;

/// Kind of engine object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Container,
    Image,
    Volume,
    Network,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Container => "container",
            ResourceKind::Image => "image",
            ResourceKind::Volume => "volume",
            ResourceKind::Network => "network",
        };
        f.write_str(s)
    }
}

/// Errors returned by an [`EngineClient`](crate::EngineClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Every detection candidate failed to connect or to answer a ping.
    #[error("no container engine available")]
    NoEngineAvailable,

    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("engine API error: {0}")]
    Api(String),
}

impl EngineError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
