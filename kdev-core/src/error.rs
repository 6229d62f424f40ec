use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Top-level error surfaced by the `kdev` binary.
///
/// Library crates keep their own typed errors; these are the failures the
/// command layer raises itself.
#[derive(Error, Debug)]
pub enum KdevError {
    Engine(String),
    Command(String),
    Dependency(String),
    Timeout(String),
    NoEngineAvailable,
}

impl Display for KdevError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            KdevError::Engine(s) => write!(f, "Container engine error: {}", s),
            KdevError::Command(s) => write!(f, "Command failed: {}", s),
            KdevError::Dependency(s) => write!(f, "Dependency not found: {}", s),
            KdevError::Timeout(s) => write!(f, "Timed out: {}", s),
            KdevError::NoEngineAvailable => {
                write!(f, "No container engine is available\n\n")?;
                write!(f, "Fix:\n")?;
                write!(f, "  • Start Docker Desktop, or\n")?;
                write!(f, "  • Run: sudo systemctl start docker, or\n")?;
                write!(f, "  • Run: systemctl --user start podman.socket\n")?;
                write!(f, "  • Verify: docker ps")
            }
        }
    }
}

impl KdevError {
    /// Whether the error means no engine answered, as opposed to an engine
    /// that answered with a failure.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, KdevError::NoEngineAvailable)
    }
}

pub type Result<T> = std::result::Result<T, KdevError>;
