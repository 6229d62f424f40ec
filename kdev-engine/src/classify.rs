//! Engine identity classification.

use std::fmt;

/// Which engine answered the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Docker,
    Podman,
    /// The engine answered a ping but refused the version query.
    Unknown,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Docker => write!(f, "Docker"),
            EngineKind::Podman => write!(f, "Podman"),
            EngineKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Classification given to a version string that names neither engine.
///
/// Anything that speaks the Docker API without saying what it is gets
/// reported as Docker. Colima, Rancher Desktop and OrbStack all land here.
pub const UNRECOGNIZED_ENGINE: EngineKind = EngineKind::Docker;

/// Classifies an engine from its platform/version string.
///
/// Podman is checked first because its compat API also mentions Docker
/// in some component names.
pub fn classify(version: &str) -> EngineKind {
    let lowered = version.to_ascii_lowercase();
    if lowered.contains("podman") {
        EngineKind::Podman
    } else if lowered.contains("docker") {
        EngineKind::Docker
    } else {
        UNRECOGNIZED_ENGINE
    }
}
