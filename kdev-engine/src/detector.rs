//! Container engine detection.
//!
//! Candidates are tried in order and the first one that both connects and
//! answers a ping wins. There is no retry and no ranking between engines.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::classify::{classify, EngineKind};
use crate::client::EngineClient;
use crate::error::{EngineError, Result};

/// Builds a client for one connection strategy.
pub type ClientFactory = Box<dyn Fn() -> Result<Arc<dyn EngineClient>> + Send + Sync>;

/// A named connection strategy.
pub struct Candidate {
    pub name: String,
    connect: ClientFactory,
}

impl Candidate {
    pub fn new<F>(name: impl Into<String>, connect: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EngineClient>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            connect: Box::new(connect),
        }
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("name", &self.name).finish()
    }
}

/// A live engine client and what it was classified as.
///
/// Created once per invocation and never mutated afterwards.
#[derive(Clone)]
pub struct EngineHandle {
    client: Arc<dyn EngineClient>,
    kind: EngineKind,
    source: String,
}

impl EngineHandle {
    pub fn new(client: Arc<dyn EngineClient>, kind: EngineKind, source: impl Into<String>) -> Self {
        Self {
            client,
            kind,
            source: source.into(),
        }
    }

    pub fn client(&self) -> &dyn EngineClient {
        self.client.as_ref()
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Name of the candidate that answered.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

/// Returns the first candidate that connects and answers a ping.
///
/// An empty list means [`crate::docker::default_candidates`].
pub async fn detect(candidates: Vec<Candidate>) -> Result<EngineHandle> {
    let candidates = if candidates.is_empty() {
        crate::docker::default_candidates()
    } else {
        candidates
    };

    for candidate in candidates {
        let client = match (candidate.connect)() {
            Ok(client) => client,
            Err(e) => {
                debug!(engine = %candidate.name, "Engine candidate failed to connect: {}", e);
                continue;
            }
        };

        if let Err(e) = client.ping().await {
            debug!(engine = %candidate.name, "Engine candidate did not answer ping: {}", e);
            continue;
        }

        let kind = match client.server_version().await {
            Ok(version) => classify(&version),
            Err(e) => {
                debug!(engine = %candidate.name, "Engine version query failed: {}", e);
                EngineKind::Unknown
            }
        };

        debug!(engine = %candidate.name, kind = %kind, "Container engine detected");
        return Ok(EngineHandle::new(client, kind, candidate.name));
    }

    Err(EngineError::NoEngineAvailable)
}
