//! Undo actions for a partially completed ensure.
//!
//! Each step that creates something records how to remove it. On failure
//! the actions run in reverse order; each is best-effort and a failing
//! action does not stop the ones after it.

use kdev_engine::{EngineClient, EngineError};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    RemoveContainer(String),
    RemoveVolume(String),
}

impl Compensation {
    async fn run(&self, client: &dyn EngineClient) -> Result<(), EngineError> {
        match self {
            Compensation::RemoveContainer(name) => client.remove_container(name).await,
            Compensation::RemoveVolume(name) => client.remove_volume(name).await,
        }
    }
}

#[derive(Debug, Default)]
pub struct Compensations {
    actions: Vec<Compensation>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Compensation) {
        self.actions.push(action);
    }

    /// Runs every action, newest first, and returns the ones that failed.
    pub async fn unwind(self, client: &dyn EngineClient) -> Vec<(Compensation, EngineError)> {
        let mut failures = Vec::new();
        for action in self.actions.into_iter().rev() {
            match action.run(client).await {
                Ok(()) => debug!(?action, "Rolled back"),
                Err(e) if e.is_not_found() => debug!(?action, "Nothing to roll back"),
                Err(e) => {
                    warn!(?action, "Rollback failed: {}", e);
                    failures.push((action, e));
                }
            }
        }
        failures
    }
}
