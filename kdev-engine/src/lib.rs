//! # kdev engine
//!
//! Talks to whichever Docker-compatible container engine is running on the
//! host. Detection probes a list of connection strategies and hands back an
//! [`EngineHandle`]; everything else goes through the [`EngineClient`] trait.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), kdev_engine::EngineError> {
//! let engine = kdev_engine::detect(Vec::new()).await?;
//! println!("using {} via {}", engine.kind(), engine.source());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod detector;
pub mod docker;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use classify::{classify, EngineKind, UNRECOGNIZED_ENGINE};
pub use client::EngineClient;
pub use detector::{detect, Candidate, ClientFactory, EngineHandle};
pub use docker::{default_candidates, BollardClient};
pub use error::{EngineError, ResourceKind, Result};
pub use types::{
    ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary, MountInfo, MountKind,
    PortMapping, VolumeMount,
};
