//! `kdev engine`

use anyhow::Result;
use std::time::Duration;

use super::{connect_engine, with_timeout};
use kdev_core::{kdev_println, kdev_success};

/// Detect the engine and report which candidate answered.
pub async fn handle_engine(timeout: Duration) -> Result<()> {
    let engine = connect_engine(timeout).await?;
    let version = with_timeout(timeout, "version query", engine.client().server_version())
        .await?
        .unwrap_or_else(|_| "unknown".to_string());

    kdev_success!("Container engine reachable");
    kdev_println!("engine:   {}", engine.kind());
    kdev_println!("endpoint: {}", engine.source());
    kdev_println!("version:  {}", version);
    Ok(())
}
