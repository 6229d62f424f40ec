//! Mirror registry command handlers
//!
//! Thin wrappers over the kdev-registry lifecycle: load the project's
//! registry declarations, detect the engine, run the operation under the
//! project's engine timeout and report each registry's outcome.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;

use super::{connect_engine, with_timeout, Project};
use crate::cli::RegistrySubcommand;
use kdev_core::{
    kdev_error, kdev_info, kdev_println, kdev_progress, kdev_success, kdev_warning,
};
use kdev_registry::{
    ensure_all, ensure_network, list_managed, release_network, teardown_all, EnsureOutcome,
    RegistrySpec, TeardownOutcome,
};

pub async fn handle_registry_command(command: &RegistrySubcommand, project: &Project) -> Result<()> {
    match command {
        RegistrySubcommand::Up => registry_up(project).await,
        RegistrySubcommand::Down { delete_volumes } => {
            registry_down(project, *delete_volumes).await
        }
        RegistrySubcommand::List => registry_list(project).await,
    }
}

/// Ensure every declared registry exists and is running.
pub async fn registry_up(project: &Project) -> Result<()> {
    let specs = project.registries()?;
    if specs.is_empty() {
        kdev_info!("No registries declared for cluster '{}'", project.cluster_name());
        return Ok(());
    }

    let engine = connect_engine(project.timeout()).await?;
    kdev_progress!(
        "Ensuring {} registr{} for cluster '{}'",
        specs.len(),
        if specs.len() == 1 { "y" } else { "ies" },
        project.cluster_name()
    );

    let network = project.network_name();
    with_timeout(project.timeout(), "network setup", ensure_network(&engine, &network))
        .await?
        .with_context(|| format!("Failed to prepare network '{network}'"))?;

    let results = with_timeout(project.timeout(), "registry setup", ensure_all(&engine, &specs))
        .await?
        .context("Failed to set up registries")?;

    let attempted = results.len();
    for (spec, (_, result)) in specs.iter().zip(results) {
        match result {
            Ok(outcome) => report_ensure(spec, &outcome),
            Err(e) => {
                kdev_error!("Registry '{}' failed: {}", spec.name, e);
                return Err(setup_stopped(&spec.name, specs.len() - attempted));
            }
        }
    }
    Ok(())
}

fn setup_stopped(name: &str, skipped: usize) -> anyhow::Error {
    anyhow!("Registry setup stopped at '{name}'; {skipped} remaining registries skipped")
}

fn check_batch(failed: usize, total: usize, action: &str) -> Result<()> {
    if failed > 0 {
        bail!("{failed} of {total} registries could not be {action}");
    }
    Ok(())
}

fn report_ensure(spec: &RegistrySpec, outcome: &EnsureOutcome) {
    let endpoint = spec
        .endpoint()
        .unwrap_or_else(|| "not published".to_string());
    match outcome {
        EnsureOutcome::Created { .. } => {
            kdev_success!("Registry '{}' started ({})", spec.name, endpoint);
        }
        EnsureOutcome::AlreadyExists => {
            kdev_info!("Registry '{}' already exists ({})", spec.name, endpoint);
        }
    }
    if let Some(upstream) = &spec.upstream_url {
        kdev_println!("   proxying {}", upstream);
    }
}

/// Tear down every declared registry for this project's cluster network,
/// then the network itself if kdev created it and nothing else uses it.
pub async fn registry_down(project: &Project, delete_volumes: bool) -> Result<()> {
    let specs = project.registries()?;
    if specs.is_empty() {
        kdev_info!("No registries declared for cluster '{}'", project.cluster_name());
        return Ok(());
    }

    let engine = connect_engine(project.timeout()).await?;
    kdev_progress!("Tearing down registries for cluster '{}'", project.cluster_name());

    let results = with_timeout(
        project.timeout(),
        "registry teardown",
        teardown_all(&engine, &specs, delete_volumes),
    )
    .await?;

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(outcome) => report_teardown(name, outcome),
            Err(e) => {
                failed += 1;
                kdev_error!("Registry '{}' teardown failed: {}", name, e);
            }
        }
    }
    check_batch(failed, results.len(), "torn down")?;

    let network = project.network_name();
    let released = with_timeout(
        project.timeout(),
        "network cleanup",
        release_network(&engine, &network),
    )
    .await?
    .with_context(|| format!("Failed to clean up network '{network}'"))?;
    if released {
        kdev_info!("Removed network '{}'", network);
    }
    Ok(())
}

fn report_teardown(name: &str, outcome: &TeardownOutcome) {
    match outcome {
        TeardownOutcome::NotFound => {
            kdev_info!("Registry '{}' not found", name);
        }
        TeardownOutcome::StillShared { networks } => {
            let networks = networks.iter().cloned().collect::<Vec<_>>().join(", ");
            kdev_warning!("Registry '{}' kept: still used by {}", name, networks);
        }
        TeardownOutcome::Removed { volume: Some(volume) } => {
            kdev_success!("Registry '{}' removed with volume '{}'", name, volume);
        }
        TeardownOutcome::Removed { volume: None } => {
            kdev_success!("Registry '{}' removed", name);
        }
    }
}

/// List every registry container kdev manages, across all clusters.
pub async fn registry_list(project: &Project) -> Result<()> {
    let engine = connect_engine(project.timeout()).await?;
    let registries = with_timeout(project.timeout(), "registry listing", list_managed(&engine))
        .await?
        .context("Failed to list registries")?;

    if registries.is_empty() {
        kdev_info!("No kdev registries found");
        return Ok(());
    }

    kdev_println!("{:<32} {:<32} STATE", "NAME", "NETWORKS");
    for registry in registries {
        let networks = registry.networks.into_iter().collect::<Vec<_>>().join(",");
        let state = if registry.running {
            "running".green()
        } else {
            "stopped".yellow()
        };
        kdev_println!("{:<32} {:<32} {}", registry.name, networks, state);
    }
    Ok(())
}
