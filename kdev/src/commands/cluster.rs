//! `kdev cluster up|down`: registries around the external cluster tool.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::task;

use super::{registry, Project};
use crate::cli::ClusterSubcommand;
use kdev_config::{distribution_config_path, Distribution};
use kdev_core::command_stream::{require_tool, stream_command_visible};
use kdev_core::{kdev_progress, kdev_success};

pub async fn handle_cluster_command(command: &ClusterSubcommand, project: &Project) -> Result<()> {
    match command {
        ClusterSubcommand::Up => cluster_up(project).await,
        ClusterSubcommand::Down { delete_volumes } => cluster_down(project, *delete_volumes).await,
    }
}

async fn cluster_up(project: &Project) -> Result<()> {
    let distribution = project.config.distribution();
    require_tool(distribution.binary())?;

    registry::registry_up(project).await?;

    let config_path = distribution_config_path(&project.config);
    let config = config_path.exists().then_some(config_path.as_path());
    kdev_progress!("Creating {} cluster '{}'", distribution, project.cluster_name());
    run_tool(distribution, create_args(distribution, project.cluster_name(), config)).await?;
    kdev_success!("Cluster '{}' is up", project.cluster_name());
    Ok(())
}

async fn cluster_down(project: &Project, delete_volumes: bool) -> Result<()> {
    let distribution = project.config.distribution();
    require_tool(distribution.binary())?;

    // The cluster's nodes must be gone before the registries' network
    // attachments are judged.
    kdev_progress!("Deleting {} cluster '{}'", distribution, project.cluster_name());
    run_tool(distribution, delete_args(distribution, project.cluster_name())).await?;

    registry::registry_down(project, delete_volumes).await?;
    kdev_success!("Cluster '{}' is down", project.cluster_name());
    Ok(())
}

/// Runs the distribution's binary on a blocking thread.
async fn run_tool(distribution: Distribution, args: Vec<String>) -> Result<()> {
    let binary = distribution.binary();
    task::spawn_blocking(move || stream_command_visible(binary, &args))
        .await
        .with_context(|| format!("{binary} did not run to completion"))??;
    Ok(())
}

fn create_args(distribution: Distribution, cluster: &str, config: Option<&Path>) -> Vec<String> {
    let mut args: Vec<String> = match distribution {
        Distribution::Kind => vec!["create".into(), "cluster".into(), "--name".into()],
        Distribution::K3d => vec!["cluster".into(), "create".into()],
    };
    args.push(cluster.to_string());
    if let Some(path) = config {
        args.push("--config".into());
        args.push(path.display().to_string());
    }
    args
}

fn delete_args(distribution: Distribution, cluster: &str) -> Vec<String> {
    let mut args: Vec<String> = match distribution {
        Distribution::Kind => vec!["delete".into(), "cluster".into(), "--name".into()],
        Distribution::K3d => vec!["cluster".into(), "delete".into()],
    };
    args.push(cluster.to_string());
    args
}
