// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "kdev")]
#[command(about = "Local Kubernetes clusters with shared mirror registries")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a kdev.yaml project file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum RegistrySubcommand {
    /// Create and start every registry the project declares
    Up,
    /// Remove the project's registries unless another cluster still uses them
    Down {
        /// Also delete the registries' storage volumes
        #[arg(long)]
        delete_volumes: bool,
    },
    /// List registries managed by kdev
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ClusterSubcommand {
    /// Ensure registries, then create the cluster
    Up,
    /// Delete the cluster, then tear down its registries
    Down {
        /// Also delete the registries' storage volumes
        #[arg(long)]
        delete_volumes: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Detect the container engine in use
    Engine,

    /// Manage mirror registries
    Registry {
        #[command(subcommand)]
        command: RegistrySubcommand,
    },

    /// Create or delete the project's cluster
    Cluster {
        #[command(subcommand)]
        command: ClusterSubcommand,
    },
}
