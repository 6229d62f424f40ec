// External crates
use clap::Parser;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

// Internal imports
use kdev_core::{kdev_error, kdev_error_hint};
use kdev_logging::LogSettings;

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let debug_enabled = args.debug;

    let mut settings = LogSettings::from_env();
    if args.debug {
        settings.level = "debug".to_string();
    }
    let log_guard = kdev_logging::init_with(&settings);

    // Every event of this invocation carries the same request id.
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        command = ?args.command,
    );
    debug!(parent: &span, "Starting kdev command");

    let result = execute_command(args).instrument(span).await;

    if let Err(e) = result {
        kdev_error!("{:#}", e);
        if !debug_enabled && !commands::is_engine_unavailable(&e) {
            kdev_error_hint!("Re-run with --debug for engine-level details");
        }
        drop(log_guard);
        std::process::exit(1);
    }
}
