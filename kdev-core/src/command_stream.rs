// Standard library
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

// External crates
use duct::cmd;
use tracing::debug;
use which::which;

use crate::error::{KdevError, Result};

/// Locates an external tool on `PATH`.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which(name).map_err(|_| {
        KdevError::Dependency(format!("'{name}' is not installed or not on PATH"))
    })
}

/// Runs a command, echoing its combined output line by line to stderr.
///
/// A non-zero exit status is returned as [`KdevError::Command`] naming the
/// full command line.
pub fn stream_command_visible<A: AsRef<OsStr>>(command: &str, args: &[A]) -> Result<()> {
    let command_line = render(command, args);
    debug!(command = %command_line, "Running external command");

    let reader = cmd(command, args)
        .stderr_to_stdout()
        .reader()
        .map_err(|e| KdevError::Command(format!("{command_line}: {e}")))?;
    let lines = BufReader::new(reader).lines();
    for line in lines {
        // The reader reports a failed exit status as a read error at EOF.
        let line = line.map_err(|e| KdevError::Command(format!("{command_line}: {e}")))?;
        eprintln!("{}", line);
    }
    Ok(())
}

fn render<A: AsRef<OsStr>>(command: &str, args: &[A]) -> String {
    std::iter::once(command.to_string())
        .chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ")
}
