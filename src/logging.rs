//! Tracing initialization for embedders and tests.
//!
//! The pipeline itself only emits `tracing` events. An embedder that wants
//! them on a console, or collected into a per-run JSON log next to the
//! import report, makes the one-time call below. `RUST_LOG` always wins
//! over the verbosity ladder.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Mutex, Once};

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber: stderr console output, plus a JSON run
/// log when `run_log` is given.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the run log file cannot be
/// created, or a global subscriber is already installed.
pub fn init_logging(verbosity: u8, quiet: bool, run_log: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_for(verbosity, quiet)))?;

    let run_log = run_log
        .map(|path| -> Result<_> {
            let file = std::fs::File::create(path)?;
            Ok(fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(run_log)
        .try_init()?;
    Ok(())
}

fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "project_import=info",
        (false, 1) => "project_import=debug",
        _ => "project_import=trace",
    }
}

/// Capture-friendly logging for tests. Safe to call repeatedly.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("project_import=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}
