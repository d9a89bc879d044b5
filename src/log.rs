//! Logging setup.
//!
//! The foreground CLI logs to stderr; the daemonized supervisor logs to the
//! per-app log file named in spec.md §6, which is append-only and shared by
//! the daemon and every forked worker (spec.md §5). The file writer here is
//! a plain synchronous `Mutex<File>` rather than a background-thread
//! non-blocking writer: `Supervisor::dispatch_worker` forks a fresh process
//! per request, and POSIX `fork()` only carries the calling thread into the
//! child, so a flush thread started before the fork is simply gone in every
//! worker and anything queued to it is lost. A synchronous writer has no
//! such thread to lose.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Installs a subscriber that writes to stderr, for the foreground CLI.
pub fn init_stderr(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Installs a subscriber that appends to `log_path`.
///
/// Safe to call again after a `fork()`: each call opens its own file
/// description in append mode, so the daemon and every forked worker can
/// write to the same file concurrently without sharing any in-process
/// state (spec.md §5's "writers must use line-buffered appends so
/// interleaved lines remain intact").
pub fn init_file(log_path: &Path, verbose: bool) -> Result<()> {
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();

    Ok(())
}
