//! CLI argument definitions.
//!
//! Separated from `main.rs` so other binaries embedding this crate can
//! reuse the same argument shape.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "primed")]
#[command(about = "Preloading command-execution daemon substrate")]
#[command(version)]
pub struct Cli {
    /// Raise the tracing filter to `debug`.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the illustrative echo server in the foreground.
    ///
    /// Threaded dispatch is acceptable here since the demo handler never
    /// mutates process-global state; real embedders use the daemon
    /// supervisor, which forks per request instead.
    Server {
        /// Unix-domain socket path to bind.
        socket_path: PathBuf,
    },

    /// Connect to a running server and execute using the current
    /// process's cwd, argv, and standard streams.
    Client {
        /// Unix-domain socket path to connect to.
        socket_path: PathBuf,
    },
}
