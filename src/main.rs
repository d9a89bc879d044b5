//! primed - a preloading command-execution daemon substrate.
//!
//! Exposes the two CLI subcommands spec.md §6 names: `server` runs the
//! illustrative echo application in the foreground, `client` connects and
//! executes using the current process's cwd/argv/stdio.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

mod app;
mod cli;
mod config;
mod daemon;
mod echo;
mod error;
mod log;

use cli::{Cli, Commands};
use daemon::{Client, Handler, Listener};
use error::DaemonError;

fn main() -> Result<()> {
    let cli = Cli::parse();
    log::init_stderr(cli.verbose);

    match cli.command {
        Commands::Server { socket_path } => run_demo_server(&socket_path),
        Commands::Client { socket_path } => run_client(&socket_path),
    }
}

/// Foreground demo server: non-blocking accept loop polled against a
/// Ctrl+C flag, matching the shape of a real listener's shutdown path
/// without forking (see `cli::Commands::Server` docs for why threads are
/// acceptable here).
fn run_demo_server(socket_path: &std::path::Path) -> Result<()> {
    let listener = Listener::bind(socket_path).context("binding demo server socket")?;
    listener.set_nonblocking(true)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("installing signal handler")?;
    }

    eprintln!("primed demo server listening on {}", socket_path.display());
    eprintln!("Press Ctrl+C to stop.");

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok(mut handler) => {
                std::thread::spawn(move || {
                    if let Err(e) = serve_demo_connection(&mut handler) {
                        tracing::warn!(error = %e, "demo connection failed");
                    }
                });
            }
            Err(DaemonError::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }

    listener.close()?;
    Ok(())
}

fn serve_demo_connection(handler: &mut Handler) -> Result<()> {
    let request = handler.receive()?;
    let outcome = echo::run_unforked(&request)?;
    handler.close_with_exit_code(outcome.code());
    Ok(())
}

fn run_client(socket_path: &std::path::Path) -> Result<()> {
    let code = Client::execute_current(socket_path)?;
    std::process::exit(code as i32);
}
