//! Illustrative hosted application used by the `server`/`client` CLI demo
//! and the integration tests. Real embedders supply their own loader and
//! runner; this one's business logic is deliberately trivial (spec.md §1).

use crate::app::ExitOutcome;
use crate::daemon::handler::Request;
use anyhow::Result;
use std::io::Write;
use std::os::fd::RawFd;

/// One-shot warmup for the demo application.
pub fn load() -> Result<()> {
    tracing::info!("echo application warmed up");
    Ok(())
}

/// Per-request entry point for a forked worker: standard streams have
/// already been redirected onto fds 0/1/2, so writing to
/// [`std::io::stdout`] reaches the client.
pub fn run(request: &Request) -> Result<ExitOutcome> {
    if request.argv.len() > 1 {
        writeln!(std::io::stdout(), "{}", request.argv[1..].join(" "))?;
    }
    Ok(ExitOutcome::Exit(0))
}

/// Per-request entry point for the threaded foreground demo server, which
/// never redirects process-global stdio (spec.md §4.5, §9): it writes
/// directly to the client's descriptor instead.
pub fn run_unforked(request: &Request) -> Result<ExitOutcome> {
    if request.argv.len() > 1 {
        let mut line = request.argv[1..].join(" ");
        line.push('\n');
        write_raw(request.stdout, line.as_bytes())?;
    }
    Ok(ExitOutcome::Exit(0))
}

fn write_raw(fd: RawFd, buf: &[u8]) -> Result<()> {
    crate::daemon::channel::write_all(fd, buf)?;
    Ok(())
}
