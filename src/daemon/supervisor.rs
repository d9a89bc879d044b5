//! Daemon lifecycle: discover-or-spawn, one-shot warmup, and per-request
//! dispatch into isolated forked workers (spec.md §4.5).
//!
//! Isolation rationale: stdio redirection, working-directory changes, and
//! argv are process-global. A forked worker confines those mutations to
//! itself, so concurrent requests can't corrupt each other. Threads would
//! share those globals and are unsuitable for this dispatch -- the
//! foreground demo server in `main.rs` gets away with threads only because
//! its handler never touches them.

use super::channel::Channel;
use super::client::Client;
use super::handler::{Handler, Request};
use super::listener::Listener;
use crate::app::{Loader, Runner};
use crate::config::AppConfig;
use crate::error::{DaemonError, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::ForkResult;
use std::os::fd::OwnedFd;
use std::time::Duration;

/// How many times `run()` retries the fast path after losing the race to
/// spawn the daemon itself (spec.md E6: readiness ordering between
/// concurrent launchers).
const MAX_SPAWN_ATTEMPTS: u32 = 10;

/// Locates or spawns the daemon, loads the application once, and serves
/// requests forever.
pub struct Supervisor<L, R> {
    config: AppConfig,
    loader: L,
    runner: R,
}

impl<L, R> Supervisor<L, R>
where
    L: Loader,
    R: Runner,
{
    pub fn new(config: AppConfig, loader: L, runner: R) -> Self {
        Self {
            config,
            loader,
            runner,
        }
    }

    /// Fast path if a daemon is already listening; otherwise spawns one and
    /// retries. Returns the exit code for the launcher to propagate.
    ///
    /// A losing launcher's `spawn_daemon` can fail (its forked child loses
    /// the `AlreadyRunning` race and exits before signalling readiness);
    /// that is not fatal here, since the winner's daemon may already be
    /// reachable on the next fast-path attempt (spec.md E6).
    pub fn run(&self) -> Result<u8> {
        for attempt in 0..MAX_SPAWN_ATTEMPTS {
            match Client::execute_current(&self.config.socket_path()) {
                Ok(code) => return Ok(code),
                Err(DaemonError::Connect { .. }) => {
                    if let Err(e) = self.spawn_daemon() {
                        tracing::debug!(error = %e, attempt, "spawn attempt did not win, retrying");
                    }
                    if attempt > 0 {
                        std::thread::sleep(Duration::from_millis(20));
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(DaemonError::Protocol(format!(
            "daemon never became reachable after {MAX_SPAWN_ATTEMPTS} attempts"
        )))
    }

    /// Forks the daemon into existence and blocks on its readiness pipe.
    /// Races with other launchers are resolved by [`Listener::bind`]'s
    /// `AlreadyRunning` probe: the loser simply finds a live socket on its
    /// next fast-path attempt.
    fn spawn_daemon(&self) -> Result<()> {
        std::fs::create_dir_all(self.config.app_dir())?;

        let (read_fd, write_fd) = nix::unistd::pipe().map_err(crate::error::io_from_errno)?;

        // SAFETY: the child below only calls async-signal-safe operations
        // (or exits) until it execs nothing and instead becomes the daemon
        // in `daemonize_and_serve`.
        match unsafe { nix::unistd::fork() }.map_err(crate::error::io_from_errno)? {
            ForkResult::Parent { .. } => {
                drop(write_fd);
                let readiness = Channel::new(read_fd);
                match readiness.receive() {
                    Ok(Some(_)) => Ok(()),
                    Ok(None) => Err(DaemonError::Protocol(
                        "daemon exited before signalling readiness".into(),
                    )),
                    Err(e) => Err(e),
                }
            }
            ForkResult::Child => {
                drop(read_fd);
                self.daemonize_and_serve(write_fd);
            }
        }
    }

    /// Standard double-fork/setsid sequence, then the accept loop. Never
    /// returns to the caller; every path exits the process.
    fn daemonize_and_serve(&self, readiness_write: OwnedFd) -> ! {
        if let Err(e) = nix::unistd::setsid() {
            eprintln!("setsid failed: {e}");
            std::process::exit(1);
        }

        // Second fork so the daemon can never reacquire a controlling
        // terminal; the intermediate process (session leader) exits
        // immediately.
        match unsafe { nix::unistd::fork() } {
            Ok(ForkResult::Parent { .. }) => std::process::exit(0),
            Ok(ForkResult::Child) => {}
            Err(e) => {
                eprintln!("second fork failed: {e}");
                std::process::exit(1);
            }
        }

        let _ = std::env::set_current_dir("/");

        let log_path = self.config.log_path();
        if let Err(e) = crate::log::init_file(&log_path, false) {
            eprintln!("failed to open log file {}: {e}", log_path.display());
        }

        // SIGCHLD is ignored so the kernel reaps forked workers itself;
        // the daemon never waits on them (spec.md invariant 5, no zombies).
        unsafe {
            let _ = signal::signal(Signal::SIGCHLD, SigHandler::SigIgn);
        }

        if let Err(e) = self.loader.load() {
            tracing::error!(error = ?e, "loader failed, daemon exiting");
            std::process::exit(1);
        }

        let listener = match Listener::bind(&self.config.socket_path()) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "failed to bind daemon socket");
                std::process::exit(1);
            }
        };

        let readiness = Channel::new(readiness_write);
        if let Err(e) = readiness.send(b"ready") {
            tracing::error!(error = %e, "failed to signal readiness");
        }
        drop(readiness);

        tracing::info!(
            socket = %self.config.socket_path().display(),
            "daemon ready, entering accept loop"
        );
        self.accept_loop(listener)
    }

    fn accept_loop(&self, listener: Listener) -> ! {
        loop {
            match listener.accept() {
                Ok(handler) => self.dispatch_worker(handler),
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }
    }

    /// Forks a worker to handle one accepted connection in isolation.
    fn dispatch_worker(&self, mut handler: Handler) {
        // SAFETY: the child immediately redirects stdio and execs nothing
        // else in-process beyond the runner callback.
        match unsafe { nix::unistd::fork() } {
            Ok(ForkResult::Parent { .. }) => {
                // The parent has no further use for this connection; the
                // worker owns the fds now (the kernel keeps them open via
                // its copy until the worker closes them).
                drop(handler);
            }
            Ok(ForkResult::Child) => self.serve_worker(handler),
            Err(e) => {
                tracing::warn!(error = %e, "fork failed, closing connection");
                handler.close_with_exit_code(130);
            }
        }
    }

    /// Runs in the forked worker: decode the request, redirect stdio,
    /// chdir, invoke the runner, and reply. Never returns.
    fn serve_worker(&self, mut handler: Handler) -> ! {
        let origin = ProcessSnapshot::capture();
        tracing::debug!(
            cwd = %origin.cwd.display(),
            argv = ?origin.argv,
            stdio = ?origin.stdio,
            "worker forked, original process state captured"
        );

        let request = match handler.receive() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, origin.cwd = %origin.cwd.display(), "failed to decode request");
                handler.close_with_exit_code(130);
                std::process::exit(130);
            }
        };

        if let Err(e) = redirect_stdio(&request) {
            tracing::error!(error = %e, origin.cwd = %origin.cwd.display(), "failed to redirect stdio");
            handler.close_with_exit_code(130);
            std::process::exit(130);
        }

        if std::env::set_current_dir(&request.cwd).is_err() {
            tracing::warn!(cwd = %request.cwd.display(), "failed to chdir, continuing anyway");
        }

        let code = match self.runner.run(&request) {
            Ok(outcome) => outcome.code(),
            Err(e) => {
                tracing::error!(error = ?e, origin.cwd = %origin.cwd.display(), origin.argv = ?origin.argv, "runner failed");
                1
            }
        };

        handler.close_with_exit_code(code);
        std::process::exit(code as i32);
    }
}

/// The worker's own cwd/argv/standard-stream descriptors, captured before
/// `redirect_stdio`/`set_current_dir` overwrite them, so a crash or error
/// log has the daemon's original state to report (spec.md §4.5).
struct ProcessSnapshot {
    cwd: std::path::PathBuf,
    argv: Vec<String>,
    stdio: [i32; 3],
}

impl ProcessSnapshot {
    fn capture() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("<unknown>")),
            argv: std::env::args().collect(),
            stdio: [0, 1, 2],
        }
    }
}

/// Duplicates the client's stdin/stdout/stderr onto fds 0/1/2, so any
/// library the runner calls that writes to those fds reaches the client.
fn redirect_stdio(request: &Request) -> Result<()> {
    for (source, target) in [(request.stdin, 0), (request.stdout, 1), (request.stderr, 2)] {
        // SAFETY: `source` is a descriptor this process owns (received via
        // SCM_RIGHTS); `target` is a valid standard-stream slot.
        let rc = unsafe { libc::dup2(source, target) };
        if rc < 0 {
            return Err(DaemonError::Io(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}
