//! primed - a preloading command-execution daemon substrate.
//!
//! A one-time daemon absorbs a process's cold-start cost once; a thin
//! client then hands its working directory, argv, and standard streams to
//! the already-warm daemon over a Unix-domain socket and blocks for an
//! exit code.
//!
//! # Embedding
//!
//! Implement [`app::Loader`] (one-shot warmup) and [`app::Runner`] (one
//! invocation per request) -- both traits have blanket impls for plain
//! closures -- and hand them to [`daemon::Supervisor::run`]:
//!
//! ```no_run
//! use primed::app::ExitOutcome;
//! use primed::config::AppConfig;
//! use primed::daemon::Supervisor;
//!
//! let config = AppConfig::new("my-app")?;
//! let supervisor = Supervisor::new(
//!     config,
//!     || Ok(()),
//!     |_request| Ok(ExitOutcome::Exit(0)),
//! );
//! let code = supervisor.run()?;
//! std::process::exit(code as i32);
//! # Ok::<(), primed::error::DaemonError>(())
//! ```
//!
//! The wire protocol, component boundaries, and invariants this crate
//! implements are documented per-module below.

pub mod app;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod echo;
pub mod error;
pub mod log;

pub use app::{ExitOutcome, Loader, Runner};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use daemon::{Client, Handler, Listener, Request, Supervisor};
pub use error::{DaemonError, Result};
