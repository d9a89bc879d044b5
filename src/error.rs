//! Error taxonomy for the preloading daemon's IPC substrate.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("payload of {0} bytes does not fit a 32-bit frame length")]
    Encoding(usize),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a responsive daemon is already listening on {0}")]
    AlreadyRunning(PathBuf),

    #[error("application handler failed: {0}")]
    Application(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

/// Wraps a `nix` errno as an [`std::io::Error`], since `nix::Error` (an alias
/// for `Errno`) doesn't get a blanket `From` impl in `std`.
pub(crate) fn io_from_errno(errno: nix::Error) -> std::io::Error {
    std::io::Error::other(errno)
}
