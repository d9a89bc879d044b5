//! Client side of the execute handshake.

use super::channel::Channel;
use super::fdpass;
use super::handler::EXECUTE_VERB;
use crate::error::{DaemonError, Result};
use std::os::fd::AsRawFd;
use std::path::Path;

/// A short, non-empty frame sent after each descriptor transfer so the
/// server can deterministically drain the preceding `recvmsg`'s ancillary
/// data (spec.md §4.2).
const SENTINEL: &[u8] = b"ok";

/// Thin client: opens a Unix socket, performs one execute handshake, and
/// returns the exit code.
pub struct Client {
    channel: Channel,
}

impl Client {
    /// Connects to the daemon's socket.
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let stream = std::os::unix::net::UnixStream::connect(socket_path).map_err(|source| {
            DaemonError::Connect {
                path: socket_path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            channel: Channel::from_unix_stream(stream),
        })
    }

    /// Sends the execute handshake and blocks for the reply frame, returning
    /// the exit code in `0..=254`.
    pub fn execute(
        &self,
        cwd: &Path,
        argv: &[String],
        stdin: std::os::fd::RawFd,
        stdout: std::os::fd::RawFd,
        stderr: std::os::fd::RawFd,
    ) -> Result<u8> {
        self.channel.send(EXECUTE_VERB.as_bytes())?;
        self.channel.send(cwd.to_string_lossy().as_bytes())?;
        self.channel.send(argv.join("\0").as_bytes())?;

        for fd in [stdin, stdout, stderr] {
            fdpass::send_fd(self.channel.underlying(), fd)?;
            self.channel.send(SENTINEL)?;
        }

        let reply = self
            .channel
            .receive()?
            .ok_or_else(|| DaemonError::Protocol("no reply frame".into()))?;
        let text = std::str::from_utf8(&reply)
            .map_err(|_| DaemonError::Protocol("reply frame was not valid UTF-8".into()))?;
        let code: u32 = text
            .parse()
            .map_err(|_| DaemonError::Protocol(format!("reply frame was not an integer: {text:?}")))?;
        u8::try_from(code)
            .ok()
            .filter(|&c| c <= 254)
            .ok_or_else(|| DaemonError::Protocol(format!("exit code out of range: {code}")))
    }

    /// Snapshots the current process's cwd, argv, and standard streams and
    /// performs an execute handshake with them.
    pub fn execute_current(socket_path: &Path) -> Result<u8> {
        let client = Self::connect(socket_path)?;
        let cwd = std::env::current_dir()?;
        let argv: Vec<String> = std::env::args().collect();
        client.execute(
            &cwd,
            &argv,
            std::io::stdin().as_raw_fd(),
            std::io::stdout().as_raw_fd(),
            std::io::stderr().as_raw_fd(),
        )
    }
}
