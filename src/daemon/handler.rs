//! Server-side counterpart of one client connection.

use super::channel::Channel;
use super::fdpass;
use crate::error::{DaemonError, Result};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

/// The literal verb sent as the first frame of an execute handshake.
pub const EXECUTE_VERB: &str = "/v0/execute";

/// Exit status reserved for "the handler closed without the application
/// ever producing a code" (spec.md §3).
pub const ABNORMAL_CLOSE_CODE: u8 = 255;

/// One decoded execute request. `stdin`/`stdout`/`stderr` are raw views onto
/// descriptors owned by the [`Handler`] that produced this record; they stay
/// valid for as long as that handler is alive.
#[derive(Debug, Clone)]
pub struct Request {
    pub cwd: PathBuf,
    pub argv: Vec<String>,
    pub stdin: RawFd,
    pub stdout: RawFd,
    pub stderr: RawFd,
}

/// The handler's position in the per-connection state machine (spec.md §4.5).
/// Any error transitions directly to `Closed` via the scoped cleanup in
/// [`Handler::close_with_exit_code`]; once `Replied`, the handler is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingVerb,
    AwaitingCwd,
    AwaitingArgv,
    AwaitingStdin,
    AwaitingStdout,
    AwaitingStderr,
    Dispatching,
    Replied,
    Closed,
}

/// Server-side object for exactly one client connection.
///
/// Retains every descriptor it receives from the client so they can all be
/// closed once the reply has been sent, regardless of how the connection
/// ends.
pub struct Handler {
    channel: Channel,
    received_fds: Vec<OwnedFd>,
    state: State,
}

impl Handler {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            received_fds: Vec::with_capacity(3),
            state: State::AwaitingVerb,
        }
    }

    /// Reads the verb, cwd, argv, and the three standard-stream descriptors,
    /// draining each descriptor's sentinel frame in lockstep.
    pub fn receive(&mut self) -> Result<Request> {
        self.state = State::AwaitingVerb;
        let verb = self.next_frame()?;
        if verb != EXECUTE_VERB.as_bytes() {
            return Err(DaemonError::Protocol(format!(
                "unsupported verb: {}",
                String::from_utf8_lossy(&verb)
            )));
        }

        self.state = State::AwaitingCwd;
        let cwd_bytes = self.next_frame()?;
        let cwd = PathBuf::from(String::from_utf8_lossy(&cwd_bytes).into_owned());

        self.state = State::AwaitingArgv;
        let argv_bytes = self.next_frame()?;
        let argv = split_argv(&argv_bytes);

        self.state = State::AwaitingStdin;
        let stdin = self.recv_stream_fd()?;
        self.state = State::AwaitingStdout;
        let stdout = self.recv_stream_fd()?;
        self.state = State::AwaitingStderr;
        let stderr = self.recv_stream_fd()?;

        self.state = State::Dispatching;
        Ok(Request {
            cwd,
            argv,
            stdin,
            stdout,
            stderr,
        })
    }

    /// Sends the reply frame. `code` must be in `0..=254`; 255 is reserved
    /// for an abnormal close the handler itself initiates.
    pub fn send_exit_code(&mut self, code: u8) -> Result<()> {
        if code == ABNORMAL_CLOSE_CODE {
            return Err(DaemonError::Protocol(
                "255 is reserved for abnormal handler close".into(),
            ));
        }
        self.channel.send(code.to_string().as_bytes())?;
        self.state = State::Replied;
        Ok(())
    }

    /// Sends `code`, then closes every descriptor received from the client.
    /// Both steps run on every exit path, even if sending the reply fails.
    pub fn close_with_exit_code(&mut self, code: u8) {
        let send_result = if code == ABNORMAL_CLOSE_CODE {
            self.channel.send(ABNORMAL_CLOSE_CODE.to_string().as_bytes())
        } else {
            self.send_exit_code(code)
        };
        if let Err(err) = send_result {
            tracing::warn!(%err, "failed to send exit code to client");
        }
        self.received_fds.clear();
        self.state = State::Closed;
    }

    fn next_frame(&self) -> Result<Vec<u8>> {
        self.channel
            .receive()?
            .ok_or_else(|| DaemonError::Protocol("connection closed mid-handshake".into()))
    }

    /// Receives one fd transfer followed by its sentinel frame (the
    /// sentinel's contents are not inspected, only its arrival matters).
    fn recv_stream_fd(&mut self) -> Result<RawFd> {
        let fd = fdpass::recv_fd(self.channel.underlying())?;
        let raw = fd.as_raw_fd();
        self.received_fds.push(fd);
        let _sentinel = self.next_frame()?;
        Ok(raw)
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        if self.state != State::Closed && self.state != State::Replied {
            self.close_with_exit_code(ABNORMAL_CLOSE_CODE);
        }
    }
}

/// Splits a NUL-joined argv frame. An empty frame yields a single empty
/// element, matching the "short argv is legal" edge case of spec.md §4.3.
fn split_argv(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
