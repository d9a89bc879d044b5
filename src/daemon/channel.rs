//! Length-prefixed framing over a raw byte-stream descriptor.
//!
//! A [`Channel`] owns one socket or pipe end and speaks a simple protocol:
//! a 4-byte big-endian length prefix followed by exactly that many payload
//! bytes. It also exposes the raw descriptor so that callers can interleave
//! out-of-band descriptor-passing operations (see `daemon::fdpass`) with
//! ordinary frames on the same stream, as spec'd by `underlying()`.

use crate::error::{DaemonError, Result};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

/// One length-prefixed message.
pub type Frame = Vec<u8>;

/// A single-producer/single-consumer byte-stream endpoint with framed I/O.
pub struct Channel {
    fd: OwnedFd,
}

impl Channel {
    /// Wraps an already-open descriptor (a connected socket, or one end of a
    /// pipe). The channel takes ownership and closes it on drop.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Wraps a connected Unix-domain socket.
    pub fn from_unix_stream(stream: UnixStream) -> Self {
        Self { fd: stream.into() }
    }

    /// The raw descriptor underlying this channel. Exposed so that
    /// descriptor-passing operations can share the same socket between
    /// frames; this is a deliberate capability leak.
    pub fn underlying(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Sends one frame: a 4-byte big-endian length followed by `payload`.
    ///
    /// There is no userspace buffering here (writes go straight to the
    /// descriptor via `write(2)`), so every completed send is already
    /// flushed by the time this returns.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let len: u32 = payload
            .len()
            .try_into()
            .map_err(|_| DaemonError::Encoding(payload.len()))?;

        let mut message = Vec::with_capacity(4 + payload.len());
        message.extend_from_slice(&len.to_be_bytes());
        message.extend_from_slice(payload);
        write_all(self.fd.as_raw_fd(), &message)?;
        Ok(())
    }

    /// Receives the next frame, or `None` at a clean end-of-stream (zero
    /// bytes available where a length prefix would begin).
    ///
    /// A stream that ends 1-3 bytes into a length prefix, or short of the
    /// announced payload length, is a protocol error rather than a clean
    /// end-of-stream.
    pub fn receive(&self) -> Result<Option<Frame>> {
        let mut len_bytes = [0u8; 4];
        let read = read_fill(self.fd.as_raw_fd(), &mut len_bytes)?;
        if read == 0 {
            return Ok(None);
        }
        if read < 4 {
            return Err(DaemonError::Protocol(format!(
                "end of stream after {read} of 4 length-prefix bytes"
            )));
        }

        let len = u32::from_be_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        let read = read_fill(self.fd.as_raw_fd(), &mut payload)?;
        if read < len {
            return Err(DaemonError::Protocol(format!(
                "end of stream after {read} of {len} payload bytes"
            )));
        }

        Ok(Some(payload))
    }
}

/// Writes `buf` in full, retrying on short writes and `EINTR`.
pub(crate) fn write_all(fd: RawFd, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        // SAFETY: `fd` is a valid, open descriptor for the lifetime of this call.
        let n = unsafe {
            libc::write(
                fd,
                buf[written..].as_ptr() as *const libc::c_void,
                buf.len() - written,
            )
        };
        match n {
            0 => {
                return Err(DaemonError::Io(std::io::Error::other(
                    "write returned zero bytes",
                )));
            }
            n if n < 0 => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(DaemonError::Io(err));
            }
            n => written += n as usize,
        }
    }
    Ok(())
}

/// Reads into `buf` until it is full or the stream ends, returning however
/// many bytes were actually read (which is `< buf.len()` only at EOF).
pub(crate) fn read_fill(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        // SAFETY: `fd` is a valid, open descriptor for the lifetime of this call.
        let n = unsafe {
            libc::read(
                fd,
                buf[read..].as_mut_ptr() as *mut libc::c_void,
                buf.len() - read,
            )
        };
        match n {
            0 => break,
            n if n < 0 => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(DaemonError::Io(err));
            }
            n => read += n as usize,
        }
    }
    Ok(read)
}
