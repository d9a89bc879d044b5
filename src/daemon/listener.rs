//! Owns the Unix-domain listening socket: binds it, probes a pre-existing
//! path for a live peer, accepts connections, and removes the socket file on
//! shutdown.

use super::channel::Channel;
use super::handler::Handler;
use crate::error::{DaemonError, Result};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

pub struct Listener {
    socket_path: PathBuf,
    listener: UnixListener,
    closed: bool,
}

impl Listener {
    /// Binds a `SOCK_STREAM` socket at `socket_path`.
    ///
    /// If a file already exists at that path, it is probed with a connect
    /// attempt: success means a live peer owns it (`AlreadyRunning`);
    /// refusal means it is stale and safe to unlink and rebind.
    pub fn bind(socket_path: &Path) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if socket_path.exists() {
            match UnixStream::connect(socket_path) {
                Ok(_) => return Err(DaemonError::AlreadyRunning(socket_path.to_path_buf())),
                Err(_) => {
                    std::fs::remove_file(socket_path)?;
                }
            }
        }

        let listener = UnixListener::bind(socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        harden_listening_socket(listener.as_raw_fd())?;

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            listener,
            closed: false,
        })
    }

    /// Switches the listening socket's blocking mode. The demo foreground
    /// server uses non-blocking mode so it can poll a shutdown flag between
    /// `accept()` attempts without spawning a dedicated signal thread.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Blocks until a connection arrives, wrapping it in a channel and then
    /// a [`Handler`].
    pub fn accept(&self) -> Result<Handler> {
        let (stream, _addr) = self.listener.accept()?;
        stream.set_nonblocking(false)?;
        Ok(Handler::new(Channel::from_unix_stream(stream)))
    }

    /// Closes the listening descriptor and removes the socket file if
    /// present. Idempotent.
    pub fn close(mut self) -> Result<()> {
        self.close_mut()
    }

    fn close_mut(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.close_mut();
    }
}

/// Marks the listening descriptor `CLOEXEC` and sets `SO_LINGER` to a hard
/// zero-second close.
///
/// `CLOEXEC` keeps forked workers (`Supervisor::dispatch_worker`) from
/// inheriting a live duplicate of the listening socket -- without it every
/// worker would hold the listener open even after the daemon itself closes
/// it, defeating `Listener::close`'s contract that the socket path becomes
/// free. `SO_LINGER` with a zero timeout makes a crashed or killed daemon's
/// close reset the socket immediately instead of leaving it in `TIME_WAIT`,
/// so the stale-socket reclaim path in `bind` sees a clean refusal rather
/// than a linger delay.
fn harden_listening_socket(fd: RawFd) -> Result<()> {
    // SAFETY: `fd` is the listening socket this call just bound; both
    // fcntl(2) and setsockopt(2) are valid on it.
    unsafe {
        if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
            return Err(DaemonError::Io(std::io::Error::last_os_error()));
        }

        let linger = libc::linger {
            l_onoff: 1,
            l_linger: 0,
        };
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        );
        if rc < 0 {
            return Err(DaemonError::Io(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_socket_file_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let listener = Listener::bind(&path).unwrap();
        assert!(path.exists());
        listener.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn reclaims_a_stale_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        // Bind and drop without an explicit close: the file is removed by
        // Drop, so recreate it by hand to simulate a crashed daemon's
        // leftover socket inode with nothing listening on it.
        {
            let listener = UnixListener::bind(&path).unwrap();
            drop(listener);
        }
        std::fs::File::create(&path).unwrap();
        let listener = Listener::bind(&path).unwrap();
        listener.close().unwrap();
    }

    #[test]
    fn refuses_to_bind_over_a_live_peer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let live = Listener::bind(&path).unwrap();
        let err = Listener::bind(&path).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning(_)));
        live.close().unwrap();
    }
}
