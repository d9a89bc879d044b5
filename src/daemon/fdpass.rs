//! Ancillary file-descriptor passing (`SCM_RIGHTS`) over a Unix-domain socket.
//!
//! Descriptor transfers are positional with respect to the socket's byte
//! stream, so every transfer here is paired by callers with the sentinel
//! frame spec.md §4.2 describes: the sentinel's `Channel::receive()` forces
//! a `recvmsg(2)` that drains whatever ancillary data arrived alongside the
//! preceding bytes.

use crate::error::{DaemonError, Result, io_from_errno};
use nix::sys::socket::{self, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr};
use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// POSIX requires at least one byte of ordinary data to accompany an
/// `SCM_RIGHTS` control message; this carrier byte is never inspected.
const CARRIER: [u8; 1] = [0];

/// Sends `fd` as ancillary data on `socket_fd`.
pub fn send_fd(socket_fd: RawFd, fd: RawFd) -> Result<()> {
    let iov = [IoSlice::new(&CARRIER)];
    let fds = [fd];
    let cmsg = [ControlMessage::ScmRights(&fds)];
    socket::sendmsg::<UnixAddr>(socket_fd, &iov, &cmsg, MsgFlags::empty(), None)
        .map_err(io_from_errno)
        .map_err(DaemonError::Io)?;
    Ok(())
}

/// Receives a single descriptor sent with [`send_fd`].
pub fn recv_fd(socket_fd: RawFd) -> Result<OwnedFd> {
    let mut carrier = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut carrier)];
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 1]);

    let msg = socket::recvmsg::<UnixAddr>(socket_fd, &mut iov, Some(&mut cmsg_buf), MsgFlags::empty())
        .map_err(io_from_errno)
        .map_err(DaemonError::Io)?;

    for cmsg in msg.cmsgs().map_err(io_from_errno).map_err(DaemonError::Io)? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&raw) = fds.first() {
                // SAFETY: the kernel just transferred ownership of this descriptor to us.
                return Ok(unsafe { OwnedFd::from_raw_fd(raw) });
            }
        }
    }

    Err(DaemonError::Protocol(
        "no file descriptor received alongside carrier byte".into(),
    ))
}
