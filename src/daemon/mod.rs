//! Preloading command-execution daemon: the IPC substrate that lets a thin
//! client hand its cwd, argv, and standard streams to an already-warm
//! daemon process and block for an exit code.
//!
//! # Components
//!
//! - [`channel`] -- length-prefixed framing over a raw descriptor.
//! - [`fdpass`] -- `SCM_RIGHTS` descriptor passing alongside frames.
//! - [`client`] -- opens a socket, performs the execute handshake.
//! - [`handler`] -- server-side counterpart of one client connection.
//! - [`listener`] -- owns the listening socket's lifecycle.
//! - [`supervisor`] -- discover-or-spawn, warmup, and per-request dispatch.

pub mod channel;
pub mod client;
pub mod fdpass;
pub mod handler;
pub mod listener;
pub mod supervisor;

pub use client::Client;
pub use handler::{Handler, Request};
pub use listener::Listener;
pub use supervisor::Supervisor;
