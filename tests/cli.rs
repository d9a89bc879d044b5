//! Integration tests for the `primed` CLI.
//!
//! These run the compiled binary and verify its observable behavior: help
//! and version output, the client/server execute handshake end to end
//! (E1/E2), and stale-socket reclaim (E4).

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Read;
use std::os::unix::net::UnixListener;
use std::thread;
use std::time::Duration;

fn primed() -> Command {
    cargo_bin_cmd!("primed")
}

#[test]
fn cli_no_args_shows_usage_error() {
    primed()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn cli_help_flag_shows_help() {
    primed()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Preloading command-execution daemon substrate"));
}

#[test]
fn cli_version_flag_shows_version() {
    primed()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("primed"));
}

#[test]
fn server_help_describes_socket_path() {
    primed()
        .args(["server", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("socket"));
}

#[test]
fn client_fails_fast_against_a_dead_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");

    primed()
        .args(["client", socket_path.to_str().unwrap()])
        .assert()
        .failure();
}

/// E1/E2-flavored end-to-end test: start the foreground demo server, run a
/// client against it, and check the exit code and captured stdout.
#[test]
fn client_round_trips_argv_through_the_demo_server() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");

    let mut server = primed()
        .args(["server", socket_path.to_str().unwrap()])
        .spawn()
        .expect("failed to spawn demo server");

    // The server creates the socket file as soon as it binds; poll for it
    // rather than guessing a fixed warmup delay.
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(socket_path.exists(), "server never bound its socket");

    let output = primed()
        .args(["client", socket_path.to_str().unwrap(), "hi"])
        .output()
        .expect("client failed to run");

    assert!(output.status.success());
    // The client ships its full process argv (binary name, subcommand,
    // socket path, and trailing args) across the wire; the demo echo
    // handler writes it back verbatim.
    assert!(String::from_utf8_lossy(&output.stdout).trim().ends_with("hi"));

    let _ = server.kill();
    let _ = server.wait();
}

/// E4 stale socket reclaim: a socket file with no listener behind it must
/// be unlinked and rebound rather than treated as `AlreadyRunning`.
#[test]
fn server_reclaims_a_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");

    // Leave a socket inode behind with nothing accepting on it.
    {
        let listener = UnixListener::bind(&socket_path).unwrap();
        drop(listener);
    }
    assert!(socket_path.exists());

    let mut server = primed()
        .args(["server", socket_path.to_str().unwrap()])
        .spawn()
        .expect("failed to spawn demo server");

    for _ in 0..50 {
        if UnixListener::bind(&socket_path).is_err() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    let mut stream = std::os::unix::net::UnixStream::connect(&socket_path)
        .expect("server never rebound the reclaimed socket");
    let _ = stream.read(&mut [0u8; 1]);

    let _ = server.kill();
    let _ = server.wait();
}
