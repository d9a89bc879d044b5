//! Stress tests for the daemon supervisor: no process leaks (invariant 5,
//! zombies), no descriptor leaks, and correct behavior under concurrent
//! load (invariant 7, independent per-request state).
//!
//! These exercise the real double-fork daemonization and per-request fork
//! dispatch in `daemon::supervisor`, not just the foreground demo server.

use primed::app::ExitOutcome;
use primed::config::AppConfig;
use primed::daemon::Supervisor;
use serial_test::serial;
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Count open file descriptors for the current process.
fn fd_count() -> usize {
    let path = format!("/proc/{}/fd", std::process::id());
    std::fs::read_dir(path).map(|rd| rd.count()).unwrap_or(0)
}

/// Count zombie processes owned by the current user.
fn zombie_count() -> usize {
    Command::new("ps")
        .args(["--no-headers", "-o", "stat", "-u", &whoami::username()])
        .output()
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .filter(|line| line.starts_with('Z'))
                .count()
        })
        .unwrap_or(0)
}

fn test_config(app_name: &str) -> (tempfile::TempDir, AppConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::with_home(app_name, dir.path());
    (dir, config)
}

fn supervisor(config: AppConfig) -> Supervisor<impl Fn() -> anyhow::Result<()>, impl Fn(&primed::Request) -> anyhow::Result<ExitOutcome>> {
    Supervisor::new(config, || Ok(()), |_request| Ok(ExitOutcome::Exit(0)))
}

#[test]
#[serial]
fn stress_sequential_requests() {
    let (_dir, config) = test_config("stress-sequential");
    let sup = supervisor(config);

    let start_fd = fd_count();
    let start_zombies = zombie_count();

    for i in 0..100 {
        let code = sup.run().unwrap_or_else(|e| panic!("request {i} failed: {e}"));
        assert_eq!(code, 0, "request {i} returned non-zero");
    }

    // Give the daemon a moment to reap any stray state before re-measuring.
    thread::sleep(Duration::from_millis(50));

    let end_fd = fd_count();
    let end_zombies = zombie_count();

    assert!(
        end_fd <= start_fd + 3,
        "FD leak detected: {start_fd} -> {end_fd}"
    );
    assert!(
        end_zombies <= start_zombies,
        "zombie leak detected: {start_zombies} -> {end_zombies}"
    );
}

#[test]
#[serial]
fn stress_concurrent_requests() {
    let (_dir, config) = test_config("stress-concurrent");
    // Prime the daemon once up front so every thread below hits the fast path.
    supervisor(config.clone()).run().expect("priming request failed");

    let start_fd = fd_count();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let config = config.clone();
            thread::spawn(move || {
                let code = supervisor(config).run().unwrap_or_else(|e| panic!("concurrent request {i} failed: {e}"));
                assert_eq!(code, 0, "concurrent request {i} returned non-zero");
            })
        })
        .collect();

    for h in handles {
        h.join().expect("thread panicked");
    }

    thread::sleep(Duration::from_millis(100));

    let end_fd = fd_count();
    assert!(
        end_fd <= start_fd + 3,
        "FD leak after concurrent requests: {start_fd} -> {end_fd}"
    );
}

#[test]
#[serial]
fn stress_rapid_connect_disconnect() {
    let (_dir, config) = test_config("stress-rapid");
    let sup = supervisor(config.clone());
    sup.run().expect("priming request failed");

    for _ in 0..100 {
        let _ = std::os::unix::net::UnixStream::connect(config.socket_path());
    }

    let code = sup.run().expect("daemon unresponsive after rapid connects");
    assert_eq!(code, 0);
}
