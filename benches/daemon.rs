//! Latency benchmarks for the daemon substrate.
//!
//! - `daemon_echo`: one fast-path execute against a warmed-up daemon.
//! - `daemon_sequential_10`: ten back-to-back executes, for consistency.
//! - `daemon_concurrent_10`: ten concurrent executes, for contention.
//!
//! A fresh daemon is spawned once per benchmark group under an isolated
//! temp-dir `AppConfig`, so these never touch a real `$HOME`.

use criterion::{criterion_group, criterion_main, Criterion};
use primed::app::ExitOutcome;
use primed::config::AppConfig;
use primed::daemon::Supervisor;

fn warmed_up_supervisor(
    dir: &std::path::Path,
) -> Supervisor<impl Fn() -> anyhow::Result<()>, impl Fn(&primed::Request) -> anyhow::Result<ExitOutcome>> {
    let config = AppConfig::with_home("bench-daemon", dir);
    let sup = Supervisor::new(config, || Ok(()), |_request| Ok(ExitOutcome::Exit(0)));
    sup.run().expect("failed to warm up daemon");
    sup
}

fn bench_daemon_echo(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let sup = warmed_up_supervisor(dir.path());

    c.bench_function("daemon_echo", |b| {
        b.iter(|| {
            let code = sup.run().expect("execute failed");
            assert_eq!(code, 0);
        })
    });
}

fn bench_sequential_requests(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let sup = warmed_up_supervisor(dir.path());

    c.bench_function("daemon_sequential_10", |b| {
        b.iter(|| {
            for _ in 0..10 {
                let _ = sup.run();
            }
        })
    });
}

fn bench_concurrent_requests(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    warmed_up_supervisor(dir.path());
    let config = AppConfig::with_home("bench-daemon", dir.path());

    c.bench_function("daemon_concurrent_10", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..10)
                .map(|_| {
                    let config = config.clone();
                    std::thread::spawn(move || {
                        let sup = Supervisor::new(config, || Ok(()), |_request| Ok(ExitOutcome::Exit(0)));
                        sup.run()
                    })
                })
                .collect();

            for h in handles {
                let _ = h.join();
            }
        })
    });
}

criterion_group!(
    benches,
    bench_daemon_echo,
    bench_sequential_requests,
    bench_concurrent_requests,
);
criterion_main!(benches);
