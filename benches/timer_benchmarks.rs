//! Checkpoint timer overhead
//!
//! The timer sits between the database and the clock on every row, so its
//! per-row cost bounds how fast a result set can be measured. Synthetic
//! cursors isolate that cost from any real database.
//!
//! Run with: cargo bench --bench timer_benchmarks

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use joinprobe::averager::average_runs;
use joinprobe::config::DEFAULT_CHECKPOINTS;
use joinprobe::cursor::{Session, SqliteSession, SyntheticCursor};
use joinprobe::runlog::RunLog;
use joinprobe::timer::{CheckpointSchedule, CheckpointTimer, MonotonicClock, SimulatedClock};

const SMALL_SIZE: u64 = 1_000;
const LARGE_SIZE: u64 = 100_000;

fn timer() -> CheckpointTimer {
    CheckpointTimer::new(
        CheckpointSchedule::new(DEFAULT_CHECKPOINTS.to_vec()).unwrap(),
        0.99,
    )
    .unwrap()
}

/// Drain synthetic rows on the simulated clock
fn bench_synthetic_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_synthetic_drain");
    let timer = timer();

    for rows in [SMALL_SIZE, LARGE_SIZE] {
        group.bench_with_input(BenchmarkId::new("simulated_clock", rows), &rows, |b, &rows| {
            b.iter(|| {
                let clock = SimulatedClock::new();
                let mut cursor = SyntheticCursor::new(clock.clone(), rows, Duration::from_micros(1));
                timer
                    .run(&mut cursor, &clock, &mut RunLog::sink())
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Drain a recursive CTE from in-memory SQLite with the real clock
fn bench_sqlite_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_sqlite_drain");
    let timer = timer();
    let sql = format!(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {LARGE_SIZE}) \
         SELECT i FROM n"
    );
    let mut session = SqliteSession::open_in_memory().unwrap();
    let clock = MonotonicClock::new();

    group.bench_function(BenchmarkId::new("monotonic_clock", LARGE_SIZE), |b| {
        b.iter(|| {
            session
                .with_cursor(&sql, |cursor| {
                    timer.run(cursor, &clock, &mut RunLog::sink())
                })
                .unwrap()
                .unwrap()
        });
    });

    group.finish();
}

/// Average repeated traces
fn bench_average_runs(c: &mut Criterion) {
    let timer = timer();
    let traces: Vec<_> = (0..10)
        .map(|_| {
            let clock = SimulatedClock::new();
            let mut cursor = SyntheticCursor::new(clock.clone(), LARGE_SIZE, Duration::from_micros(1));
            timer
                .run(&mut cursor, &clock, &mut RunLog::sink())
                .unwrap()
        })
        .collect();

    c.bench_function("average_runs_10x46", |b| {
        b.iter(|| average_runs(black_box(&traces)));
    });
}

criterion_group!(
    benches,
    bench_synthetic_drain,
    bench_sqlite_drain,
    bench_average_runs
);
criterion_main!(benches);
