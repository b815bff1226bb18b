//! Property-based tests for joinprobe
//!
//! - Timer invariants over random schedules, row counts and delays
//! - Averager invariants over random traces
//! - Run with ProptestConfig::with_cases(100)

use std::time::Duration;

use proptest::prelude::*;

use joinprobe::averager::average_runs;
use joinprobe::cursor::SyntheticCursor;
use joinprobe::runlog::RunLog;
use joinprobe::timer::{
    CheckpointSchedule, CheckpointTimer, RunTrace, Sample, SampleKind, SimulatedClock, StopReason,
};
use joinprobe::variant::{Axis, ParamSpace};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Strictly increasing, positive checkpoint list
fn arb_schedule() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::btree_set(1u64..500, 1..20).prop_map(|set| set.into_iter().collect())
}

/// Sigma in (0, 1)
fn arb_sigma() -> impl Strategy<Value = f64> {
    0.01f64..0.999
}

/// A trace with `len` samples and non-decreasing counts
fn arb_trace(len: usize) -> impl Strategy<Value = RunTrace> {
    proptest::collection::vec((1u64..10, 0.0f64..10.0, 0.0f64..10.0), len).prop_map(|steps| {
        let mut count = 0;
        let samples = steps
            .into_iter()
            .map(|(step, elapsed, decayed)| {
                count += step;
                Sample::checkpoint(count, elapsed, decayed)
            })
            .collect();
        RunTrace::from_samples(samples, StopReason::Exhausted)
    })
}

fn run(ks: &[u64], sigma: f64, rows: u64, delay_ms: u64, budget_secs: u64) -> RunTrace {
    let clock = SimulatedClock::new();
    let mut cursor = SyntheticCursor::new(clock.clone(), rows, Duration::from_millis(delay_ms));
    CheckpointTimer::new(CheckpointSchedule::new(ks.to_vec()).unwrap(), sigma)
        .unwrap()
        .with_time_budget(Duration::from_secs(budget_secs))
        .run(&mut cursor, &clock, &mut RunLog::sink())
        .unwrap()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Checkpoint Timer Properties
    // ========================================================================

    /// Property: one sample per reached checkpoint, plus a terminal sample
    #[test]
    fn prop_one_sample_per_checkpoint(
        ks in arb_schedule(),
        sigma in arb_sigma(),
        rows in 0u64..600,
        delay_ms in 1u64..20,
    ) {
        let trace = run(&ks, sigma, rows, delay_ms, 900);
        if rows == 0 {
            prop_assert_eq!(trace.samples(), &[Sample::floor()]);
        } else {
            let reached = ks.iter().filter(|&&k| k <= rows).count();
            let checkpoints = trace.samples().iter().filter(|s| s.is_checkpoint()).count();
            prop_assert_eq!(checkpoints, reached);
            prop_assert_eq!(trace.terminal().count, rows);
            let overflow = trace.samples().iter().filter(|s| s.kind == SampleKind::Overflow).count();
            prop_assert_eq!(overflow, usize::from(!ks.contains(&rows)));
        }
    }

    /// Property: counts, elapsed and weighted time never decrease
    #[test]
    fn prop_samples_monotonic(
        ks in arb_schedule(),
        sigma in arb_sigma(),
        rows in 1u64..600,
        delay_ms in 0u64..20,
    ) {
        let trace = run(&ks, sigma, rows, delay_ms, 900);
        for pair in trace.samples().windows(2) {
            prop_assert!(pair[0].count < pair[1].count);
            prop_assert!(pair[0].elapsed_seconds <= pair[1].elapsed_seconds);
            prop_assert!(pair[0].decayed_seconds <= pair[1].decayed_seconds);
        }
    }

    /// Property: weighted time never exceeds elapsed time
    #[test]
    fn prop_weighted_bounded_by_elapsed(
        ks in arb_schedule(),
        sigma in arb_sigma(),
        rows in 1u64..600,
        delay_ms in 1u64..20,
    ) {
        let trace = run(&ks, sigma, rows, delay_ms, 900);
        for sample in trace.samples() {
            prop_assert!(sample.decayed_seconds <= sample.elapsed_seconds + 1e-9);
        }
    }

    /// Property: an early exit stops between checkpoints as overflow
    #[test]
    fn prop_early_exit_tagged_overflow(
        ks in arb_schedule(),
        budget_secs in 1u64..20,
    ) {
        // one row per second, far more rows than the budget allows
        let trace = run(&ks, 0.9, 10_000, 1_000, budget_secs);
        prop_assert_eq!(trace.stop_reason(), &StopReason::BudgetExceeded);
        let terminal = trace.terminal();
        prop_assert_eq!(terminal.count, budget_secs);
        prop_assert_eq!(terminal.kind == SampleKind::Checkpoint, ks.contains(&budget_secs));
    }

    // ========================================================================
    // Run Averager Properties
    // ========================================================================

    /// Property: averaging identical traces is the identity
    #[test]
    fn prop_average_identical_is_identity(trace in arb_trace(10), n in 1usize..6) {
        let traces = vec![trace.clone(); n];
        let averaged = average_runs(&traces);
        prop_assert_eq!(averaged.points().len(), trace.len());
        for (point, sample) in averaged.points().iter().zip(trace.samples()) {
            prop_assert_eq!(point.count, sample.count);
            prop_assert!((point.mean_elapsed - sample.elapsed_seconds).abs() < 1e-9);
            prop_assert!((point.mean_decayed - sample.decayed_seconds).abs() < 1e-9);
        }
    }

    /// Property: averaging truncates to the shortest trace
    #[test]
    fn prop_average_truncates_to_shortest(
        lens in proptest::collection::vec(1usize..12, 1..6),
    ) {
        let traces: Vec<RunTrace> = lens
            .iter()
            .map(|&len| {
                let samples = (1..=len as u64)
                    .map(|k| Sample::checkpoint(k, k as f64, k as f64 / 2.0))
                    .collect();
                RunTrace::from_samples(samples, StopReason::Exhausted)
            })
            .collect();
        let averaged = average_runs(&traces);
        prop_assert_eq!(averaged.points().len(), *lens.iter().min().unwrap());
        prop_assert_eq!(averaged.runs(), lens.len());
    }

    // ========================================================================
    // Parameter Space Properties
    // ========================================================================

    /// Property: variant count is the product of axis sizes, all distinct
    #[test]
    fn prop_param_space_is_cartesian(sizes in proptest::collection::vec(1usize..5, 0..4)) {
        let axes: Vec<Axis> = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| Axis::new(format!("a{i}"), (0..n).map(|v| v.to_string())))
            .collect();
        let space = ParamSpace::new(axes).unwrap();
        let variants = space.variants();
        prop_assert_eq!(variants.len(), sizes.iter().product::<usize>());
        let mut unique = variants.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), variants.len());
    }
}
