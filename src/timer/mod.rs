//! Checkpoint Timer
//!
//! Drains a streaming result set one row at a time and turns it into a small
//! set of timing samples: one per checkpoint reached, plus one terminal
//! overflow sample when fetching stops between checkpoints.
//!
//! ## Weighted time
//!
//! Every inter-row gap is scaled by a factor that starts at `sigma` and is
//! multiplied by `sigma` after each row:
//!
//! ```text
//! weighted = Σ (t_i - t_{i-1}) · sigma^i
//! ```
//!
//! Late rows count less than early ones, which rewards join algorithms that
//! produce their first results quickly. For a constant gap `d` the sum tends
//! to `d · sigma / (1 - sigma)`.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use joinprobe::cursor::SyntheticCursor;
//! use joinprobe::runlog::RunLog;
//! use joinprobe::timer::{CheckpointSchedule, CheckpointTimer, SampleKind, SimulatedClock};
//!
//! # fn main() -> joinprobe::Result<()> {
//! let clock = SimulatedClock::new();
//! let mut cursor = SyntheticCursor::new(clock.clone(), 6, Duration::from_millis(100));
//! let timer = CheckpointTimer::new(CheckpointSchedule::new(vec![2, 5])?, 0.5)?
//!     .with_time_budget(Duration::from_secs(10));
//!
//! let trace = timer.run(&mut cursor, &clock, &mut RunLog::sink())?;
//! let counts: Vec<u64> = trace.samples().iter().map(|s| s.count).collect();
//! assert_eq!(counts, vec![2, 5, 6]);
//! assert_eq!(trace.terminal().kind, SampleKind::Overflow);
//! # Ok(())
//! # }
//! ```

mod clock;
mod sample;

pub use clock::{Clock, MonotonicClock, SimulatedClock};
pub use sample::{CheckpointSchedule, RunTrace, Sample, SampleKind, StopReason};

use std::io::Write;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cursor::{FetchError, RowCursor};
use crate::runlog::RunLog;
use crate::{Error, Result};

/// Default number of rows between progress lines in the run log
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50;

/// Default time budget (15 minutes)
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(900);

/// Streams rows and samples elapsed/decayed time at checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointTimer {
    schedule: CheckpointSchedule,
    sigma: f64,
    time_budget: Duration,
    progress_interval: u64,
}

impl CheckpointTimer {
    /// Create a timer with the default budget and progress interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] unless `0 < sigma < 1`.
    pub fn new(schedule: CheckpointSchedule, sigma: f64) -> Result<Self> {
        if !(sigma > 0.0 && sigma < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "decay factor sigma must lie in (0, 1), got {sigma}"
            )));
        }
        Ok(Self {
            schedule,
            sigma,
            time_budget: DEFAULT_TIME_BUDGET,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        })
    }

    /// Stop fetching once this much time has elapsed.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Write a progress line every `rows` rows (0 disables them).
    #[must_use]
    pub const fn with_progress_interval(mut self, rows: u64) -> Self {
        self.progress_interval = rows;
        self
    }

    /// The checkpoint schedule.
    #[must_use]
    pub const fn schedule(&self) -> &CheckpointSchedule {
        &self.schedule
    }

    /// The decay factor.
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    /// The time budget.
    #[must_use]
    pub const fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// Drain `cursor` and sample it against `clock`.
    ///
    /// The budget is checked after each row, so one slow fetch can overrun
    /// it. A canceled query or any fetch error other than a lost connection
    /// ends fetching and keeps the samples gathered so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the connection drops, and
    /// [`Error::Io`] if the run log cannot be written.
    pub fn run<C, K, W>(&self, cursor: &mut C, clock: &K, log: &mut RunLog<W>) -> Result<RunTrace>
    where
        C: RowCursor + ?Sized,
        K: Clock + ?Sized,
        W: Write,
    {
        let budget = self.time_budget.as_secs_f64();
        let mut checkpoints = self.schedule.as_slice().iter().copied().peekable();
        let mut samples = Vec::with_capacity(self.schedule.len() + 1);

        let start = clock.now();
        let mut prev = start;
        let mut factor = self.sigma;
        let mut weighted = 0.0;
        let mut elapsed = 0.0;
        let mut fetched: u64 = 0;
        let mut recorded = false;
        let mut next_progress = self.progress_interval;

        let stop = loop {
            match cursor.next_row() {
                Ok(true) => {}
                Ok(false) => break StopReason::Exhausted,
                Err(FetchError::Canceled(message)) => {
                    info!(fetched, %message, "query canceled, keeping partial samples");
                    log.note(&format!("Query was canceled: {message}"))?;
                    break StopReason::Canceled(message);
                }
                Err(FetchError::ConnectionLost(message)) => {
                    error!(fetched, %message, "database connection lost");
                    log.note(&format!("Database connection issue: {message}"))?;
                    log.flush()?;
                    return Err(Error::ConnectionLost(message));
                }
                Err(FetchError::Other(message)) => {
                    warn!(fetched, %message, "fetch failed, keeping partial samples");
                    log.note(&format!("An unexpected error occurred: {message}"))?;
                    break StopReason::Failed(message);
                }
            }

            fetched += 1;
            let current = clock.now();
            weighted += current.saturating_sub(prev).as_secs_f64() * factor;
            prev = current;
            factor *= self.sigma;
            elapsed = current.saturating_sub(start).as_secs_f64();

            if next_progress > 0 && fetched == next_progress {
                next_progress += self.progress_interval;
                log.progress(fetched, elapsed, weighted)?;
            }

            recorded = checkpoints.next_if_eq(&fetched).is_some();
            if recorded {
                samples.push(Sample::checkpoint(fetched, elapsed, weighted));
            }

            if elapsed >= budget {
                debug!(fetched, elapsed, "time budget exceeded");
                break StopReason::BudgetExceeded;
            }
        };

        if fetched == 0 {
            warn!("no rows fetched");
        } else if !recorded {
            samples.push(Sample::overflow(fetched, elapsed, weighted));
            log.final_fetch(fetched, elapsed, weighted)?;
        }
        log.totals(fetched, elapsed)?;
        log.flush()?;

        info!(fetched, elapsed, weighted, stop = ?stop, "run finished");
        Ok(RunTrace::new(samples, fetched, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::SyntheticCursor;

    fn timer(ks: Vec<u64>, sigma: f64) -> CheckpointTimer {
        CheckpointTimer::new(CheckpointSchedule::new(ks).unwrap(), sigma).unwrap()
    }

    #[test]
    fn test_sigma_out_of_range() {
        let ks = CheckpointSchedule::new(vec![1]).unwrap();
        assert!(CheckpointTimer::new(ks.clone(), 0.0).is_err());
        assert!(CheckpointTimer::new(ks.clone(), 1.0).is_err());
        assert!(CheckpointTimer::new(ks, f64::NAN).is_err());
    }

    #[test]
    fn test_zero_rows_gives_floor() {
        let clock = SimulatedClock::new();
        let mut cursor = SyntheticCursor::new(clock.clone(), 0, Duration::from_millis(10));
        let trace = timer(vec![1, 2], 0.9)
            .run(&mut cursor, &clock, &mut RunLog::sink())
            .unwrap();
        assert_eq!(trace.samples(), &[Sample::floor()]);
        assert_eq!(trace.stop_reason(), &StopReason::Exhausted);
    }

    #[test]
    fn test_ending_on_checkpoint_adds_no_overflow() {
        let clock = SimulatedClock::new();
        let mut cursor = SyntheticCursor::new(clock.clone(), 5, Duration::from_millis(10));
        let trace = timer(vec![2, 5], 0.9)
            .run(&mut cursor, &clock, &mut RunLog::sink())
            .unwrap();
        assert_eq!(trace.len(), 2);
        assert!(trace.samples().iter().all(Sample::is_checkpoint));
    }

    #[test]
    fn test_weighted_first_rows() {
        // gaps of 1s, sigma 0.5: 0.5 + 0.25 = 0.75
        let clock = SimulatedClock::new();
        let mut cursor = SyntheticCursor::new(clock.clone(), 2, Duration::from_secs(1));
        let trace = timer(vec![2], 0.5)
            .run(&mut cursor, &clock, &mut RunLog::sink())
            .unwrap();
        let sample = trace.samples()[0];
        assert!((sample.elapsed_seconds - 2.0).abs() < 1e-9);
        assert!((sample.decayed_seconds - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_progress_lines() {
        let clock = SimulatedClock::new();
        let mut cursor = SyntheticCursor::new(clock.clone(), 120, Duration::from_millis(1));
        let mut log = RunLog::new(Vec::new());
        timer(vec![1000], 0.99)
            .run(&mut cursor, &clock, &mut log)
            .unwrap();
        let text = String::from_utf8(log.get_ref().clone()).unwrap();
        let progress: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("50, ") || l.starts_with("100, "))
            .collect();
        assert_eq!(progress.len(), 2);
        assert!(text.contains("Final fetch count before exit: 120"));
        assert!(text.contains("Total joined tuples fetched: 120"));
    }

    #[test]
    fn test_connection_lost_is_error() {
        let clock = SimulatedClock::new();
        let mut cursor = SyntheticCursor::new(clock.clone(), 10, Duration::ZERO)
            .fail_after(3, FetchError::ConnectionLost("server closed".to_string()));
        let result = timer(vec![1, 2], 0.9).run(&mut cursor, &clock, &mut RunLog::sink());
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
    }
}
