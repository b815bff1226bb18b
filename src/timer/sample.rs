//! Checkpoint schedules, samples and run traces

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Row counts at which a timing sample is taken.
///
/// Strictly increasing, positive, and fixed before the query runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct CheckpointSchedule(Vec<u64>);

impl CheckpointSchedule {
    /// Build a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchedule`] if `ks` is empty, contains zero, or
    /// is not strictly increasing.
    pub fn new(ks: Vec<u64>) -> Result<Self> {
        if ks.is_empty() {
            return Err(Error::InvalidSchedule("no checkpoints given".to_string()));
        }
        if ks[0] == 0 {
            return Err(Error::InvalidSchedule(
                "checkpoints must be positive row counts".to_string(),
            ));
        }
        if let Some(pair) = ks.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidSchedule(format!(
                "checkpoints must be strictly increasing ({} is followed by {})",
                pair[0], pair[1]
            )));
        }
        Ok(Self(ks))
    }

    /// Checkpoint values in order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Number of checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a valid schedule has at least one checkpoint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `count` is one of the checkpoints.
    #[must_use]
    pub fn contains(&self, count: u64) -> bool {
        self.0.binary_search(&count).is_ok()
    }
}

impl TryFrom<Vec<u64>> for CheckpointSchedule {
    type Error = Error;

    fn try_from(ks: Vec<u64>) -> Result<Self> {
        Self::new(ks)
    }
}

impl From<CheckpointSchedule> for Vec<u64> {
    fn from(schedule: CheckpointSchedule) -> Self {
        schedule.0
    }
}

/// Whether a sample sits on a checkpoint or is the terminal overflow sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// `count` is a checkpoint of the schedule
    Checkpoint,
    /// Fetching stopped between checkpoints (the "others" bucket)
    Overflow,
}

/// One timing observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Rows fetched when the sample was taken
    pub count: u64,
    /// Seconds since fetching started
    pub elapsed_seconds: f64,
    /// Recency-weighted seconds (each inter-row gap scaled by `sigma^n`)
    pub decayed_seconds: f64,
    /// Checkpoint or overflow
    pub kind: SampleKind,
}

impl Sample {
    /// Sample taken exactly at a checkpoint.
    #[must_use]
    pub const fn checkpoint(count: u64, elapsed_seconds: f64, decayed_seconds: f64) -> Self {
        Self {
            count,
            elapsed_seconds,
            decayed_seconds,
            kind: SampleKind::Checkpoint,
        }
    }

    /// Terminal sample taken between checkpoints.
    #[must_use]
    pub const fn overflow(count: u64, elapsed_seconds: f64, decayed_seconds: f64) -> Self {
        Self {
            count,
            elapsed_seconds,
            decayed_seconds,
            kind: SampleKind::Overflow,
        }
    }

    /// `Sample(0, 0, 0)`, returned when no row was ever fetched.
    #[must_use]
    pub const fn floor() -> Self {
        Self::overflow(0, 0.0, 0.0)
    }

    /// Whether this sample is on a checkpoint.
    #[must_use]
    pub const fn is_checkpoint(&self) -> bool {
        matches!(self.kind, SampleKind::Checkpoint)
    }
}

/// Why the timer stopped fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "message")]
pub enum StopReason {
    /// Result set ran out of rows
    Exhausted,
    /// Time budget reached
    BudgetExceeded,
    /// Server canceled the query (statement timeout)
    Canceled(String),
    /// Fetch failed for another reason; partial samples were kept
    Failed(String),
}

/// Samples produced by one execution of one query.
///
/// Never empty: a run that fetched nothing carries [`Sample::floor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    samples: Vec<Sample>,
    fetched: u64,
    stop: StopReason,
}

impl RunTrace {
    pub(crate) fn new(mut samples: Vec<Sample>, fetched: u64, stop: StopReason) -> Self {
        if samples.is_empty() {
            samples.push(Sample::floor());
        }
        Self {
            samples,
            fetched,
            stop,
        }
    }

    /// Build a trace from samples, e.g. when replaying stored results.
    ///
    /// An empty sample list becomes the floor sample.
    #[must_use]
    pub fn from_samples(samples: Vec<Sample>, stop: StopReason) -> Self {
        let fetched = samples.last().map_or(0, |s| s.count);
        Self::new(samples, fetched, stop)
    }

    /// Samples in fetch order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false (see [`RunTrace`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total rows fetched.
    #[must_use]
    pub const fn fetched(&self) -> u64 {
        self.fetched
    }

    /// Why fetching stopped.
    #[must_use]
    pub const fn stop_reason(&self) -> &StopReason {
        &self.stop
    }

    /// The last sample.
    #[must_use]
    pub fn terminal(&self) -> &Sample {
        // `new` guarantees at least one sample
        &self.samples[self.samples.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_validation() {
        assert!(CheckpointSchedule::new(vec![2, 5, 10]).is_ok());
        assert!(CheckpointSchedule::new(vec![]).is_err());
        assert!(CheckpointSchedule::new(vec![0, 5]).is_err());
        assert!(CheckpointSchedule::new(vec![5, 5]).is_err());
        assert!(CheckpointSchedule::new(vec![10, 5]).is_err());
    }

    #[test]
    fn test_schedule_deserialize_validates() {
        let ok: CheckpointSchedule = serde_json::from_str("[10, 20]").unwrap();
        assert!(ok.contains(20));
        assert!(!ok.contains(15));
        assert!(serde_json::from_str::<CheckpointSchedule>("[20, 10]").is_err());
    }

    #[test]
    fn test_empty_trace_gets_floor() {
        let trace = RunTrace::from_samples(Vec::new(), StopReason::Exhausted);
        assert_eq!(trace.samples(), &[Sample::floor()]);
        assert_eq!(trace.fetched(), 0);
    }
}
