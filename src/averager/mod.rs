//! Run Averager
//!
//! Two levels of averaging:
//!
//! 1. [`average_runs`]: repeated executions of the same variant, aligned by
//!    sample index. The shortest run truncates the window for all of them.
//! 2. [`GroupAccumulator`]: averaged traces of related variants (e.g. three
//!    random shuffles of one dataset) folded into one mean per checkpoint.
//!
//! The same cross-variant step also works on summary files already written
//! to disk, see [`average_summary_files`].

mod summary;

pub use summary::{
    average_summary_files, read_summary, write_entries, write_summary, SummaryEntry,
    SummaryFormat,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::timer::{CheckpointSchedule, RunTrace, SampleKind};

/// How to treat a checkpoint that some variants never reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Average over the variants that have a value; omit the checkpoint if
    /// none do. A warning is logged whenever values are missing.
    #[default]
    Skip,
    /// Count a missing value as zero seconds (divide by all variants).
    Zero,
    /// Average over the variants that have a value, and report a checkpoint
    /// no variant reached as zero instead of omitting it.
    FillZero,
}

/// Mean times at one sample position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedPoint {
    /// Row count of the first run's sample at this position
    pub count: u64,
    /// Checkpoint or overflow, from the first run
    pub kind: SampleKind,
    /// Mean elapsed seconds
    pub mean_elapsed: f64,
    /// Mean decayed seconds
    pub mean_decayed: f64,
}

impl AveragedPoint {
    /// Accumulation bucket of this point.
    #[must_use]
    pub const fn bucket(&self) -> Bucket {
        match self.kind {
            SampleKind::Checkpoint => Bucket::Checkpoint(self.count),
            SampleKind::Overflow => Bucket::Others,
        }
    }
}

/// Per-position means over the runs of one variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedTrace {
    points: Vec<AveragedPoint>,
    runs: usize,
}

impl AveragedTrace {
    /// Averaged points in sample order.
    #[must_use]
    pub fn points(&self) -> &[AveragedPoint] {
        &self.points
    }

    /// Number of runs that were averaged.
    #[must_use]
    pub const fn runs(&self) -> usize {
        self.runs
    }
}

/// Average `traces` position by position.
///
/// Only the first `min(len)` positions are averaged. Each point takes its
/// count and kind from the first trace; all runs share one schedule, so the
/// positions line up.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_runs(traces: &[RunTrace]) -> AveragedTrace {
    let Some(first) = traces.first() else {
        return AveragedTrace::default();
    };
    let n = traces.len() as f64;
    let window = traces.iter().map(RunTrace::len).min().unwrap_or(0);

    let points = (0..window)
        .map(|j| {
            let (elapsed, decayed) = traces.iter().fold((0.0, 0.0), |(e, d), trace| {
                let sample = &trace.samples()[j];
                (e + sample.elapsed_seconds, d + sample.decayed_seconds)
            });
            let tag = &first.samples()[j];
            AveragedPoint {
                count: tag.count,
                kind: tag.kind,
                mean_elapsed: elapsed / n,
                mean_decayed: decayed / n,
            }
        })
        .collect();

    AveragedTrace {
        points,
        runs: traces.len(),
    }
}

/// Where an averaged point is accumulated across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    /// A checkpoint of the schedule
    Checkpoint(u64),
    /// Terminal overflow samples of any count
    Others,
}

/// One line of a group summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    /// Checkpoint
    pub k: u64,
    /// Mean elapsed seconds across variants
    pub unweighted: f64,
    /// Mean decayed seconds across variants
    pub weighted: f64,
}

#[derive(Debug, Clone, Default)]
struct BucketTimes {
    unweighted: Vec<f64>,
    weighted: Vec<f64>,
}

/// Collects averaged traces keyed by `(group, bucket)`.
#[derive(Debug, Clone)]
pub struct GroupAccumulator<G: Ord> {
    times: BTreeMap<(G, Bucket), BucketTimes>,
    contributors: BTreeMap<G, usize>,
}

impl<G: Ord> Default for GroupAccumulator<G> {
    fn default() -> Self {
        Self {
            times: BTreeMap::new(),
            contributors: BTreeMap::new(),
        }
    }
}

impl<G: Ord + Clone> GroupAccumulator<G> {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one variant's averaged trace to `group`.
    pub fn record(&mut self, group: &G, trace: &AveragedTrace) {
        *self.contributors.entry(group.clone()).or_default() += 1;
        for point in trace.points() {
            let slot = self.times.entry((group.clone(), point.bucket())).or_default();
            slot.unweighted.push(point.mean_elapsed);
            slot.weighted.push(point.mean_decayed);
        }
    }

    /// Number of variants recorded into `group`.
    #[must_use]
    pub fn contributors(&self, group: &G) -> usize {
        self.contributors.get(group).copied().unwrap_or(0)
    }

    /// Mean `(unweighted, weighted)` for one bucket, if any variant has it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self, group: &G, bucket: Bucket) -> Option<(f64, f64)> {
        let slot = self.times.get(&(group.clone(), bucket))?;
        let n = slot.unweighted.len() as f64;
        Some((
            slot.unweighted.iter().sum::<f64>() / n,
            slot.weighted.iter().sum::<f64>() / n,
        ))
    }

    /// One line per checkpoint of `schedule` for `group`.
    ///
    /// Missing checkpoints follow `policy`: omitted under
    /// [`MissingValuePolicy::Skip`], reported as zero under
    /// [`MissingValuePolicy::Zero`] and [`MissingValuePolicy::FillZero`].
    /// Under `Zero`, checkpoints that only some variants reached are also
    /// divided by the full variant count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(
        &self,
        group: &G,
        schedule: &CheckpointSchedule,
        policy: MissingValuePolicy,
    ) -> Vec<SummaryLine> {
        let variants = self.contributors(group);
        let mut lines = Vec::with_capacity(schedule.len());
        let mut missing = 0usize;

        for &k in schedule.as_slice() {
            let slot = self.times.get(&(group.clone(), Bucket::Checkpoint(k)));
            let present = slot.map_or(0, |s| s.weighted.len());
            if present < variants {
                missing += 1;
            }
            let divisor = match (slot, policy) {
                (Some(_), MissingValuePolicy::Zero) => variants.max(present),
                (Some(_), MissingValuePolicy::Skip | MissingValuePolicy::FillZero) => present,
                (None, MissingValuePolicy::Zero | MissingValuePolicy::FillZero) => {
                    lines.push(SummaryLine {
                        k,
                        unweighted: 0.0,
                        weighted: 0.0,
                    });
                    continue;
                }
                (None, MissingValuePolicy::Skip) => continue,
            };
            if let Some(slot) = slot {
                let n = divisor as f64;
                lines.push(SummaryLine {
                    k,
                    unweighted: slot.unweighted.iter().sum::<f64>() / n,
                    weighted: slot.weighted.iter().sum::<f64>() / n,
                });
            }
        }

        if missing > 0 {
            warn!(
                missing,
                variants,
                ?policy,
                "some checkpoints were not reached by every variant"
            );
        }
        lines
    }
}
