//! Machine-readable record of a sweep

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::averager::{AveragedTrace, SummaryLine};
use crate::timer::RunTrace;
use crate::Result;

/// Final state of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// Every repetition ran and was averaged
    Completed,
    /// The variant was abandoned; the sweep moved on
    Failed,
}

/// What happened to one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOutcome {
    /// `name=value, ...` label
    pub variant: String,
    /// Rendered query, when rendering succeeded
    pub query: Option<String>,
    /// Completed or failed
    pub status: VariantStatus,
    /// Failure message
    pub error: Option<String>,
    /// Every repetition's trace (partial when failed mid-way)
    pub runs: Vec<RunTrace>,
    /// Average over `runs`, when completed
    pub averaged: Option<AveragedTrace>,
}

/// What was written for one summary group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutcome {
    /// Group label
    pub group: String,
    /// Output path
    pub path: String,
    /// Variants averaged into the group
    pub variants: usize,
    /// Lines written
    pub lines: Vec<SummaryLine>,
    /// Write failure, if any
    pub error: Option<String>,
}

/// Record of a whole sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// When the sweep started
    pub started_at: DateTime<Utc>,
    /// When the summaries were written
    pub finished_at: DateTime<Utc>,
    /// Per-variant outcomes, in sweep order
    pub variants: Vec<VariantOutcome>,
    /// Per-group summaries
    pub summaries: Vec<SummaryOutcome>,
}

impl SweepReport {
    /// Number of variants that completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.variants
            .iter()
            .filter(|v| v.status == VariantStatus::Completed)
            .count()
    }

    /// Number of variants that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.variants.len() - self.completed()
    }

    /// Write as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
