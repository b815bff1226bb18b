//! Summary file formats and cross-variant file averaging

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{MissingValuePolicy, SummaryLine};
use crate::{Error, Result};

/// Layout of a group summary file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFormat {
    /// `<k>\t<weighted>`
    #[default]
    Weighted,
    /// `<k>\t<unweighted>`
    Unweighted,
    /// `K val:<k>\tAverage time (unweighted): <f>\t Average time (weighted): <f>`
    Verbose,
    /// `(<k>, <unweighted>) (<k>, <weighted>)`
    Pair,
}

/// Write summary lines in `format`.
///
/// # Errors
///
/// Returns error if the write fails.
pub fn write_summary<W: Write>(
    out: &mut W,
    lines: &[SummaryLine],
    format: SummaryFormat,
) -> io::Result<()> {
    for line in lines {
        match format {
            SummaryFormat::Weighted => writeln!(out, "{}\t{}", line.k, line.weighted)?,
            SummaryFormat::Unweighted => writeln!(out, "{}\t{}", line.k, line.unweighted)?,
            SummaryFormat::Verbose => writeln!(
                out,
                "K val:{}\tAverage time (unweighted): {:.6}\t Average time (weighted): {:.6}",
                line.k, line.unweighted, line.weighted
            )?,
            SummaryFormat::Pair => writeln!(
                out,
                "({k}, {:.6}) ({k}, {:.6})",
                line.unweighted,
                line.weighted,
                k = line.k
            )?,
        }
    }
    out.flush()
}

/// One `<key>\t<value>` line of a tab-separated summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Checkpoint label, kept verbatim
    pub key: String,
    /// Averaged seconds
    pub value: f64,
}

/// Read a tab-separated summary file. Blank lines are skipped.
///
/// # Errors
///
/// Returns error if the file cannot be read or a line is not
/// `<key>\t<number>`.
pub fn read_summary(path: impl AsRef<Path>) -> Result<Vec<SummaryEntry>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let malformed = |reason: &str| Error::MalformedSummary {
            path: path.display().to_string(),
            line: idx + 1,
            reason: reason.to_string(),
        };
        let (key, value) = raw
            .split_once('\t')
            .ok_or_else(|| malformed("expected `<k>\\t<value>`"))?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(&format!("bad value: {e}")))?;
        entries.push(SummaryEntry {
            key: key.trim().to_string(),
            value,
        });
    }
    Ok(entries)
}

/// Average several variants' summary files checkpoint by checkpoint.
///
/// Entries are aligned by key, in order of first appearance (first file
/// first). A key missing from some files is handled by `policy`. A file that
/// cannot be read or parsed is logged and treated as having no keys at all.
///
/// # Errors
///
/// Returns error if `inputs` is empty or none of them can be read.
#[allow(clippy::cast_precision_loss)]
pub fn average_summary_files<P: AsRef<Path>>(
    inputs: &[P],
    policy: MissingValuePolicy,
) -> Result<Vec<SummaryEntry>> {
    if inputs.is_empty() {
        return Err(Error::Other("no summary files to average".to_string()));
    }

    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, Vec<f64>> = HashMap::new();
    let mut readable = 0usize;
    for input in inputs {
        let entries = match read_summary(input) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %input.as_ref().display(), error = %err, "skipping summary file");
                continue;
            }
        };
        readable += 1;
        for entry in entries {
            let slot = values.entry(entry.key.clone()).or_insert_with(|| {
                order.push(entry.key.clone());
                Vec::new()
            });
            slot.push(entry.value);
        }
    }
    if readable == 0 {
        return Err(Error::Other(format!(
            "none of the {} summary files could be read",
            inputs.len()
        )));
    }

    let files = inputs.len();
    let mut averaged = Vec::with_capacity(order.len());
    for key in order {
        let present = &values[&key];
        if present.len() < files {
            warn!(key = %key, present = present.len(), files, ?policy, "checkpoint missing from some summaries");
        }
        let divisor = match policy {
            MissingValuePolicy::Skip | MissingValuePolicy::FillZero => present.len(),
            MissingValuePolicy::Zero => files.max(present.len()),
        };
        averaged.push(SummaryEntry {
            value: present.iter().sum::<f64>() / divisor as f64,
            key,
        });
    }
    Ok(averaged)
}

/// Write `<key>\t<value>` lines with ten decimal places.
///
/// # Errors
///
/// Returns error if the write fails.
pub fn write_entries<W: Write>(out: &mut W, entries: &[SummaryEntry]) -> io::Result<()> {
    for entry in entries {
        writeln!(out, "{}\t{:.10}", entry.key, entry.value)?;
    }
    out.flush()
}
