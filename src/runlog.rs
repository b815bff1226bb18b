//! Per-run detail log
//!
//! A plain-text, human-auditable record of each benchmark run, written next
//! to the samples the timer returns. The log is flushed when dropped, so it
//! is released cleanly on every exit path.
//!
//! ```text
//! ========================================================
//! Time of the test run: 2024-05-02 14:03:11.204518
//! BNL: select * from part1 ... #1
//!   time before fetch: 0.000412 sec
//! 50, 0.501234, 0.197523
//! 100, 1.002210, 0.317095
//! Final fetch count before exit: 117, 1.171002, 0.341807
//! Total joined tuples fetched: 117, 1.171002
//! Time of current query run: 1.17 sec
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Sink, Write};
use std::path::Path;

use chrono::Local;

use crate::averager::AveragedTrace;

/// Line-oriented writer for one run (or one variant's runs).
pub struct RunLog<W: Write> {
    out: W,
}

impl RunLog<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened.
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl RunLog<Sink> {
    /// A log that discards everything.
    #[must_use]
    pub fn sink() -> Self {
        Self::new(io::sink())
    }
}

impl<W: Write> RunLog<W> {
    /// Log into any writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// The underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.out
    }

    /// Rule, wall-clock timestamp and `<label>: <query> #<iteration>`.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn header(&mut self, label: &str, query: &str, iteration: usize) -> io::Result<()> {
        writeln!(self.out, "========================================================")?;
        writeln!(
            self.out,
            "Time of the test run: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
        )?;
        writeln!(self.out, "{label}: {query} #{iteration}")
    }

    /// Seconds between submitting the query and the cursor becoming available.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn time_before_fetch(&mut self, seconds: f64) -> io::Result<()> {
        writeln!(self.out, "  time before fetch: {seconds:.6} sec")
    }

    /// `<fetched>, <elapsed>, <weighted>` progress line.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn progress(&mut self, fetched: u64, elapsed: f64, weighted: f64) -> io::Result<()> {
        writeln!(self.out, "{fetched}, {elapsed:.6}, {weighted:.6}")
    }

    /// Terminal sample taken between checkpoints.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn final_fetch(&mut self, fetched: u64, elapsed: f64, weighted: f64) -> io::Result<()> {
        writeln!(
            self.out,
            "Final fetch count before exit: {fetched}, {elapsed:.6}, {weighted:.6}"
        )
    }

    /// Run totals.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn totals(&mut self, fetched: u64, elapsed: f64) -> io::Result<()> {
        writeln!(self.out, "Total joined tuples fetched: {fetched}, {elapsed:.6}")?;
        writeln!(self.out, "Time of current query run: {elapsed:.2} sec")?;
        writeln!(self.out)
    }

    /// Free-form line (errors, cancellations).
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")
    }

    /// Per-checkpoint averages of a variant's runs.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn averages(&mut self, query: &str, averaged: &AveragedTrace) -> io::Result<()> {
        writeln!(self.out, "\tQuery: {query}")?;
        for point in averaged.points() {
            writeln!(
                self.out,
                "K val:{}\tAverage time (unweighted): {:.6}\t Average time (weighted): {:.6}",
                point.count, point.mean_elapsed, point.mean_decayed
            )?;
        }
        Ok(())
    }

    /// Flush buffered lines.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> Drop for RunLog<W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
