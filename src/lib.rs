//! # joinprobe: checkpoint-timed join benchmarks
//!
//! **Version**: 0.1.0
//!
//! joinprobe measures how quickly a join produces its *first* results. A
//! query is streamed row by row; at fixed row-count checkpoints the harness
//! records wall-clock time and a recency-weighted time in which each later
//! row counts geometrically less (factor `sigma` per row). Runs are averaged
//! and swept over a Cartesian product of query parameters.
//!
//! ## Components
//!
//! - [`timer`]: Checkpoint Timer, drains one cursor and samples it
//! - [`averager`]: Run Averager, averages traces and summary files
//! - [`sweep`]: Parameter Sweep Driver, runs every variant of a config
//! - [`cursor`]: database sessions (PostgreSQL, SQLite, synthetic)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use joinprobe::cursor::SyntheticCursor;
//! use joinprobe::runlog::RunLog;
//! use joinprobe::timer::{CheckpointSchedule, CheckpointTimer, SimulatedClock};
//!
//! # fn main() -> joinprobe::Result<()> {
//! let clock = SimulatedClock::new();
//! let mut cursor = SyntheticCursor::new(clock.clone(), 1_000, Duration::from_millis(1));
//!
//! let timer = CheckpointTimer::new(CheckpointSchedule::new(vec![10, 100, 1_000])?, 0.99)?;
//! let trace = timer.run(&mut cursor, &clock, &mut RunLog::sink())?;
//!
//! assert_eq!(trace.len(), 3);
//! assert_eq!(trace.terminal().count, 1_000);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod averager;
pub mod config;
pub mod cursor;
pub mod error;
pub mod runlog;
pub mod shuffle;
pub mod sweep;
pub mod timer;
pub mod variant;

pub use error::{Error, Result};
