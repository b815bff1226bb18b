//! Deterministic row source on a simulated clock
//!
//! Every fetched row advances the shared [`SimulatedClock`] by a fixed delay,
//! so timing traces are exact and tests never sleep.

use std::time::Duration;

use super::{FetchError, RowCursor, Session, SessionSettings};
use crate::timer::SimulatedClock;
use crate::Result;

/// Cursor yielding a fixed number of rows at a fixed rate.
#[derive(Debug, Clone)]
pub struct SyntheticCursor {
    clock: SimulatedClock,
    rows: u64,
    delay: Duration,
    fetched: u64,
    failure: Option<(u64, FetchError)>,
}

impl SyntheticCursor {
    /// Yield `rows` rows, each arriving `delay` after the previous one.
    #[must_use]
    pub const fn new(clock: SimulatedClock, rows: u64, delay: Duration) -> Self {
        Self {
            clock,
            rows,
            delay,
            fetched: 0,
            failure: None,
        }
    }

    /// Fail with `error` once `after` rows have been handed out.
    #[must_use]
    pub fn fail_after(mut self, after: u64, error: FetchError) -> Self {
        self.failure = Some((after, error));
        self
    }

    /// Rows handed out so far.
    #[must_use]
    pub const fn fetched(&self) -> u64 {
        self.fetched
    }
}

impl RowCursor for SyntheticCursor {
    fn next_row(&mut self) -> std::result::Result<bool, FetchError> {
        if let Some((after, error)) = &self.failure {
            if self.fetched >= *after {
                return Err(error.clone());
            }
        }
        if self.fetched >= self.rows {
            return Ok(false);
        }
        self.clock.advance(self.delay);
        self.fetched += 1;
        Ok(true)
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    pattern: String,
    after: u64,
    error: FetchError,
}

/// Session whose every query yields a [`SyntheticCursor`].
///
/// Statements are recorded instead of executed. Queries containing a
/// registered pattern fail after a given number of rows.
#[derive(Debug, Clone)]
pub struct SyntheticSession {
    clock: SimulatedClock,
    rows: u64,
    delay: Duration,
    failures: Vec<ScriptedFailure>,
    executed: Vec<String>,
}

impl SyntheticSession {
    /// Each query yields `rows` rows spaced `delay` apart on `clock`.
    #[must_use]
    pub const fn new(clock: SimulatedClock, rows: u64, delay: Duration) -> Self {
        Self {
            clock,
            rows,
            delay,
            failures: Vec::new(),
            executed: Vec::new(),
        }
    }

    /// Queries containing `pattern` fail with `error` after `after` rows.
    #[must_use]
    pub fn fail_queries_containing(
        mut self,
        pattern: impl Into<String>,
        after: u64,
        error: FetchError,
    ) -> Self {
        self.failures.push(ScriptedFailure {
            pattern: pattern.into(),
            after,
            error,
        });
        self
    }

    /// Every statement and query seen, in order.
    #[must_use]
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// The clock rows are timed against.
    #[must_use]
    pub const fn clock(&self) -> &SimulatedClock {
        &self.clock
    }
}

impl Session for SyntheticSession {
    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()> {
        self.executed.extend(settings.statements("SET"));
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn with_cursor<R>(
        &mut self,
        sql: &str,
        f: impl FnOnce(&mut dyn RowCursor) -> R,
    ) -> Result<R> {
        self.executed.push(sql.to_string());
        let mut cursor = SyntheticCursor::new(self.clock.clone(), self.rows, self.delay);
        if let Some(failure) = self.failures.iter().find(|f| sql.contains(&f.pattern)) {
            cursor = cursor.fail_after(failure.after, failure.error.clone());
        }
        Ok(f(&mut cursor))
    }
}
