//! Row sources and database sessions
//!
//! The timer only ever sees a [`RowCursor`]: something that hands out one row
//! at a time and classifies its failures. Sessions own the connection and
//! lend out a cursor for the duration of one query.
//!
//! ## Backends
//!
//! - [`SqliteSession`]: embedded, always compiled in
//! - [`PostgresSession`]: `sqlx` over a current-thread tokio runtime
//!   (feature `postgres`)
//! - [`SyntheticSession`]: deterministic rows on a simulated clock
//!
//! ```rust
//! use joinprobe::cursor::{RowCursor, Session, SqliteSession};
//!
//! # fn main() -> joinprobe::Result<()> {
//! let mut session = SqliteSession::open_in_memory()?;
//! session.execute_batch("CREATE TABLE t(x); INSERT INTO t VALUES (1), (2);")?;
//!
//! let rows = session.with_cursor("SELECT x FROM t", |cursor| {
//!     let mut n = 0;
//!     while let Ok(true) = cursor.next_row() {
//!         n += 1;
//!     }
//!     n
//! })?;
//! assert_eq!(rows, 2);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "postgres")]
pub(crate) mod postgres;
mod settings;
mod sqlite;
mod synthetic;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSession;
pub use settings::{SessionSettings, Setting};
pub use sqlite::SqliteSession;
pub use synthetic::{SyntheticCursor, SyntheticSession};

use crate::{Error, Result};

/// Why a row fetch failed.
///
/// The three classes drive different outcomes in the timer: a cancel ends
/// fetching normally, a lost connection aborts the variant, anything else is
/// logged and the samples gathered so far are kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Query canceled by the server (statement timeout, interrupt)
    #[error("query canceled: {0}")]
    Canceled(String),
    /// Connection to the database went away
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// Any other fetch failure
    #[error("fetch failed: {0}")]
    Other(String),
}

/// A streaming result set, consumed one row at a time.
pub trait RowCursor {
    /// Fetch the next row.
    ///
    /// Returns `Ok(true)` when a row was fetched and `Ok(false)` once the
    /// result set is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the classified failure reported by the database.
    fn next_row(&mut self) -> std::result::Result<bool, FetchError>;
}

impl<C: RowCursor + ?Sized> RowCursor for &mut C {
    fn next_row(&mut self) -> std::result::Result<bool, FetchError> {
        (**self).next_row()
    }
}

/// An explicitly passed database handle.
///
/// A session is used serially: one query, one cursor at a time.
pub trait Session {
    /// Apply session options (planner switches, memory limits, timeouts)
    /// before the next query executes. They are not reverted.
    ///
    /// # Errors
    ///
    /// Returns error if the database rejects a setting.
    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()>;

    /// Execute one or more statements without streaming their rows.
    ///
    /// # Errors
    ///
    /// Returns error if any statement fails.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// Submit `sql` and lend a streaming cursor over its result to `f`.
    ///
    /// The cursor is released when `f` returns, whatever it returns.
    ///
    /// # Errors
    ///
    /// Returns error if the query cannot be prepared or submitted. Errors
    /// raised while fetching are reported through the cursor instead.
    fn with_cursor<R>(&mut self, sql: &str, f: impl FnOnce(&mut dyn RowCursor) -> R)
        -> Result<R>;
}

/// A session for whichever backend a database URL names.
pub enum AnySession {
    /// Embedded SQLite database
    Sqlite(SqliteSession),
    /// PostgreSQL server
    #[cfg(feature = "postgres")]
    Postgres(PostgresSession),
}

impl AnySession {
    /// Connect to the database named by `url`.
    ///
    /// Accepted forms: `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>`,
    /// `postgres://...` and `postgresql://...`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL scheme is unknown, the backend is not
    /// compiled in, or the connection fails.
    pub fn connect(url: &str) -> Result<Self> {
        if url == "sqlite::memory:" {
            return Ok(Self::Sqlite(SqliteSession::open_in_memory()?));
        }
        if let Some(path) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            return Ok(Self::Sqlite(SqliteSession::open(path)?));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            #[cfg(feature = "postgres")]
            return Ok(Self::Postgres(PostgresSession::connect(url)?));
            #[cfg(not(feature = "postgres"))]
            return Err(Error::InvalidConfig(
                "PostgreSQL support not compiled in (enable the `postgres` feature)".to_string(),
            ));
        }
        Err(Error::InvalidConfig(format!(
            "unsupported database URL `{url}` (expected sqlite: or postgres://)"
        )))
    }
}

impl Session for AnySession {
    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()> {
        match self {
            Self::Sqlite(session) => session.apply_settings(settings),
            #[cfg(feature = "postgres")]
            Self::Postgres(session) => session.apply_settings(settings),
        }
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        match self {
            Self::Sqlite(session) => session.execute_batch(sql),
            #[cfg(feature = "postgres")]
            Self::Postgres(session) => session.execute_batch(sql),
        }
    }

    fn with_cursor<R>(
        &mut self,
        sql: &str,
        f: impl FnOnce(&mut dyn RowCursor) -> R,
    ) -> Result<R> {
        match self {
            Self::Sqlite(session) => session.with_cursor(sql, f),
            #[cfg(feature = "postgres")]
            Self::Postgres(session) => session.with_cursor(sql, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_sqlite_memory() {
        let session = AnySession::connect("sqlite::memory:").unwrap();
        assert!(matches!(session, AnySession::Sqlite(_)));
    }

    #[test]
    fn test_connect_unknown_scheme() {
        let err = AnySession::connect("mysql://localhost/db").err().unwrap();
        assert!(err.to_string().contains("unsupported database URL"));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Canceled("statement timeout".to_string());
        assert_eq!(err.to_string(), "query canceled: statement timeout");
    }
}
