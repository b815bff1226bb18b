//! SQLite session: rows are stepped one at a time from a prepared statement

use std::path::Path;

use rusqlite::{Connection, ErrorCode, InterruptHandle, Rows};
use tracing::debug;

use super::{FetchError, RowCursor, Session, SessionSettings};
use crate::Result;

/// Session over an embedded SQLite connection.
///
/// Settings are issued as `PRAGMA name = 'value'`; SQLite ignores pragmas it
/// does not know, so a Postgres planner configuration is harmless here.
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Open (or create) a database file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Wrap an existing connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Handle that cancels the running query from another thread.
    ///
    /// A query interrupted this way surfaces as [`FetchError::Canceled`].
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }
}

impl Session for SqliteSession {
    fn apply_settings(&mut self, settings: &SessionSettings) -> Result<()> {
        for statement in settings.statements("PRAGMA") {
            debug!(%statement, "applying session option");
            self.conn.execute_batch(&statement)?;
        }
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn with_cursor<R>(
        &mut self,
        sql: &str,
        f: impl FnOnce(&mut dyn RowCursor) -> R,
    ) -> Result<R> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut cursor = SqliteCursor {
            rows: stmt.query([])?,
        };
        Ok(f(&mut cursor))
    }
}

struct SqliteCursor<'stmt> {
    rows: Rows<'stmt>,
}

impl RowCursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> std::result::Result<bool, FetchError> {
        match self.rows.next() {
            Ok(row) => Ok(row.is_some()),
            Err(err) => Err(classify(&err)),
        }
    }
}

fn classify(err: &rusqlite::Error) -> FetchError {
    match err.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => FetchError::Canceled(err.to_string()),
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure) => {
            FetchError::ConnectionLost(err.to_string())
        }
        _ => FetchError::Other(err.to_string()),
    }
}
