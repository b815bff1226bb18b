//! Shuffled copies of base tables
//!
//! Join latency depends on the physical order of the inputs, so sweeps run
//! against several copies of each table, each in a different random order:
//! `part` becomes `part1`, `part2`, ... Copies are recreated from scratch on
//! every call.

use tracing::{error, info};

use crate::cursor::Session;
use crate::variant::{check_identifier, check_value};
use crate::Result;

/// Recreates `<table><suffix>` as a randomly ordered copy of `<table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shuffler {
    tables: Vec<String>,
    suffixes: Vec<String>,
}

impl Shuffler {
    /// Shuffle `tables` once per suffix.
    ///
    /// # Errors
    ///
    /// Returns error if a table name is not an identifier or a suffix is not
    /// a plain token.
    pub fn new<T, S>(tables: impl IntoIterator<Item = T>, suffixes: impl IntoIterator<Item = S>) -> Result<Self>
    where
        T: Into<String>,
        S: Into<String>,
    {
        let tables: Vec<String> = tables.into_iter().map(Into::into).collect();
        let suffixes: Vec<String> = suffixes.into_iter().map(Into::into).collect();
        for table in &tables {
            check_identifier(table)?;
        }
        for suffix in &suffixes {
            check_value("suffix", suffix)?;
        }
        Ok(Self { tables, suffixes })
    }

    /// Suffixes `1..=copies`.
    ///
    /// # Errors
    ///
    /// Returns error if a table name is not an identifier.
    pub fn numbered<T: Into<String>>(tables: impl IntoIterator<Item = T>, copies: u32) -> Result<Self> {
        Self::new(tables, (1..=copies).map(|i| i.to_string()))
    }

    /// Statements recreating every copy for one suffix.
    #[must_use]
    pub fn statements(&self, suffix: &str) -> String {
        self.tables
            .iter()
            .map(|t| {
                format!(
                    "DROP TABLE IF EXISTS {t}{suffix}; \
                     CREATE TABLE {t}{suffix} AS SELECT * FROM {t} ORDER BY RANDOM();"
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Recreate every copy, one transaction per suffix.
    ///
    /// Returns the number of tables created.
    ///
    /// # Errors
    ///
    /// Returns the first database error; the failing suffix is rolled back
    /// and earlier suffixes stay committed.
    pub fn run<S: Session>(&self, session: &mut S) -> Result<usize> {
        let mut created = 0;
        for suffix in &self.suffixes {
            info!(suffix = %suffix, tables = self.tables.len(), "recreating shuffle");
            let batch = format!("BEGIN;\n{}\nCOMMIT;", self.statements(suffix));
            if let Err(err) = session.execute_batch(&batch) {
                error!(suffix = %suffix, error = %err, "shuffle failed, rolling back");
                // Nothing to roll back if BEGIN itself failed.
                let _ = session.execute_batch("ROLLBACK;");
                return Err(err);
            }
            created += self.tables.len();
        }
        info!(created, "shuffled copies ready");
        Ok(created)
    }
}
