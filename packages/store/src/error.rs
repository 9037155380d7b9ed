//! Error types for table access and user-scoped replaces.

use thiserror::Error;

/// A failed round trip to the table store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("failed to read table `{table}`: {reason}")]
    Read { table: String, reason: String },
    #[error("failed to write table `{table}`: {reason}")]
    Write { table: String, reason: String },
}

impl StoreError {
    pub fn read(table: &str, reason: impl ToString) -> Self {
        StoreError::Read {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write(table: &str, reason: impl ToString) -> Self {
        StoreError::Write {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The stage at which a single table's replace stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("reading current rows: {0}")]
    Read(StoreError),
    #[error("clearing the user's rows: {0}")]
    Clear(StoreError),
    #[error("appending replacement rows: {0}")]
    Append(StoreError),
}
