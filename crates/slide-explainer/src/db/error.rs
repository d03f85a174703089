//! Errors raised by the job database layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from opening, migrating or querying the job database.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Any rusqlite failure outside a schema step.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory or removing an old file failed.
    #[error("Cannot prepare database file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema step failed; the recorded version stays at the previous one.
    #[error("Schema step {version} ({name}) failed: {source}")]
    Migration {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A stored status, level, language or timestamp no longer parses.
    #[error("Unreadable {column} value in jobs table: '{value}'")]
    CorruptValue { column: &'static str, value: String },

    /// Another thread panicked while holding the connection.
    #[error("Job database lock poisoned by a panicking thread")]
    LockPoisoned,
}
