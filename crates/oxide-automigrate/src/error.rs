//! Error types for the migration system.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::prohibitions::Prohibition;

/// Errors that can occur while planning or applying a migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A column uses a base method outside the supported vocabulary.
    #[error("Unsupported column type '{method}' in '{input}'")]
    UnsupportedColumnType {
        /// The base builder method.
        method: String,
        /// The encoded column.
        input: String,
    },

    /// A column carries a modifier the codec does not know.
    #[error("Unknown column modifier '{modifier}' in '{input}'")]
    UnknownModifier {
        /// The modifier name.
        modifier: String,
        /// The encoded column.
        input: String,
    },

    /// An encoded column could not be parsed.
    #[error("Malformed column '{input}': {reason}")]
    MalformedColumn {
        /// The encoded column.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// A declared table has more than one primary key column.
    #[error("Table '{table}' declares more than one primary key: {}", .columns.join(", "))]
    MultiplePrimaryKeys {
        /// Table name.
        table: String,
        /// Every primary key column found.
        columns: Vec<String>,
    },

    /// A declared column is both a primary key and a foreign key.
    #[error("Column '{table}.{column}' cannot be both primary key and foreign key")]
    PrimaryAndForeignConflict {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The same column name was declared twice.
    #[error("Column '{table}.{column}' is declared more than once")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The live data makes the requested change unsafe.
    #[error(
        "Prohibited change on '{table}.{column}': {reason} ({row_count} row(s){})",
        .limit.as_ref().map(|l| format!(", limit {l}")).unwrap_or_default()
    )]
    ProhibitedChange {
        /// Why the change was rejected.
        reason: Prohibition,
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Number of offending rows or groups.
        row_count: i64,
        /// The bound that was violated, when there is one.
        limit: Option<String>,
    },

    /// A destructive change needs the operator to confirm with a code.
    #[error("Column deletion needs confirmation: rerun with critical code {code} before {expires_at}")]
    NeedsConfirmation {
        /// The freshly issued code.
        code: String,
        /// When the code stops being accepted.
        expires_at: DateTime<Utc>,
    },

    /// A migration script failed while running against the database.
    #[error("Migration script '{script}' failed: {source}")]
    ExecutionFailure {
        /// Script name.
        script: String,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// Database error outside script execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing history and script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration script file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// Invalid history or migrator state.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Builds a `MalformedColumn` error.
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedColumn {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
