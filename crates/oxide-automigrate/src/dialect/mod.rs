//! Database dialect implementations.
//!
//! Each dialect knows how to render compiled [`Action`]s as SQL for one
//! database system.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::actions::Action;
use crate::column::{ColumnSpec, ColumnType, DefaultValue};

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for one action on `table`.
    ///
    /// Actions the database cannot express come back as a single `--` comment.
    fn generate_sql(&self, table: &str, action: &Action) -> Vec<String>;

    /// Returns the SQL type name for the given column type.
    fn type_name(&self, column_type: &ColumnType) -> String;

    /// Returns whether numeric columns can be declared `UNSIGNED`.
    fn supports_unsigned(&self) -> bool;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Returns the function counting characters of a string value.
    fn length_function(&self) -> &'static str {
        "LENGTH"
    }

    /// Generates column definition SQL, without key constraints.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.column_type),
        ];

        if column.is_deep_unsigned() && self.supports_unsigned() {
            parts.push("UNSIGNED".to_string());
        }

        if column.not_nullable || column.is_increments() {
            parts.push("NOT NULL".to_string());
        }

        if column.is_increments() {
            parts.push(self.auto_increment_keyword().to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_literal(default)));
        }

        parts.join(" ")
    }

    /// Renders a default value literal.
    fn default_literal(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Text(s) => self.quote_string(s),
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Boolean(true) => "TRUE".to_string(),
            DefaultValue::Boolean(false) => "FALSE".to_string(),
            DefaultValue::Now => "CURRENT_TIMESTAMP".to_string(),
        }
    }

    /// Name of the constraint or index backing a single-column key.
    fn constraint_name(&self, table: &str, column: &str, kind: &str) -> String {
        format!("{}_{}_{}", table, column, kind)
    }

    /// Quote a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
