//! MySQL dialect for migrations.
//!
//! Every action maps to one `ALTER TABLE` statement. Key constraints follow the
//! `<table>_<column>_unique` / `<table>_<column>_foreign` naming so that they
//! can be dropped again by name.

use crate::actions::Action;
use crate::column::{ColumnSpec, ColumnType, ForeignKey, TextSize};

use super::MigrationDialect;

/// MySQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn alter(&self, table: &str, clause: &str) -> String {
        format!("ALTER TABLE {} {}", self.quote_identifier(table), clause)
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSpec) -> String {
        let mut clause = format!("ADD COLUMN {}", self.column_definition(column));
        if column.primary {
            clause.push_str(" PRIMARY KEY");
        }
        self.alter(table, &clause)
    }

    fn set_foreign_sql(&self, table: &str, column: &str, foreign_key: &ForeignKey) -> String {
        let mut clause = format!(
            "ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&self.constraint_name(table, column, "foreign")),
            self.quote_identifier(column),
            self.quote_identifier(&foreign_key.table),
            self.quote_identifier(&foreign_key.column)
        );
        if foreign_key.on_delete_cascade {
            clause.push_str(" ON DELETE CASCADE");
        }
        if foreign_key.on_update_cascade {
            clause.push_str(" ON UPDATE CASCADE");
        }
        self.alter(table, &clause)
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn generate_sql(&self, table: &str, action: &Action) -> Vec<String> {
        let sql = match action {
            Action::AddColumn(column) => self.add_column_sql(table, column),
            Action::AlterColumn(column) => self.alter(
                table,
                &format!("MODIFY {}", self.column_definition(column)),
            ),
            Action::DropColumn { column } => self.alter(
                table,
                &format!("DROP COLUMN {}", self.quote_identifier(column)),
            ),
            Action::RenameColumn { from, to } => self.alter(
                table,
                &format!(
                    "RENAME COLUMN {} TO {}",
                    self.quote_identifier(from),
                    self.quote_identifier(to)
                ),
            ),
            Action::SetPrimary { column } => self.alter(
                table,
                &format!("ADD PRIMARY KEY ({})", self.quote_identifier(column)),
            ),
            Action::DropPrimary { .. } => self.alter(table, "DROP PRIMARY KEY"),
            Action::SetForeign {
                column,
                foreign_key,
            } => self.set_foreign_sql(table, column, foreign_key),
            Action::DropForeign { column } => self.alter(
                table,
                &format!(
                    "DROP FOREIGN KEY {}",
                    self.quote_identifier(&self.constraint_name(table, column, "foreign"))
                ),
            ),
            Action::SetUnique { column } => self.alter(
                table,
                &format!(
                    "ADD CONSTRAINT {} UNIQUE ({})",
                    self.quote_identifier(&self.constraint_name(table, column, "unique")),
                    self.quote_identifier(column)
                ),
            ),
            Action::DropUnique { column } => self.alter(
                table,
                &format!(
                    "DROP INDEX {}",
                    self.quote_identifier(&self.constraint_name(table, column, "unique"))
                ),
            ),
            Action::SetAutoIncrement { column } => {
                let quoted = self.quote_identifier(column);
                self.alter(
                    table,
                    &format!(
                        "CHANGE {} {} INT(11) UNSIGNED NOT NULL AUTO_INCREMENT",
                        quoted, quoted
                    ),
                )
            }
            Action::PositionFirst(column) => self.alter(
                table,
                &format!("MODIFY {} FIRST", self.column_definition(column)),
            ),
            Action::DropDefault { column } => self.alter(
                table,
                &format!("ALTER COLUMN {} DROP DEFAULT", self.quote_identifier(column)),
            ),
        };
        vec![sql]
    }

    fn type_name(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer => "INT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Float { precision, scale } => format!("FLOAT({}, {})", precision, scale),
            ColumnType::Specific { kind, .. } => kind.keyword().to_uppercase(),
            ColumnType::Enum(values) => {
                let quoted: Vec<String> = values.iter().map(|v| self.quote_string(v)).collect();
                format!("ENUM({})", quoted.join(", "))
            }
            ColumnType::String { length } => format!("VARCHAR({})", length.unwrap_or(255)),
            ColumnType::Text(None) => "TEXT".to_string(),
            ColumnType::Text(Some(TextSize::Medium)) => "MEDIUMTEXT".to_string(),
            ColumnType::Text(Some(TextSize::Long)) => "LONGTEXT".to_string(),
        }
    }

    fn supports_unsigned(&self) -> bool {
        true
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn length_function(&self) -> &'static str {
        "CHAR_LENGTH"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}
