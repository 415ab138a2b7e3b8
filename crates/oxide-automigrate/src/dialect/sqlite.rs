//! SQLite dialect for migrations.
//!
//! SQLite can add, drop and rename columns and manage unique indexes, but it
//! cannot alter a column definition or add key constraints to an existing
//! table. Those actions are rendered as comments and skipped by the executor.

use crate::actions::Action;
use crate::column::{ColumnType, NumericKind};

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unsupported(&self, action: &Action) -> String {
        format!("-- sqlite cannot run: {}", action)
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn generate_sql(&self, table: &str, action: &Action) -> Vec<String> {
        let table_name = self.quote_identifier(table);
        let sql = match action {
            Action::AddColumn(column) if !column.primary => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table_name,
                self.column_definition(column)
            ),
            Action::DropColumn { column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table_name,
                self.quote_identifier(column)
            ),
            Action::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table_name,
                self.quote_identifier(from),
                self.quote_identifier(to)
            ),
            Action::SetUnique { column } => format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.quote_identifier(&self.constraint_name(table, column, "unique")),
                table_name,
                self.quote_identifier(column)
            ),
            Action::DropUnique { column } => format!(
                "DROP INDEX {}",
                self.quote_identifier(&self.constraint_name(table, column, "unique"))
            ),
            other => self.unsupported(other),
        };
        vec![sql]
    }

    fn type_name(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Specific { kind, .. } => match kind {
                NumericKind::Double => "REAL",
                _ => "INTEGER",
            },
            ColumnType::Float { .. } => "REAL",
            ColumnType::String { .. }
            | ColumnType::Text(_)
            | ColumnType::Enum(_)
            | ColumnType::Timestamp
            | ColumnType::DateTime => "TEXT",
        }
        .to_string()
    }

    fn supports_unsigned(&self) -> bool {
        false
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnSpec, DefaultValue};

    #[test]
    fn test_supported_actions() {
        let dialect = SqliteDialect::new();
        assert_eq!(
            dialect.generate_sql(
                "users",
                &Action::AddColumn(
                    ColumnSpec::integer("age")
                        .unsigned()
                        .not_nullable()
                        .default_to(DefaultValue::Integer(0))
                )
            ),
            vec![r#"ALTER TABLE "users" ADD COLUMN "age" INTEGER NOT NULL DEFAULT 0"#]
        );
        assert_eq!(
            dialect.generate_sql(
                "users",
                &Action::SetUnique {
                    column: "email".into()
                }
            ),
            vec![r#"CREATE UNIQUE INDEX "users_email_unique" ON "users" ("email")"#]
        );
        assert_eq!(
            dialect.generate_sql(
                "users",
                &Action::RenameColumn {
                    from: "email".into(),
                    to: "contact_email".into()
                }
            ),
            vec![r#"ALTER TABLE "users" RENAME COLUMN "email" TO "contact_email""#]
        );
    }

    #[test]
    fn test_unsupported_actions_become_comments() {
        let dialect = SqliteDialect::new();
        let sql = dialect.generate_sql(
            "users",
            &Action::AlterColumn(ColumnSpec::string("name", 20)),
        );
        assert_eq!(
            sql,
            vec!["-- sqlite cannot run: t.string('name', 20).alter()".to_string()]
        );
        assert!(dialect
            .generate_sql("users", &Action::AddColumn(ColumnSpec::increments("id")))[0]
            .starts_with("--"));
    }
}
