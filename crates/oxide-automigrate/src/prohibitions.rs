//! Data-safety checks.
//!
//! Before any script is written, the live table is queried with read-only
//! aggregate counts to reject changes that would fail or silently damage the
//! stored rows.

use std::fmt;

use sqlx::AnyPool;
use tracing::debug;

use crate::changes::classify;
use crate::column::{ColumnSpec, DefaultValue, NumberBound, TypeCategory};
use crate::dialect::MigrationDialect;
use crate::diff::Delta;
use crate::error::{MigrateError, Result};

/// Why a change was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Prohibition {
    /// A new primary key column holds nulls.
    PrimaryKeyNulls,
    /// A new primary key column holds duplicate values.
    PrimaryKeyDuplicates,
    /// The column moves to another type family while the table has rows.
    TypeCategoryChange {
        from: TypeCategory,
        to: TypeCategory,
    },
    /// Stored strings exceed the new length.
    StringTooLong,
    /// Stored numbers exceed the new maximum.
    NumberAboveMax,
    /// Stored numbers fall below the new minimum.
    NumberBelowMin,
    /// The column becomes NOT NULL without a default and holds nulls.
    NotNullWithNulls,
    /// The column becomes UNIQUE and holds duplicate values.
    UniqueWithDuplicates,
    /// A NOT NULL column without a default is added to a table with rows.
    NotNullOnNonEmptyTable,
    /// The default of a foreign key column does not exist in the target table.
    ForeignDefaultMissing {
        table: String,
        column: String,
    },
}

impl fmt::Display for Prohibition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKeyNulls => f.write_str("primary key column contains null values"),
            Self::PrimaryKeyDuplicates => {
                f.write_str("primary key column contains duplicate values")
            }
            Self::TypeCategoryChange { from, to } => write!(
                f,
                "type cannot change from {:?} to {:?} on a non-empty table",
                from, to
            ),
            Self::StringTooLong => f.write_str("values are longer than the new maximum length"),
            Self::NumberAboveMax => f.write_str("values are greater than the new maximum"),
            Self::NumberBelowMin => f.write_str("values are less than the new minimum"),
            Self::NotNullWithNulls => {
                f.write_str("column becomes NOT NULL without a default but contains nulls")
            }
            Self::UniqueWithDuplicates => {
                f.write_str("column becomes UNIQUE but contains duplicate values")
            }
            Self::NotNullOnNonEmptyTable => {
                f.write_str("NOT NULL column without a default added to a non-empty table")
            }
            Self::ForeignDefaultMissing { table, column } => write!(
                f,
                "default value does not exist in referenced column {}.{}",
                table, column
            ),
        }
    }
}

/// Runs the safety queries for one table.
pub struct ProhibitionChecker<'a, D: MigrationDialect> {
    pool: &'a AnyPool,
    dialect: &'a D,
    table: &'a str,
}

impl<'a, D: MigrationDialect> ProhibitionChecker<'a, D> {
    /// Creates a checker for `table`.
    pub fn new(pool: &'a AnyPool, dialect: &'a D, table: &'a str) -> Self {
        Self {
            pool,
            dialect,
            table,
        }
    }

    /// Checks every updated and added column of the delta.
    ///
    /// Deleted and renamed columns carry no data risk beyond what the
    /// confirmation gate covers.
    pub async fn check(&self, delta: &Delta) -> Result<()> {
        if delta.updated.is_empty() && delta.added.is_empty() {
            return Ok(());
        }

        let rows = self.count(&format!("SELECT COUNT(*) FROM {}", self.table_name())).await?;
        debug!(table = %self.table, rows, "Checking prohibitions");

        for update in delta.updated.values() {
            self.check_updated(&update.old, &update.new, rows).await?;
        }
        for column in delta.added.values() {
            self.check_added(column, rows).await?;
        }
        Ok(())
    }

    async fn check_updated(&self, old: &ColumnSpec, new: &ColumnSpec, rows: i64) -> Result<()> {
        let flags = classify(old, new);
        let column = &new.name;

        if old.primary_state().is_none() && new.primary_state().is_some() {
            self.reject_if(
                self.count_nulls(column).await?,
                Prohibition::PrimaryKeyNulls,
                column,
                None,
            )?;
            self.reject_if(
                self.count_duplicate_groups(column).await?,
                Prohibition::PrimaryKeyDuplicates,
                column,
                None,
            )?;
        }

        if rows > 0 {
            let (from, to) = (old.type_category(), new.type_category());
            if from != to {
                let reason = Prohibition::TypeCategoryChange { from, to };
                return Err(self.rejection(reason, column, rows, None));
            }

            if flags.string_bound_changed {
                if let Some(max) = new.string_max() {
                    let sql = format!(
                        "SELECT COUNT(*) FROM {} WHERE {}({}) > {}",
                        self.table_name(),
                        self.dialect.length_function(),
                        self.dialect.quote_identifier(column),
                        max
                    );
                    self.reject_if(
                        self.count(&sql).await?,
                        Prohibition::StringTooLong,
                        column,
                        Some(max.to_string()),
                    )?;
                }
            }

            if flags.number_bound_changed {
                if let Some(range) = new.number_range() {
                    self.check_bound(column, ">", range.max, Prohibition::NumberAboveMax)
                        .await?;
                    self.check_bound(column, "<", range.min, Prohibition::NumberBelowMin)
                        .await?;
                }
            }
        }

        if flags.nullable_changed && new.not_nullable && new.default.is_none() {
            self.reject_if(
                self.count_nulls(column).await?,
                Prohibition::NotNullWithNulls,
                column,
                None,
            )?;
        }

        if flags.unique_changed && new.unique && rows > 1 {
            self.reject_if(
                self.count_duplicate_groups(column).await?,
                Prohibition::UniqueWithDuplicates,
                column,
                None,
            )?;
        }

        self.check_foreign_default(new).await
    }

    async fn check_added(&self, column: &ColumnSpec, rows: i64) -> Result<()> {
        if column.not_nullable && column.default.is_none() && !column.is_increments() && rows > 0 {
            return Err(self.rejection(
                Prohibition::NotNullOnNonEmptyTable,
                &column.name,
                rows,
                None,
            ));
        }
        self.check_foreign_default(column).await
    }

    async fn check_bound(
        &self,
        column: &str,
        operator: &str,
        bound: NumberBound,
        reason: Prohibition,
    ) -> Result<()> {
        // Nothing lies beyond the double range.
        if let NumberBound::Decimal(value) = bound {
            if value.abs() == f64::MAX {
                return Ok(());
            }
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} {} {}",
            self.table_name(),
            self.dialect.quote_identifier(column),
            operator,
            bound
        );
        self.reject_if(self.count(&sql).await?, reason, column, Some(bound.to_string()))
    }

    async fn check_foreign_default(&self, column: &ColumnSpec) -> Result<()> {
        let (Some(foreign_key), Some(default)) = (&column.foreign_key, &column.default) else {
            return Ok(());
        };

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            self.dialect.quote_identifier(&foreign_key.table),
            self.dialect.quote_identifier(&foreign_key.column)
        );
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = match default {
            DefaultValue::Text(value) => query.bind(value.clone()),
            DefaultValue::Integer(value) => query.bind(*value),
            DefaultValue::Float(value) => query.bind(*value),
            DefaultValue::Boolean(value) => query.bind(*value),
            DefaultValue::Now => return Ok(()),
        };
        debug!(sql = %sql, "Running prohibition query");
        let found = query.fetch_one(self.pool).await?;

        if found == 0 {
            return Err(self.rejection(
                Prohibition::ForeignDefaultMissing {
                    table: foreign_key.table.clone(),
                    column: foreign_key.column.clone(),
                },
                &column.name,
                0,
                Some(default.to_string()),
            ));
        }
        Ok(())
    }

    async fn count_nulls(&self, column: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            self.table_name(),
            self.dialect.quote_identifier(column)
        );
        self.count(&sql).await
    }

    async fn count_duplicate_groups(&self, column: &str) -> Result<i64> {
        let quoted = self.dialect.quote_identifier(column);
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT {} FROM {} WHERE {} IS NOT NULL GROUP BY {} \
             HAVING COUNT(*) > 1) AS duplicates",
            quoted,
            self.table_name(),
            quoted,
            quoted
        );
        self.count(&sql).await
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        debug!(sql = %sql, "Running prohibition query");
        Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(self.pool).await?)
    }

    fn table_name(&self) -> String {
        self.dialect.quote_identifier(self.table)
    }

    fn reject_if(
        &self,
        row_count: i64,
        reason: Prohibition,
        column: &str,
        limit: Option<String>,
    ) -> Result<()> {
        if row_count > 0 {
            Err(self.rejection(reason, column, row_count, limit))
        } else {
            Ok(())
        }
    }

    fn rejection(
        &self,
        reason: Prohibition,
        column: &str,
        row_count: i64,
        limit: Option<String>,
    ) -> MigrateError {
        MigrateError::ProhibitedChange {
            reason,
            table: self.table.to_string(),
            column: column.to_string(),
            row_count,
            limit,
        }
    }
}
