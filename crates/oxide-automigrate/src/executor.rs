//! Migration executor.
//!
//! This module applies and reverts migration scripts against a database. Each
//! action group runs in its own transaction.

use sqlx::AnyPool;
use tracing::{debug, info, warn};

use crate::actions::{ActionGroup, Direction};
use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::scripts::MigrationScript;

/// Executes migration scripts against a database.
pub struct MigrationExecutor<D: MigrationDialect> {
    pool: AnyPool,
    dialect: D,
    dry_run: bool,
}

impl<D: MigrationDialect> MigrationExecutor<D> {
    /// Creates a new migration executor.
    pub fn new(pool: AnyPool, dialect: D) -> Self {
        Self {
            pool,
            dialect,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the connection pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Generates SQL for a group without executing it.
    #[must_use]
    pub fn sql_for(&self, table: &str, group: &ActionGroup) -> Vec<String> {
        group
            .actions
            .iter()
            .flat_map(|action| self.dialect.generate_sql(table, action))
            .collect()
    }

    /// Generates SQL for one side of a script.
    #[must_use]
    pub fn script_sql(&self, script: &MigrationScript, direction: Direction) -> Vec<String> {
        let group = match direction {
            Direction::Forward => script.up.as_ref(),
            Direction::Reverse => script.down.as_ref(),
        };
        group.map_or_else(Vec::new, |g| self.sql_for(&script.table, g))
    }

    async fn run(&self, script: &MigrationScript, direction: Direction) -> Result<()> {
        let statements = self.script_sql(script, direction);
        if statements.is_empty() {
            debug!(name = %script.name, ?direction, "Nothing to run");
            return Ok(());
        }

        if self.dry_run {
            for sql in &statements {
                println!("{};", sql);
            }
            return Ok(());
        }

        let failure = |source| MigrateError::ExecutionFailure {
            script: script.name.clone(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(failure)?;
        for sql in &statements {
            if sql.starts_with("--") {
                warn!(comment = %sql, "Skipping comment (unsupported operation)");
                continue;
            }
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *tx).await.map_err(failure)?;
        }
        tx.commit().await.map_err(failure)?;
        Ok(())
    }

    /// Applies a single script.
    pub async fn apply(&self, script: &MigrationScript) -> Result<()> {
        info!(table = %script.table, name = %script.name, "Applying migration");
        self.run(script, Direction::Forward).await?;
        info!(table = %script.table, name = %script.name, "Migration applied successfully");
        Ok(())
    }

    /// Reverts a single script.
    pub async fn revert(&self, script: &MigrationScript) -> Result<()> {
        info!(table = %script.table, name = %script.name, "Reverting migration");
        self.run(script, Direction::Reverse).await?;
        info!(table = %script.table, name = %script.name, "Migration reverted successfully");
        Ok(())
    }

    /// Applies scripts in order.
    pub async fn apply_all(&self, scripts: &[MigrationScript]) -> Result<()> {
        for script in scripts {
            self.apply(script).await?;
        }
        Ok(())
    }

    /// Reverts scripts newest first.
    pub async fn revert_all(&self, scripts: &[MigrationScript]) -> Result<()> {
        for script in scripts.iter().rev() {
            self.revert(script).await?;
        }
        Ok(())
    }
}
