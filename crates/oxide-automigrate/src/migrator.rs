//! Migration orchestration.
//!
//! The [`Migrator`] runs a pass over declared tables:
//!
//! 1. diff each declared table against its latest snapshot,
//! 2. reject unsafe changes with the [`ProhibitionChecker`],
//! 3. gate column deletions behind the [`ConfirmationGate`],
//! 4. compile forward/reverse actions,
//! 5. write, apply and record each table's scripts, one table at a time.
//!
//! Tables without history are skipped: their initial creation belongs to the
//! caller, which then registers the structure with [`Migrator::record_snapshot`].

use std::fmt;

use sqlx::AnyPool;
use tracing::{debug, info};

use crate::actions::{compile, CompiledMigration};
use crate::column::ColumnSpec;
use crate::config::MigrateConfig;
use crate::confirmation::ConfirmationGate;
use crate::dialect::MigrationDialect;
use crate::diff::{diff, Delta, Renamed};
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::failures::{FailureLog, FailureRecord};
use crate::history::{SnapshotHistory, SnapshotVersion};
use crate::prohibitions::ProhibitionChecker;
use crate::scripts::{MigrationScript, ScriptStore};
use crate::snapshot::TableSnapshot;

/// The desired columns of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredTable {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl DeclaredTable {
    /// Creates a declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A checked and compiled change of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    pub table: String,
    pub delta: Delta,
    pub compiled: CompiledMigration,
}

impl MigrationPlan {
    /// Returns the per-table change summary.
    #[must_use]
    pub fn summary(&self) -> TableSummary {
        TableSummary {
            table: self.table.clone(),
            added: self.delta.added.keys().cloned().collect(),
            updated: self.delta.updated.keys().cloned().collect(),
            deleted: self.delta.deleted.keys().cloned().collect(),
            renamed: self.delta.renamed.clone(),
        }
    }
}

/// Column names touched by a plan, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<Renamed>,
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.table)?;
        let mut parts = Vec::new();
        for (label, names) in [
            ("added", &self.added),
            ("updated", &self.updated),
            ("deleted", &self.deleted),
        ] {
            if !names.is_empty() {
                parts.push(format!("{} [{}]", label, names.join(", ")));
            }
        }
        if !self.renamed.is_empty() {
            let pairs: Vec<String> = self
                .renamed
                .iter()
                .map(|r| format!("{} -> {}", r.old_name, r.new_name))
                .collect();
            parts.push(format!("renamed [{}]", pairs.join(", ")));
        }
        if parts.is_empty() {
            f.write_str(" no changes")
        } else {
            write!(f, " {}", parts.join(", "))
        }
    }
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Plans that were applied, in declaration order.
    pub plans: Vec<MigrationPlan>,
    /// Scripts written and applied.
    pub scripts: Vec<MigrationScript>,
    /// Snapshots stored after success.
    pub snapshots: Vec<SnapshotVersion>,
}

impl MigrationReport {
    /// Returns whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// One summary line per migrated table.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.summary().to_string()).collect()
    }
}

/// Plans and runs migrations for declared tables.
pub struct Migrator<D: MigrationDialect> {
    config: MigrateConfig,
    executor: MigrationExecutor<D>,
    history: SnapshotHistory,
    scripts: ScriptStore,
    failures: FailureLog,
    gate: ConfirmationGate,
}

impl<D: MigrationDialect> Migrator<D> {
    /// Creates a migrator; every store lives under `config.history_dir`.
    pub fn new(pool: AnyPool, dialect: D, config: MigrateConfig) -> Self {
        let dir = &config.history_dir;
        Self {
            executor: MigrationExecutor::new(pool, dialect),
            history: SnapshotHistory::new(dir),
            scripts: ScriptStore::new(dir),
            failures: FailureLog::new(dir),
            gate: ConfirmationGate::new(dir, config.critical_confirmation),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    /// Returns the snapshot history.
    #[must_use]
    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    /// Returns the script store.
    #[must_use]
    pub fn scripts(&self) -> &ScriptStore {
        &self.scripts
    }

    /// Returns the failure log.
    #[must_use]
    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &MigrationExecutor<D> {
        &self.executor
    }

    /// Stores `declared` as the current structure of a freshly created table.
    pub async fn record_snapshot(
        &self,
        table: &str,
        declared: &[ColumnSpec],
    ) -> Result<SnapshotVersion> {
        let snapshot = TableSnapshot::from_specs(table, declared)?;
        snapshot.validate(table)?;
        self.history.put(table, &snapshot).await
    }

    /// Drops the newest snapshot of `table`.
    pub async fn remove_last_history(&self, table: &str) -> Result<Option<SnapshotVersion>> {
        self.history.remove_last(table).await
    }

    /// Drops the whole snapshot history of `table`.
    pub async fn remove_all_history(&self, table: &str) -> Result<usize> {
        self.history.remove_all(table).await
    }

    /// Diffs a declaration against the latest snapshot.
    async fn detect(
        &self,
        table: &str,
        declared: &[ColumnSpec],
    ) -> Result<Option<(TableSnapshot, Delta)>> {
        let declared_snapshot = TableSnapshot::from_specs(table, declared)?;
        declared_snapshot.validate(table)?;

        let Some(current) = self.history.get(table).await? else {
            debug!(table = %table, "No snapshot history, skipping");
            return Ok(None);
        };
        if current == declared_snapshot {
            return Ok(None);
        }

        let delta = diff(&current, &declared_snapshot)?;
        if delta.is_empty() {
            return Ok(None);
        }
        Ok(Some((declared_snapshot, delta)))
    }

    async fn check(&self, table: &str, delta: &Delta) -> Result<()> {
        ProhibitionChecker::new(self.executor.pool(), self.executor.dialect(), table)
            .check(delta)
            .await
    }

    /// Plans the migration of one table without writing or running anything
    /// except the confirmation code.
    ///
    /// A valid confirmation code is left in place for the following
    /// [`migrate`](Self::migrate).
    ///
    /// Returns `None` when the table has no history or no changes.
    pub async fn plan_migration(
        &self,
        table: &str,
        declared: &[ColumnSpec],
    ) -> Result<Option<MigrationPlan>> {
        let Some((_, delta)) = self.detect(table, declared).await? else {
            return Ok(None);
        };
        self.check(table, &delta).await?;
        self.gate
            .verify(delta.has_deletions(), self.config.critical_code.as_deref())
            .await?;

        Ok(Some(MigrationPlan {
            table: table.to_string(),
            compiled: compile(&delta, table),
            delta,
        }))
    }

    /// Runs a full pass over `tables`.
    ///
    /// Checks and the confirmation gate cover every table before anything
    /// is written. Tables are then migrated one by one. A failing table stops
    /// the pass and keeps its previous snapshot, while tables already migrated
    /// keep their new one. Groups of the failing table that committed before
    /// the failure stay applied.
    pub async fn migrate(&self, tables: &[DeclaredTable]) -> Result<MigrationReport> {
        let mut pending = Vec::new();
        for table in tables {
            if let Some((snapshot, delta)) = self.detect(&table.name, &table.columns).await? {
                pending.push((table.name.as_str(), snapshot, delta));
            }
        }

        let mut report = MigrationReport::default();
        if pending.is_empty() {
            info!("No changes detected");
            return Ok(report);
        }

        for (table, _, delta) in &pending {
            self.check(table, delta).await?;
        }

        let has_deletions = pending.iter().any(|(_, _, delta)| delta.has_deletions());
        self.gate
            .authorize(has_deletions, self.config.critical_code.as_deref())
            .await?;

        for (table, snapshot, delta) in pending {
            let plan = MigrationPlan {
                table: table.to_string(),
                compiled: compile(&delta, table),
                delta,
            };
            if self.config.log_enabled {
                info!("{}", plan.summary());
            }

            let scripts = self.run_table(&plan).await?;
            report
                .snapshots
                .push(self.history.put(table, &snapshot).await?);
            report.scripts.extend(scripts);
            report.plans.push(plan);
        }

        info!(
            tables = report.plans.len(),
            scripts = report.scripts.len(),
            "Migration complete"
        );
        Ok(report)
    }

    /// Writes and applies the scripts of one table.
    async fn run_table(&self, plan: &MigrationPlan) -> Result<Vec<MigrationScript>> {
        let scripts = self
            .scripts
            .write_all(&plan.compiled, self.config.script_interval)
            .await?;

        for script in &scripts {
            if let Err(e) = self.executor.apply(script).await {
                self.handle_failure(&plan.table, script, &scripts, &e).await?;
                return Err(e);
            }
        }
        Ok(scripts)
    }

    async fn handle_failure(
        &self,
        table: &str,
        failed: &MigrationScript,
        written: &[MigrationScript],
        error: &MigrateError,
    ) -> Result<()> {
        self.failures
            .record(&FailureRecord {
                table: table.to_string(),
                script: failed.name.clone(),
                error: error.to_string(),
                occurred_at: chrono::Utc::now(),
            })
            .await?;

        if self.config.remove_scripts_on_error {
            self.scripts.remove(written).await?;
            info!(
                table = %table,
                count = written.len(),
                "Removed migration scripts of failed pass"
            );
        }
        Ok(())
    }
}
