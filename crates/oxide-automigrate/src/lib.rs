//! Snapshot-diffing table migrations.
//!
//! `oxide-automigrate` keeps a JSON snapshot of every table's declared columns
//! and turns the difference between two snapshots into a reversible
//! migration:
//!
//! - Unsafe changes are refused before anything is touched (values that would
//!   no longer fit, `NOT NULL` over existing nulls, duplicate keys, ...)
//! - Column deletions need a short-lived confirmation code
//! - Forward and reverse actions are compiled together, so every migration
//!   script carries its own rollback
//!
//! # Architecture
//!
//! - **Column** - [`ColumnSpec`](column::ColumnSpec) and its builder-chain codec
//! - **Snapshot / Diff** - Per-table column maps and the delta between them
//! - **Changes** - Attribute-level classification of an updated column
//! - **Actions** - Ordered, grouped forward/reverse actions
//! - **Prohibitions** - Data checks against the live table
//! - **Confirmation** - The critical-change gate
//! - **History / Scripts / Failures** - Files under the history directory
//! - **Executor / Dialect** - SQL generation and execution
//! - **Migrator** - Runs the whole pass
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_automigrate::prelude::*;
//!
//! let config = MigrateConfig::new("migration-history");
//! let migrator = Migrator::new(pool, MySqlDialect::new(), config);
//!
//! let users = DeclaredTable::new(
//!     "users",
//!     vec![
//!         ColumnSpec::increments("id"),
//!         ColumnSpec::string("email", 50).unique().not_nullable(),
//!         ColumnSpec::integer("team_id")
//!             .unsigned()
//!             .references(ForeignKey::new("teams", "id").on_delete_cascade()),
//!     ],
//! );
//!
//! let report = migrator.migrate(&[users]).await?;
//! for plan in &report.plans {
//!     println!("{}", plan.summary());
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the SQL a declaration would produce
//! oxide-automigrate plan --table users --schema users.json
//!
//! # Migrate every table declared in a directory
//! oxide-automigrate migrate --schema-dir schema/
//!
//! # Confirm a pass that deletes columns
//! oxide-automigrate --critical-code 123456 migrate --schema-dir schema/
//!
//! # List stored snapshots
//! oxide-automigrate history --table users
//! ```

pub mod actions;
pub mod changes;
pub mod column;
pub mod config;
pub mod confirmation;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod failures;
pub mod history;
pub mod migrator;
pub mod prohibitions;
pub mod scripts;
pub mod snapshot;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::actions::{compile, Action, ActionGroup, CompiledMigration, Direction, Scope};
    pub use crate::changes::{classify, ChangeFlags};
    pub use crate::column::{
        decode, encode, ColumnSpec, ColumnType, DefaultValue, ForeignKey, Modifier, NumericKind,
        TextSize,
    };
    pub use crate::config::MigrateConfig;
    pub use crate::confirmation::{ConfirmationGate, GateState};
    pub use crate::dialect::{MigrationDialect, MySqlDialect, SqliteDialect};
    pub use crate::diff::{diff, Delta};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::MigrationExecutor;
    pub use crate::history::SnapshotHistory;
    pub use crate::migrator::{DeclaredTable, MigrationPlan, MigrationReport, Migrator};
    pub use crate::prohibitions::{Prohibition, ProhibitionChecker};
    pub use crate::scripts::{MigrationScript, ScriptStore};
    pub use crate::snapshot::TableSnapshot;
}
