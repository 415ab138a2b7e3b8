//! oxide-automigrate CLI
//!
//! Command-line tool for snapshot-diffing table migrations.
//!
//! A schema file is a JSON object mapping column names to their builder
//! encoding, the same format as a stored snapshot:
//!
//! ```json
//! { "id": "t.increments('id')", "email": "t.string('email', 50).unique()" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::any::AnyPoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_automigrate::prelude::*;

/// Snapshot-diffing table migrations.
#[derive(Parser)]
#[command(name = "oxide-automigrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`mysql://...` or `sqlite:...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Directory holding snapshots, scripts and failure records.
    #[arg(long, env = "OXIDE_HISTORY_DIR", default_value = "migration-history")]
    history_dir: PathBuf,

    /// Confirmation code for a pass that deletes columns.
    #[arg(long, env = "OXIDE_CRITICAL_CODE")]
    critical_code: Option<String>,

    /// Run deletions without asking for a confirmation code.
    #[arg(long)]
    no_confirmation: bool,

    /// Keep written scripts when a pass fails.
    #[arg(long)]
    keep_scripts_on_error: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the structure of a freshly created table.
    Init {
        /// Table name.
        #[arg(short, long)]
        table: String,

        /// Schema file of the table.
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Show the SQL a declaration would produce, without running it.
    ///
    /// A valid `--critical-code` is kept for the following `migrate`.
    Plan {
        /// Table name.
        #[arg(short, long)]
        table: String,

        /// Schema file of the table.
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Migrate every table declared in a directory (`<table>.json`).
    Migrate {
        /// Directory of schema files.
        #[arg(short, long)]
        schema_dir: PathBuf,
    },

    /// List stored snapshots.
    History {
        /// Table name (all tables if not specified).
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Remove stored snapshots of a table.
    Forget {
        /// Table name.
        #[arg(short, long)]
        table: String,

        /// Remove every snapshot instead of the newest one.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database)
        .await
        .with_context(|| format!("cannot connect to {}", cli.database))?;

    let config = MigrateConfig::new(&cli.history_dir)
        .critical_code(cli.critical_code.clone())
        .critical_confirmation(!cli.no_confirmation)
        .remove_scripts_on_error(!cli.keep_scripts_on_error);

    if cli.database.starts_with("sqlite") {
        run(cli.command, Migrator::new(pool, SqliteDialect::new(), config)).await
    } else {
        run(cli.command, Migrator::new(pool, MySqlDialect::new(), config)).await
    }
}

async fn run<D: MigrationDialect>(command: Commands, migrator: Migrator<D>) -> anyhow::Result<()> {
    match command {
        Commands::Init { table, schema } => {
            let columns = read_schema(&schema).await?;
            let version = migrator.record_snapshot(&table, &columns).await?;
            info!(table = %table, path = %version.path.display(), "Snapshot recorded");
        }

        Commands::Plan { table, schema } => {
            let columns = read_schema(&schema).await?;
            match migrator.plan_migration(&table, &columns).await? {
                None => info!(table = %table, "No changes detected"),
                Some(plan) => print_plan(&migrator, &plan),
            }
        }

        Commands::Migrate { schema_dir } => {
            let tables = read_schema_dir(&schema_dir).await?;
            info!(count = tables.len(), dir = %schema_dir.display(), "Loaded declarations");
            let report = migrator.migrate(&tables).await?;
            if report.is_empty() {
                println!("Nothing to migrate.");
            }
            for script in &report.scripts {
                println!("  [X] {}", script.name);
            }
        }

        Commands::History { table } => {
            let tables = match table {
                Some(table) => vec![table],
                None => migrator.history().tables().await?,
            };
            for table in tables {
                println!("{}", table);
                let versions = migrator.history().list_versions(&table).await?;
                if versions.is_empty() {
                    println!("  (no snapshots)");
                }
                for version in versions {
                    println!("  {}  {}", version.created_at, version.path.display());
                }
            }
        }

        Commands::Forget { table, all } => {
            if all {
                let removed = migrator.remove_all_history(&table).await?;
                info!(table = %table, removed, "Snapshot history removed");
            } else {
                match migrator.remove_last_history(&table).await? {
                    Some(version) => {
                        info!(table = %table, path = %version.path.display(), "Snapshot removed");
                    }
                    None => info!(table = %table, "No snapshot to remove"),
                }
            }
        }
    }

    Ok(())
}

fn print_plan<D: MigrationDialect>(migrator: &Migrator<D>, plan: &MigrationPlan) {
    println!("-- {}", plan.summary());
    for (label, groups) in [("up", &plan.compiled.forward), ("down", &plan.compiled.reverse)] {
        println!("-- {}", label);
        for group in groups {
            for sql in migrator.executor().sql_for(&plan.table, group) {
                println!("{};", sql);
            }
        }
    }
}

async fn read_schema(path: &Path) -> anyhow::Result<Vec<ColumnSpec>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let snapshot: TableSnapshot = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid schema file {}", path.display()))?;
    Ok(snapshot.specs()?)
}

async fn read_schema_dir(dir: &Path) -> anyhow::Result<Vec<DeclaredTable>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        tables.push(DeclaredTable::new(name, read_schema(&path).await?));
    }
    Ok(tables)
}
