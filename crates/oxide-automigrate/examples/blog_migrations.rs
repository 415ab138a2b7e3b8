//! Example: Blog Schema Evolution
//!
//! Registers the current structure of a small blog database, then migrates
//! it twice: once adding columns, once deleting one behind a confirmation
//! code. The changes run against an in-memory SQLite database while the
//! MySQL statements are printed for comparison.
//!
//! Run with: cargo run --example blog_migrations -p oxide-automigrate

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use oxide_automigrate::prelude::*;

fn users_v1() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::increments("id"),
        ColumnSpec::string("username", 100).unique().not_nullable(),
        ColumnSpec::boolean("legacy_flag"),
    ]
}

fn posts_v1() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::increments("id"),
        ColumnSpec::string("title", 200).not_nullable(),
    ]
}

fn users_v2() -> Vec<ColumnSpec> {
    let mut columns = users_v1();
    columns.push(ColumnSpec::string("email", 255).unique());
    columns
}

fn posts_v2() -> Vec<ColumnSpec> {
    let mut columns = posts_v1();
    columns.push(ColumnSpec::text("body"));
    columns.push(
        ColumnSpec::integer("author_id")
            .unsigned()
            .references(ForeignKey::new("users", "id").on_delete_cascade()),
    );
    columns
}

fn users_v3() -> Vec<ColumnSpec> {
    users_v2()
        .into_iter()
        .filter(|c| c.name != "legacy_flag")
        .collect()
}

async fn create_database() -> anyhow::Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, \
         username VARCHAR(100) NOT NULL UNIQUE, legacy_flag BOOLEAN)",
        "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, title VARCHAR(200) NOT NULL)",
        "INSERT INTO users (username, legacy_flag) VALUES ('alice', 0)",
    ] {
        sqlx::query(sql).execute(&pool).await?;
    }
    Ok(pool)
}

fn print_mysql(plan: &MigrationPlan) {
    let dialect = MySqlDialect::new();
    println!("-- {}", plan.summary());
    println!("-- up");
    for action in plan.compiled.forward_actions() {
        for sql in dialect.generate_sql(&plan.table, action) {
            println!("{};", sql);
        }
    }
    println!("-- down");
    for action in plan.compiled.reverse_actions() {
        for sql in dialect.generate_sql(&plan.table, action) {
            println!("{};", sql);
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = create_database().await?;
    let history = tempfile::tempdir()?;
    let config = MigrateConfig::new(history.path()).script_interval(Duration::ZERO);

    let migrator = Migrator::new(pool.clone(), SqliteDialect::new(), config.clone());
    migrator.record_snapshot("users", &users_v1()).await?;
    migrator.record_snapshot("posts", &posts_v1()).await?;

    println!("=== Adding columns ===\n");
    let tables = [
        DeclaredTable::new("users", users_v2()),
        DeclaredTable::new("posts", posts_v2()),
    ];
    let report = migrator.migrate(&tables).await?;
    for plan in &report.plans {
        print_mysql(plan);
    }
    println!("{} script(s) written", report.scripts.len());

    println!("\n=== Deleting a column ===\n");
    let tables = [DeclaredTable::new("users", users_v3())];
    let code = match migrator.migrate(&tables).await {
        Err(MigrateError::NeedsConfirmation { code, expires_at }) => {
            println!("Confirmation code {} (valid until {})", code, expires_at);
            code
        }
        other => anyhow::bail!(
            "expected a confirmation request, got {:?}",
            other.map(|r| r.summary_lines())
        ),
    };

    let confirmed = Migrator::new(pool, SqliteDialect::new(), config.critical_code(Some(code)));
    let report = confirmed.migrate(&tables).await?;
    for plan in &report.plans {
        print_mysql(plan);
    }

    println!("=== Snapshot history ===\n");
    for table in confirmed.history().tables().await? {
        let versions = confirmed.history().list_versions(&table).await?;
        println!("{}: {} version(s)", table, versions.len());
    }

    Ok(())
}
