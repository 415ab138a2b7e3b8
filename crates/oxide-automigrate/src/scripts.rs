//! Migration script files.
//!
//! A compiled migration is packaged into one or more scripts, each pairing an
//! apply group with a revert group, and written as
//! `<history_dir>/migrations/<table>/<YYYYmmddHHMMSS>_<table>.json`.
//!
//! Forward group `i` is paired with reverse group `k - 1 - i`, where `k` is the
//! larger group count. Reverting the scripts of a pass newest first therefore
//! runs the reverse groups in their compiled order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::{ActionGroup, CompiledMigration};
use crate::error::{MigrateError, Result};

/// One apply/revert pair for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationScript {
    /// File stem, e.g. `20240101120000_users`.
    pub name: String,
    /// Table name.
    pub table: String,
    /// Actions applied by this script.
    pub up: Option<ActionGroup>,
    /// Actions reverting this script.
    pub down: Option<ActionGroup>,
}

/// Splits a compiled migration into apply/revert pairs.
#[must_use]
pub fn package(compiled: &CompiledMigration) -> Vec<(Option<ActionGroup>, Option<ActionGroup>)> {
    let k = compiled.forward.len().max(compiled.reverse.len());
    (0..k)
        .map(|i| {
            (
                compiled.forward.get(i).cloned(),
                compiled.reverse.get(k - 1 - i).cloned(),
            )
        })
        .collect()
}

/// File-backed store of migration scripts.
#[derive(Debug, Clone)]
pub struct ScriptStore {
    root: PathBuf,
}

impl ScriptStore {
    /// Creates a store under `history_dir`.
    pub fn new(history_dir: impl AsRef<Path>) -> Self {
        Self {
            root: history_dir.as_ref().join("migrations"),
        }
    }

    /// Returns the file path of a script.
    #[must_use]
    pub fn path_of(&self, script: &MigrationScript) -> PathBuf {
        self.root
            .join(&script.table)
            .join(format!("{}.json", script.name))
    }

    /// Writes one script stamped with `at`.
    pub async fn write(
        &self,
        table: &str,
        up: Option<ActionGroup>,
        down: Option<ActionGroup>,
        at: DateTime<Utc>,
    ) -> Result<MigrationScript> {
        let script = MigrationScript {
            name: format!("{}_{}", at.format("%Y%m%d%H%M%S"), table),
            table: table.to_string(),
            up,
            down,
        };
        let path = self.path_of(&script);
        if tokio::fs::try_exists(&path).await? {
            return Err(MigrateError::MigrationExists(path));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_vec_pretty(&script)?).await?;
        info!(table = %table, name = %script.name, "Created migration script");
        Ok(script)
    }

    /// Writes every script of a compiled migration, pausing `interval`
    /// between two files so their timestamps stay distinct.
    ///
    /// Scripts already written are removed again if a later write fails.
    pub async fn write_all(
        &self,
        compiled: &CompiledMigration,
        interval: Duration,
    ) -> Result<Vec<MigrationScript>> {
        let mut written = Vec::new();
        for (i, (up, down)) in package(compiled).into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            match self.write(&compiled.table, up, down, Utc::now()).await {
                Ok(script) => written.push(script),
                Err(e) => {
                    self.remove(&written).await?;
                    return Err(e);
                }
            }
        }
        Ok(written)
    }

    /// Reads one script file.
    pub async fn load(&self, path: &Path) -> Result<MigrationScript> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lists the scripts of `table`, oldest first.
    pub async fn list(&self, table: &str) -> Result<Vec<MigrationScript>> {
        let mut entries = match tokio::fs::read_dir(self.root.join(table)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut scripts = Vec::with_capacity(paths.len());
        for path in paths {
            scripts.push(self.load(&path).await?);
        }
        Ok(scripts)
    }

    /// Deletes script files. Missing files are skipped.
    pub async fn remove(&self, scripts: &[MigrationScript]) -> Result<()> {
        for script in scripts {
            let path = self.path_of(script);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed migration script"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Migration script already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, Direction, Scope};
    use crate::column::ColumnSpec;
    use tempfile::TempDir;

    fn group(scope: Scope, direction: Direction, column: &str) -> ActionGroup {
        let action = match scope {
            Scope::TableBlock => Action::DropColumn {
                column: column.into(),
            },
            Scope::Standalone => Action::DropDefault {
                column: column.into(),
            },
        };
        ActionGroup {
            scope,
            direction,
            actions: vec![action],
        }
    }

    fn compiled(forward: Vec<ActionGroup>, reverse: Vec<ActionGroup>) -> CompiledMigration {
        CompiledMigration {
            table: "users".into(),
            forward,
            reverse,
        }
    }

    #[test]
    fn test_package_pairs_for_newest_first_revert() {
        let f0 = group(Scope::TableBlock, Direction::Forward, "a");
        let f1 = group(Scope::Standalone, Direction::Forward, "b");
        let f2 = group(Scope::TableBlock, Direction::Forward, "c");
        let r0 = group(Scope::TableBlock, Direction::Reverse, "x");
        let r1 = group(Scope::Standalone, Direction::Reverse, "y");

        let pairs = package(&compiled(
            vec![f0.clone(), f1.clone(), f2.clone()],
            vec![r0.clone(), r1.clone()],
        ));
        assert_eq!(
            pairs,
            vec![
                (Some(f0), None),
                (Some(f1), Some(r1)),
                (Some(f2), Some(r0)),
            ]
        );
    }

    #[test]
    fn test_package_single_group() {
        let f = group(Scope::TableBlock, Direction::Forward, "a");
        let r = group(Scope::TableBlock, Direction::Reverse, "a");
        assert_eq!(
            package(&compiled(vec![f.clone()], vec![r.clone()])),
            vec![(Some(f), Some(r))]
        );
        assert!(package(&compiled(vec![], vec![])).is_empty());
    }

    #[tokio::test]
    async fn test_write_list_remove() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::new(dir.path());
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let up = ActionGroup {
            scope: Scope::TableBlock,
            direction: Direction::Forward,
            actions: vec![Action::AddColumn(ColumnSpec::string("email", 50))],
        };
        let script = store.write("users", Some(up), None, at).await.unwrap();
        assert_eq!(script.name, "20231114221320_users");
        assert!(store.path_of(&script).exists());

        let again = store.write("users", None, None, at).await;
        assert!(matches!(again, Err(MigrateError::MigrationExists(_))));

        assert_eq!(store.list("users").await.unwrap(), vec![script.clone()]);

        store.remove(&[script.clone()]).await.unwrap();
        assert!(store.list("users").await.unwrap().is_empty());
        store.remove(&[script]).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_all_spaces_timestamps() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::new(dir.path());
        let migration = compiled(
            vec![
                group(Scope::TableBlock, Direction::Forward, "a"),
                group(Scope::Standalone, Direction::Forward, "b"),
            ],
            vec![group(Scope::TableBlock, Direction::Reverse, "a")],
        );

        let scripts = store
            .write_all(&migration, Duration::from_millis(1100))
            .await
            .unwrap();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].name < scripts[1].name);
        assert_eq!(store.list("users").await.unwrap(), scripts);
    }
}
