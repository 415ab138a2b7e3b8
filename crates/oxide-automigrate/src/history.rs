//! Snapshot history.
//!
//! Every successful pass stores the declared snapshot of each table as
//! `<history_dir>/schema/<table>/<table>_-_<unix_millis>.json`. The newest file
//! is the table's current structure.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::snapshot::TableSnapshot;

const SEPARATOR: &str = "_-_";

/// One stored snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVersion {
    /// Table name.
    pub table: String,
    /// Creation time, millisecond precision.
    pub created_at: DateTime<Utc>,
    /// File path.
    pub path: PathBuf,
}

/// File-backed store of table snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    root: PathBuf,
}

impl SnapshotHistory {
    /// Creates a store under `history_dir`.
    pub fn new(history_dir: impl AsRef<Path>) -> Self {
        Self {
            root: history_dir.as_ref().join("schema"),
        }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    fn parse_version(table: &str, path: PathBuf) -> Option<SnapshotVersion> {
        let stem = path.file_stem()?.to_str()?;
        let millis = stem
            .strip_prefix(table)?
            .strip_prefix(SEPARATOR)?
            .parse::<i64>()
            .ok()?;
        Some(SnapshotVersion {
            table: table.to_string(),
            created_at: DateTime::from_timestamp_millis(millis)?,
            path,
        })
    }

    /// Lists the stored snapshots of `table`, newest first.
    pub async fn list_versions(&self, table: &str) -> Result<Vec<SnapshotVersion>> {
        let mut entries = match tokio::fs::read_dir(self.table_dir(table)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(version) = Self::parse_version(table, entry.path()) {
                versions.push(version);
            }
        }
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    /// Returns the newest snapshot of `table`.
    pub async fn get(&self, table: &str) -> Result<Option<TableSnapshot>> {
        let Some(latest) = self.list_versions(table).await?.into_iter().next() else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&latest.path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Stores a new snapshot of `table`.
    ///
    /// The timestamp is bumped past the newest stored version so ordering
    /// holds even within one millisecond.
    pub async fn put(&self, table: &str, snapshot: &TableSnapshot) -> Result<SnapshotVersion> {
        let dir = self.table_dir(table);
        tokio::fs::create_dir_all(&dir).await?;

        let mut millis = Utc::now().timestamp_millis();
        if let Some(latest) = self.list_versions(table).await?.first() {
            millis = millis.max(latest.created_at.timestamp_millis() + 1);
        }

        let path = dir.join(format!("{}{}{}.json", table, SEPARATOR, millis));
        tokio::fs::write(&path, serde_json::to_vec_pretty(snapshot)?).await?;
        debug!(table = %table, path = %path.display(), "Stored snapshot");

        let created_at = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| MigrateError::InvalidState(format!("bad timestamp {}", millis)))?;
        Ok(SnapshotVersion {
            table: table.to_string(),
            created_at,
            path,
        })
    }

    /// Removes the newest snapshot of `table`, returning it.
    pub async fn remove_last(&self, table: &str) -> Result<Option<SnapshotVersion>> {
        let Some(latest) = self.list_versions(table).await?.into_iter().next() else {
            return Ok(None);
        };
        tokio::fs::remove_file(&latest.path).await?;
        info!(table = %table, path = %latest.path.display(), "Removed last snapshot");
        Ok(Some(latest))
    }

    /// Removes every snapshot of `table`, returning how many were removed.
    pub async fn remove_all(&self, table: &str) -> Result<usize> {
        let versions = self.list_versions(table).await?;
        if versions.is_empty() {
            return Ok(0);
        }
        tokio::fs::remove_dir_all(self.table_dir(table)).await?;
        info!(table = %table, count = versions.len(), "Removed snapshot history");
        Ok(versions.len())
    }

    /// Lists the tables with stored history, sorted by name.
    pub async fn tables(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tables = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    tables.push(name.to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }
}
