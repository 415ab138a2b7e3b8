//! Records of failed script executions, kept in `<history_dir>/errors/`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Result;

/// What went wrong while running one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub table: String,
    pub script: String,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

/// File-backed failure log.
#[derive(Debug, Clone)]
pub struct FailureLog {
    root: PathBuf,
}

impl FailureLog {
    pub fn new(history_dir: impl AsRef<Path>) -> Self {
        Self {
            root: history_dir.as_ref().join("errors"),
        }
    }

    /// Writes a record named after its script and returns the file path.
    pub async fn record(&self, record: &FailureRecord) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{}.json", record.script));
        tokio::fs::write(&path, serde_json::to_vec_pretty(record)?).await?;
        error!(
            table = %record.table,
            script = %record.script,
            error = %record.error,
            "Migration failed"
        );
        Ok(path)
    }

    /// Reads every record, oldest first.
    pub async fn list(&self) -> Result<Vec<FailureRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let bytes = tokio::fs::read(entry.path()).await?;
            records.push(serde_json::from_slice::<FailureRecord>(&bytes)?);
        }
        records.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(records)
    }
}
