//! Migrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every component of a [`Migrator`](crate::migrator::Migrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Root of snapshots, scripts, failure records and the confirmation code.
    pub history_dir: PathBuf,
    /// Code supplied by the operator to confirm a pending deletion.
    pub critical_code: Option<String>,
    /// Whether deletions need confirmation.
    pub critical_confirmation: bool,
    /// Whether scripts written in a failed pass are removed again.
    pub remove_scripts_on_error: bool,
    /// Whether a human-readable change summary is logged.
    pub log_enabled: bool,
    /// Pause between two script files of the same table.
    pub script_interval: Duration,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from("migration-history"),
            critical_code: None,
            critical_confirmation: true,
            remove_scripts_on_error: true,
            log_enabled: true,
            script_interval: Duration::from_secs(1),
        }
    }
}

impl MigrateConfig {
    /// Creates a configuration rooted at `history_dir`.
    #[must_use]
    pub fn new(history_dir: impl Into<PathBuf>) -> Self {
        Self {
            history_dir: history_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the confirmation code for this run.
    #[must_use]
    pub fn critical_code(mut self, code: Option<String>) -> Self {
        self.critical_code = code;
        self
    }

    /// Enables or disables deletion confirmation.
    #[must_use]
    pub fn critical_confirmation(mut self, enabled: bool) -> Self {
        self.critical_confirmation = enabled;
        self
    }

    /// Enables or disables script cleanup after a failed pass.
    #[must_use]
    pub fn remove_scripts_on_error(mut self, enabled: bool) -> Self {
        self.remove_scripts_on_error = enabled;
        self
    }

    /// Enables or disables the change summary.
    #[must_use]
    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    /// Sets the pause between script files of one table.
    #[must_use]
    pub fn script_interval(mut self, interval: Duration) -> Self {
        self.script_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrateConfig::new("/tmp/history");
        assert_eq!(config.history_dir, PathBuf::from("/tmp/history"));
        assert!(config.critical_confirmation);
        assert!(config.remove_scripts_on_error);
        assert!(config.log_enabled);
        assert_eq!(config.script_interval, Duration::from_secs(1));
        assert!(config.critical_code.is_none());
    }

    #[test]
    fn test_partial_json() {
        let config: MigrateConfig =
            serde_json::from_str(r#"{"history_dir": "h", "critical_confirmation": false}"#)
                .unwrap();
        assert_eq!(config.history_dir, PathBuf::from("h"));
        assert!(!config.critical_confirmation);
        assert!(config.remove_scripts_on_error);
    }
}
