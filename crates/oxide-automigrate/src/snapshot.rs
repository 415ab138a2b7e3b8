//! Table snapshots.
//!
//! A snapshot maps every column name of a table to its canonical encoding. It
//! is what the history store persists and what the differ compares.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::{self, ColumnSpec};
use crate::error::{MigrateError, Result};

/// Column name to encoded [`ColumnSpec`], ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSnapshot {
    columns: BTreeMap<String, String>,
}

impl TableSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from declared columns.
    ///
    /// Fails with `DuplicateColumn` when two columns share a name.
    pub fn from_specs(table: &str, specs: &[ColumnSpec]) -> Result<Self> {
        let mut columns = BTreeMap::new();
        for spec in specs {
            if columns
                .insert(spec.name.clone(), column::encode(spec))
                .is_some()
            {
                return Err(MigrateError::DuplicateColumn {
                    table: table.to_string(),
                    column: spec.name.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Wraps already-encoded columns.
    #[must_use]
    pub fn from_encoded(columns: BTreeMap<String, String>) -> Self {
        Self { columns }
    }

    /// Returns the encoded column, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }

    /// Returns whether the column is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Iterates over `(name, encoding)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether the snapshot has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Decodes one column.
    pub fn column(&self, name: &str) -> Result<Option<ColumnSpec>> {
        self.columns.get(name).map(|s| column::decode(s)).transpose()
    }

    /// Decodes every column in name order.
    ///
    /// The decoded name is taken from the key so that hand-edited history
    /// cannot disagree with itself.
    pub fn specs(&self) -> Result<Vec<ColumnSpec>> {
        self.columns
            .iter()
            .map(|(name, encoded)| {
                let mut spec = column::decode(encoded)?;
                spec.name.clone_from(name);
                Ok(spec)
            })
            .collect()
    }

    /// Checks the structural rules a declared table must follow.
    ///
    /// At most one primary key column; no column both primary and foreign.
    /// Snapshots read back from history are not validated.
    pub fn validate(&self, table: &str) -> Result<()> {
        let specs = self.specs()?;

        if let Some(conflict) = specs
            .iter()
            .find(|spec| spec.primary && spec.foreign_key.is_some())
        {
            return Err(MigrateError::PrimaryAndForeignConflict {
                table: table.to_string(),
                column: conflict.name.clone(),
            });
        }

        let primaries: Vec<String> = specs
            .iter()
            .filter(|spec| spec.primary)
            .map(|spec| spec.name.clone())
            .collect();
        if primaries.len() > 1 {
            return Err(MigrateError::MultiplePrimaryKeys {
                table: table.to_string(),
                columns: primaries,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ForeignKey;

    fn users() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::increments("id"),
            ColumnSpec::string("name", 100).not_nullable(),
            ColumnSpec::string("email", 50).unique(),
        ]
    }

    #[test]
    fn test_from_specs() {
        let snapshot = TableSnapshot::from_specs("users", &users()).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("id"), Some("t.increments('id')"));
        assert_eq!(
            snapshot.get("email"),
            Some("t.string('email', 50).unique()")
        );
        assert_eq!(snapshot.specs().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_column() {
        let mut specs = users();
        specs.push(ColumnSpec::text("name"));
        assert!(matches!(
            TableSnapshot::from_specs("users", &specs),
            Err(MigrateError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_json_is_flat_mapping() {
        let snapshot = TableSnapshot::from_specs("users", &users()[..1]).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"id":"t.increments('id')"}"#);
        let back: TableSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_validate_multiple_primary_keys() {
        let mut specs = users();
        specs.push(ColumnSpec::integer("code").primary());
        let snapshot = TableSnapshot::from_specs("users", &specs).unwrap();
        match snapshot.validate("users") {
            Err(MigrateError::MultiplePrimaryKeys { columns, .. }) => {
                assert_eq!(columns, vec!["code".to_string(), "id".to_string()]);
            }
            other => panic!("expected MultiplePrimaryKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_primary_and_foreign() {
        let specs = vec![ColumnSpec::integer("user_id")
            .primary()
            .references(ForeignKey::new("users", "id"))];
        let snapshot = TableSnapshot::from_specs("profiles", &specs).unwrap();
        assert!(matches!(
            snapshot.validate("profiles"),
            Err(MigrateError::PrimaryAndForeignConflict { .. })
        ));
    }

    #[test]
    fn test_validate_ok() {
        let snapshot = TableSnapshot::from_specs("users", &users()).unwrap();
        assert!(snapshot.validate("users").is_ok());
    }
}
