//! Snapshot diffing.
//!
//! Compares the last recorded snapshot of a table with the declared one and
//! partitions columns into added, deleted, updated and renamed.
//!
//! Rename detection is a heuristic: a deleted column and an added column whose
//! encodings are identical once the name is replaced by
//! [`RENAME_PLACEHOLDER`] are treated as one rename. Two unrelated columns that
//! happen to share a definition are therefore reported as a rename too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::{encode, encode_with_name, ColumnSpec, RENAME_PLACEHOLDER};
use crate::error::Result;
use crate::snapshot::TableSnapshot;

/// Old and new definition of a column present in both snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    pub old: ColumnSpec,
    pub new: ColumnSpec,
}

/// A column whose structure is unchanged but whose name changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Renamed {
    pub old_name: String,
    pub new_name: String,
}

/// Column-level difference between two snapshots of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub added: BTreeMap<String, ColumnSpec>,
    pub deleted: BTreeMap<String, ColumnSpec>,
    pub updated: BTreeMap<String, ColumnUpdate>,
    pub renamed: Vec<Renamed>,
}

impl Delta {
    /// Returns whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.deleted.is_empty()
            && self.updated.is_empty()
            && self.renamed.is_empty()
    }

    /// Returns whether any column is deleted.
    #[must_use]
    pub fn has_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }

    /// Returns the delta that undoes this one.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            added: self.deleted.clone(),
            deleted: self.added.clone(),
            updated: self
                .updated
                .iter()
                .map(|(name, update)| {
                    (
                        name.clone(),
                        ColumnUpdate {
                            old: update.new.clone(),
                            new: update.old.clone(),
                        },
                    )
                })
                .collect(),
            renamed: self
                .renamed
                .iter()
                .map(|r| Renamed {
                    old_name: r.new_name.clone(),
                    new_name: r.old_name.clone(),
                })
                .collect(),
        }
    }
}

fn decode_all(snapshot: &TableSnapshot) -> Result<BTreeMap<String, ColumnSpec>> {
    Ok(snapshot
        .specs()?
        .into_iter()
        .map(|spec| (spec.name.clone(), spec))
        .collect())
}

/// Computes the delta from `old` to `new`.
///
/// Columns are compared on their canonical re-encoding, so history written
/// with a different modifier order does not show up as an update.
pub fn diff(old: &TableSnapshot, new: &TableSnapshot) -> Result<Delta> {
    let old_specs = decode_all(old)?;
    let mut new_specs = decode_all(new)?;
    let mut delta = Delta::default();

    for (name, old_spec) in old_specs {
        match new_specs.remove(&name) {
            Some(new_spec) => {
                if encode(&old_spec) != encode(&new_spec) {
                    delta.updated.insert(
                        name,
                        ColumnUpdate {
                            old: old_spec,
                            new: new_spec,
                        },
                    );
                }
            }
            None => {
                delta.deleted.insert(name, old_spec);
            }
        }
    }
    delta.added = new_specs;

    detect_renames(&mut delta);
    Ok(delta)
}

/// Pairs deleted and added columns with identical structure, one to one, in
/// name order.
fn detect_renames(delta: &mut Delta) {
    let mut pairs = Vec::new();
    let mut taken: Vec<&str> = Vec::new();

    for (old_name, old_spec) in &delta.deleted {
        let fingerprint = encode_with_name(old_spec, RENAME_PLACEHOLDER);
        let matched = delta.added.iter().find(|(new_name, new_spec)| {
            !taken.contains(&new_name.as_str())
                && encode_with_name(new_spec, RENAME_PLACEHOLDER) == fingerprint
        });
        if let Some((new_name, _)) = matched {
            taken.push(new_name.as_str());
            pairs.push(Renamed {
                old_name: old_name.clone(),
                new_name: new_name.clone(),
            });
        }
    }

    for pair in &pairs {
        delta.deleted.remove(&pair.old_name);
        delta.added.remove(&pair.new_name);
    }
    delta.renamed = pairs;
}
