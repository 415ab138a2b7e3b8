//! Change classification for updated columns.

use serde::{Deserialize, Serialize};

use crate::column::ColumnSpec;

/// Which properties of a column differ between two definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeFlags {
    /// Base method or its arguments.
    pub type_changed: bool,
    pub default_changed: bool,
    /// Primary key presence or auto-increment.
    pub primary_changed: bool,
    /// Target or cascade rules.
    pub foreign_key_changed: bool,
    pub unique_changed: bool,
    pub nullable_changed: bool,
    pub unsigned_changed: bool,
    pub string_bound_changed: bool,
    pub number_bound_changed: bool,
}

impl ChangeFlags {
    /// Returns whether the column must be redefined with an alter.
    #[must_use]
    pub const fn format_changed(&self) -> bool {
        self.type_changed || self.nullable_changed || self.unsigned_changed || self.default_changed
    }

    /// Returns whether nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.format_changed()
            || self.primary_changed
            || self.foreign_key_changed
            || self.unique_changed
            || self.string_bound_changed
            || self.number_bound_changed)
    }
}

/// Compares two definitions of the same column.
#[must_use]
pub fn classify(old: &ColumnSpec, new: &ColumnSpec) -> ChangeFlags {
    ChangeFlags {
        type_changed: old.column_type != new.column_type,
        default_changed: old.default != new.default,
        primary_changed: old.primary_state() != new.primary_state(),
        foreign_key_changed: old.foreign_key != new.foreign_key,
        unique_changed: old.unique != new.unique,
        nullable_changed: old.not_nullable != new.not_nullable,
        unsigned_changed: old.unsigned != new.unsigned,
        string_bound_changed: old.string_max() != new.string_max(),
        number_bound_changed: old.number_range() != new.number_range(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnType, DefaultValue, ForeignKey, NumericKind};

    #[test]
    fn test_identical() {
        let col = ColumnSpec::string("name", 20).not_nullable();
        let flags = classify(&col, &col.clone());
        assert!(flags.is_empty());
        assert!(!flags.format_changed());
    }

    #[test]
    fn test_string_length() {
        let flags = classify(
            &ColumnSpec::string("name", 20),
            &ColumnSpec::string("name", 10),
        );
        assert!(flags.type_changed);
        assert!(flags.string_bound_changed);
        assert!(!flags.number_bound_changed);
        assert!(flags.format_changed());
    }

    #[test]
    fn test_enum_has_no_string_bound() {
        let flags = classify(
            &ColumnSpec::enumeration("kind", ["a"]),
            &ColumnSpec::enumeration("kind", ["a", "b"]),
        );
        assert!(flags.type_changed);
        assert!(!flags.string_bound_changed);
    }

    #[test]
    fn test_unsigned_changes_number_bound() {
        let flags = classify(
            &ColumnSpec::integer("age"),
            &ColumnSpec::integer("age").unsigned(),
        );
        assert!(flags.unsigned_changed);
        assert!(flags.number_bound_changed);
        assert!(!flags.type_changed);
    }

    #[test]
    fn test_primary_auto_increment() {
        let flags = classify(
            &ColumnSpec::specific("id", NumericKind::Int, true).primary(),
            &ColumnSpec::increments("id"),
        );
        assert!(flags.primary_changed);
        assert!(flags.type_changed);
        assert!(!flags.number_bound_changed);

        let same_key = classify(
            &ColumnSpec::integer("id").primary(),
            &ColumnSpec::integer("id").primary().not_nullable(),
        );
        assert!(!same_key.primary_changed);
        assert!(same_key.nullable_changed);
    }

    #[test]
    fn test_foreign_key_and_default() {
        let old = ColumnSpec::integer("team_id").references(ForeignKey::new("teams", "id"));
        let new = ColumnSpec::integer("team_id")
            .references(ForeignKey::new("teams", "id").on_delete_cascade())
            .default_to(DefaultValue::Integer(1));
        let flags = classify(&old, &new);
        assert!(flags.foreign_key_changed);
        assert!(flags.default_changed);
        assert!(!flags.unique_changed);
    }

    #[test]
    fn test_category_change() {
        let flags = classify(
            &ColumnSpec::string("flag", 5),
            &ColumnSpec::new("flag", ColumnType::Boolean),
        );
        assert!(flags.type_changed);
        assert!(flags.string_bound_changed);
    }
}
