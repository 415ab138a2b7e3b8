//! Facts derived from a [`ColumnSpec`]: type category, bounds, key state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ColumnSpec, ColumnType, NumericKind, TextSize};

/// Broad type families. Changing family on a populated table is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    String,
    Number,
    Boolean,
    Date,
}

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumberBound {
    /// Exact integer bound.
    Integer(i128),
    /// Decimal bound.
    Decimal(f64),
}

impl fmt::Display for NumberBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
        }
    }
}

/// Inclusive range of values a numeric column accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: NumberBound,
    pub max: NumberBound,
}

/// Primary key status of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryState {
    pub auto_increment: bool,
}

/// Signed MySQL integer ranges.
const fn integer_range(kind: NumericKind) -> Option<(i128, i128)> {
    match kind {
        NumericKind::TinyInt => Some((-128, 127)),
        NumericKind::SmallInt => Some((-32_768, 32_767)),
        NumericKind::MediumInt => Some((-8_388_608, 8_388_607)),
        NumericKind::Int => Some((-2_147_483_648, 2_147_483_647)),
        NumericKind::BigInt => Some((i64::MIN as i128, i64::MAX as i128)),
        NumericKind::Double => None,
    }
}

impl ColumnSpec {
    /// Returns the broad type family.
    #[must_use]
    pub const fn type_category(&self) -> TypeCategory {
        match self.column_type {
            ColumnType::String { .. } | ColumnType::Text(_) | ColumnType::Enum(_) => {
                TypeCategory::String
            }
            ColumnType::Increments
            | ColumnType::Float { .. }
            | ColumnType::Specific { .. }
            | ColumnType::Integer => TypeCategory::Number,
            ColumnType::Boolean => TypeCategory::Boolean,
            ColumnType::Timestamp | ColumnType::DateTime => TypeCategory::Date,
        }
    }

    /// Returns whether the column is unsigned through the modifier or its type.
    #[must_use]
    pub const fn is_deep_unsigned(&self) -> bool {
        self.unsigned
            || matches!(
                self.column_type,
                ColumnType::Increments | ColumnType::Specific { unsigned: true, .. }
            )
    }

    /// Returns the primary key state, `None` when the column is not primary.
    #[must_use]
    pub fn primary_state(&self) -> Option<PrimaryState> {
        self.primary.then(|| PrimaryState {
            auto_increment: self.is_increments(),
        })
    }

    /// Returns the maximum stored length in characters.
    ///
    /// Enumerations are bounded by their value list and have no length.
    #[must_use]
    pub const fn string_max(&self) -> Option<u64> {
        match self.column_type {
            ColumnType::String { length } => match length {
                Some(length) => Some(length as u64),
                None => Some(255),
            },
            ColumnType::Text(None) => Some(65_535),
            ColumnType::Text(Some(TextSize::Medium)) => Some(16_777_215),
            ColumnType::Text(Some(TextSize::Long)) => Some(4_294_967_295),
            _ => None,
        }
    }

    /// Returns the range of values the column accepts.
    #[must_use]
    pub fn number_range(&self) -> Option<NumericRange> {
        let unsigned = self.is_deep_unsigned();
        let integer = |kind: NumericKind| {
            integer_range(kind).map(|(min, max)| {
                if unsigned {
                    NumericRange {
                        min: NumberBound::Integer(0),
                        max: NumberBound::Integer(max * 2 + 1),
                    }
                } else {
                    NumericRange {
                        min: NumberBound::Integer(min),
                        max: NumberBound::Integer(max),
                    }
                }
            })
        };
        let decimal = |max: f64| NumericRange {
            min: NumberBound::Decimal(if unsigned { 0.0 } else { -max }),
            max: NumberBound::Decimal(max),
        };

        match self.column_type {
            ColumnType::Increments | ColumnType::Integer => integer(NumericKind::Int),
            ColumnType::Specific {
                kind: NumericKind::Double,
                ..
            } => Some(decimal(f64::MAX)),
            ColumnType::Specific { kind, .. } => integer(kind),
            ColumnType::Float { precision, scale } => {
                let whole = i32::from(precision.saturating_sub(scale));
                let fraction = i32::from(scale);
                Some(decimal(10f64.powi(whole) - 10f64.powi(-fraction)))
            }
            _ => None,
        }
    }
}
