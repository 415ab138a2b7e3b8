//! Column specifications.
//!
//! A [`ColumnSpec`] is the structured form of one column of a declared table.
//! It is persisted in history snapshots through its canonical builder-chain
//! encoding (see [`codec`]), e.g.
//!
//! ```text
//! t.string('email', 50).unique().notNullable()
//! t.integer('author_id').unsigned().references('id').inTable('authors').onDelete('CASCADE')
//! ```

pub mod codec;
pub mod info;
mod lexer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{decode, encode, encode_with_name, RENAME_PLACEHOLDER};
pub use info::{NumberBound, NumericRange, PrimaryState, TypeCategory};

/// Integer and floating kinds accepted by `specificType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 24-bit integer.
    MediumInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Double precision floating point.
    Double,
}

impl NumericKind {
    /// Returns the lowercase SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::MediumInt => "mediumint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Double => "double",
        }
    }

    /// Parses a keyword, case-insensitively.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "tinyint" => Some(Self::TinyInt),
            "smallint" => Some(Self::SmallInt),
            "mediumint" => Some(Self::MediumInt),
            "int" | "integer" => Some(Self::Int),
            "bigint" => Some(Self::BigInt),
            "double" => Some(Self::Double),
            _ => None,
        }
    }
}

/// Sizes of `text` columns beyond the plain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextSize {
    /// `MEDIUMTEXT`.
    Medium,
    /// `LONGTEXT`.
    Long,
}

impl TextSize {
    /// Returns the SQL keyword used as the builder argument.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Medium => "mediumtext",
            Self::Long => "longtext",
        }
    }
}

/// The base builder method of a column together with its literal arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Auto-increment unsigned integer primary key.
    Increments,
    /// Boolean.
    Boolean,
    /// Timestamp.
    Timestamp,
    /// Date and time without time zone conversion.
    DateTime,
    /// Fixed precision float.
    Float {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Raw numeric type given through `specificType`.
    Specific {
        /// Numeric kind.
        kind: NumericKind,
        /// Whether the type text itself says `unsigned`.
        unsigned: bool,
    },
    /// 32-bit integer.
    Integer,
    /// Enumeration of allowed values.
    Enum(Vec<String>),
    /// Variable-length string.
    String {
        /// Maximum length; `None` means the builder default.
        length: Option<u32>,
    },
    /// Text blob.
    Text(Option<TextSize>),
}

impl ColumnType {
    /// Returns the builder method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Increments => "increments",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::DateTime => "dateTime",
            Self::Float { .. } => "float",
            Self::Specific { .. } => "specificType",
            Self::Integer => "integer",
            Self::Enum(_) => "enum",
            Self::String { .. } => "string",
            Self::Text(_) => "text",
        }
    }
}

/// A literal default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// String literal.
    Text(String),
    /// Integer literal.
    Integer(i64),
    /// Decimal literal.
    Float(f64),
    /// Boolean literal.
    Boolean(bool),
    /// The current timestamp at insert time.
    Now,
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(&codec::quote(s)),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Now => f.write_str("now()"),
        }
    }
}

/// Foreign key target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// `ON DELETE CASCADE`.
    pub on_delete_cascade: bool,
    /// `ON UPDATE CASCADE`.
    pub on_update_cascade: bool,
}

impl ForeignKey {
    /// Creates a reference to `table.column` without cascades.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete_cascade: false,
            on_update_cascade: false,
        }
    }

    /// Cascades deletes.
    #[must_use]
    pub fn on_delete_cascade(mut self) -> Self {
        self.on_delete_cascade = true;
        self
    }

    /// Cascades updates.
    #[must_use]
    pub fn on_update_cascade(mut self) -> Self {
        self.on_update_cascade = true;
        self
    }
}

/// Modifiers that [`ColumnSpec::clear`] can strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// `primary()`.
    Primary,
    /// `references().inTable()` and its cascades.
    ForeignKey,
    /// `unique()`.
    Unique,
    /// `defaultTo()`.
    Default,
    /// `notNullable()`.
    NotNullable,
    /// `unsigned()`.
    Unsigned,
}

/// Structured definition of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Base type.
    pub column_type: ColumnType,
    /// `UNIQUE` constraint.
    pub unique: bool,
    /// `NOT NULL` constraint.
    pub not_nullable: bool,
    /// Primary key flag.
    pub primary: bool,
    /// Foreign key target.
    pub foreign_key: Option<ForeignKey>,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Explicit `unsigned()` modifier.
    pub unsigned: bool,
}

impl ColumnSpec {
    /// Creates a column with no modifiers.
    ///
    /// `increments` columns are always primary and unsigned.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let increments = column_type == ColumnType::Increments;
        Self {
            name: name.into(),
            column_type,
            unique: false,
            not_nullable: false,
            primary: increments,
            foreign_key: None,
            default: None,
            unsigned: increments,
        }
    }

    /// `t.increments(name)`.
    #[must_use]
    pub fn increments(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Increments)
    }

    /// `t.integer(name)`.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    /// `t.string(name, length)`.
    #[must_use]
    pub fn string(name: impl Into<String>, length: u32) -> Self {
        Self::new(
            name,
            ColumnType::String {
                length: Some(length),
            },
        )
    }

    /// `t.text(name)`.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text(None))
    }

    /// `t.boolean(name)`.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    /// `t.timestamp(name)`.
    #[must_use]
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    /// `t.float(name, precision, scale)`.
    #[must_use]
    pub fn float(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(name, ColumnType::Float { precision, scale })
    }

    /// `t.specificType(name, kind [unsigned])`.
    #[must_use]
    pub fn specific(name: impl Into<String>, kind: NumericKind, unsigned: bool) -> Self {
        Self::new(name, ColumnType::Specific { kind, unsigned })
    }

    /// `t.enum(name, values)`.
    #[must_use]
    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ColumnType::Enum(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Adds `unique()`.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds `notNullable()`.
    #[must_use]
    pub fn not_nullable(mut self) -> Self {
        self.not_nullable = true;
        self
    }

    /// Adds `primary()`.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Adds `unsigned()`.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Adds `defaultTo(value)`.
    #[must_use]
    pub fn default_to(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Returns a copy with the given modifiers stripped.
    ///
    /// Clearing `Primary` or `Unsigned` from an `increments` column has no
    /// effect on the encoding since both are implied by the type.
    #[must_use]
    pub fn clear(&self, modifiers: &[Modifier]) -> Self {
        let mut cleared = self.clone();
        let increments = self.column_type == ColumnType::Increments;
        for modifier in modifiers {
            match modifier {
                Modifier::Primary => cleared.primary = increments,
                Modifier::ForeignKey => cleared.foreign_key = None,
                Modifier::Unique => cleared.unique = false,
                Modifier::Default => cleared.default = None,
                Modifier::NotNullable => cleared.not_nullable = false,
                Modifier::Unsigned => cleared.unsigned = increments,
            }
        }
        cleared
    }

    /// Returns a copy carrying a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut renamed = self.clone();
        renamed.name = name.into();
        renamed
    }

    /// Returns whether this is an `increments` column.
    #[must_use]
    pub fn is_increments(&self) -> bool {
        self.column_type == ColumnType::Increments
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}
