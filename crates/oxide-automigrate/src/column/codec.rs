//! Canonical text encoding of [`ColumnSpec`].
//!
//! The encoding is a builder chain rooted at `t`:
//!
//! ```text
//! t.<method>('<name>'[, args])[.unsigned()][.unique()][.primary()]
//!     [.references('<column>').inTable('<table>')][.defaultTo(<value>)]
//!     [.notNullable()][.onDelete('CASCADE')][.onUpdate('CASCADE')]
//! ```
//!
//! [`encode`] always writes modifiers in the order above. [`decode`] accepts
//! them in any order, and normalizes `increments` to primary and unsigned.

use super::lexer::{Lexer, Token, TokenKind};
use super::{ColumnSpec, ColumnType, DefaultValue, ForeignKey, NumericKind, TextSize};
use crate::error::{MigrateError, Result};

/// Name substituted for the column name when comparing structures for renames.
pub const RENAME_PLACEHOLDER: &str = "_NO_VALUE";

/// Default precision and scale of `float` without arguments.
const DEFAULT_FLOAT: (u8, u8) = (8, 2);

// ============================================================================
// Encoding
// ============================================================================

pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn encode_default(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Text(s) => quote(s),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Float(f) => format!("{:?}", f),
        DefaultValue::Boolean(b) => b.to_string(),
        DefaultValue::Now => "knex.fn.now()".to_string(),
    }
}

fn encode_arguments(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Float { precision, scale } => format!(", {}, {}", precision, scale),
        ColumnType::Specific { kind, unsigned } => {
            let suffix = if *unsigned { " unsigned" } else { "" };
            format!(", {}", quote(&format!("{}{}", kind.keyword(), suffix)))
        }
        ColumnType::Enum(values) => {
            let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
            format!(", [{}]", quoted.join(", "))
        }
        ColumnType::String {
            length: Some(length),
        } => format!(", {}", length),
        ColumnType::Text(Some(size)) => format!(", {}", quote(size.keyword())),
        _ => String::new(),
    }
}

/// Encodes a column into its canonical builder chain.
#[must_use]
pub fn encode(spec: &ColumnSpec) -> String {
    let increments = spec.is_increments();
    let mut out = format!(
        "t.{}({}{})",
        spec.column_type.method(),
        quote(&spec.name),
        encode_arguments(&spec.column_type)
    );

    if spec.unsigned && !increments {
        out.push_str(".unsigned()");
    }
    if spec.unique {
        out.push_str(".unique()");
    }
    if spec.primary && !increments {
        out.push_str(".primary()");
    }
    if let Some(fk) = &spec.foreign_key {
        out.push_str(&format!(
            ".references({}).inTable({})",
            quote(&fk.column),
            quote(&fk.table)
        ));
    }
    if let Some(default) = &spec.default {
        out.push_str(&format!(".defaultTo({})", encode_default(default)));
    }
    if spec.not_nullable {
        out.push_str(".notNullable()");
    }
    if let Some(fk) = &spec.foreign_key {
        if fk.on_delete_cascade {
            out.push_str(".onDelete('CASCADE')");
        }
        if fk.on_update_cascade {
            out.push_str(".onUpdate('CASCADE')");
        }
    }
    out
}

/// Encodes a column with its name replaced by `placeholder`.
#[must_use]
pub fn encode_with_name(spec: &ColumnSpec, placeholder: &str) -> String {
    encode(&spec.renamed(placeholder))
}

// ============================================================================
// Decoding
// ============================================================================

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Number(String),
    Bool(bool),
    Null,
    Array(Vec<Arg>),
    /// Dotted call such as `knex.fn.now()`.
    Call(Vec<String>, Vec<Arg>),
}

/// One `.name(args)` link of the chain.
#[derive(Debug, Clone)]
struct Call {
    name: String,
    args: Vec<Arg>,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            tokens: Lexer::new(input).tokenize(),
            pos: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |token| &token.kind)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            offset: self.input.len(),
        });
        self.pos += 1;
        token
    }

    fn error(&self, token: &Token, expected: &str) -> MigrateError {
        let reason = match &token.kind {
            TokenKind::Error(message) => format!("{} at offset {}", message, token.offset),
            other => format!(
                "expected {} at offset {}, found {:?}",
                expected, token.offset, other
            ),
        };
        MigrateError::malformed(self.input, reason)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<()> {
        let token = self.bump();
        if &token.kind == kind {
            Ok(())
        } else {
            Err(self.error(&token, expected))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let token = self.bump();
        match token.kind {
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(self.error(&token, "identifier")),
        }
    }

    /// Parses `t(.call)+` up to the end of input.
    fn parse_chain(&mut self) -> Result<Vec<Call>> {
        let root = self.identifier()?;
        if root != "t" {
            return Err(MigrateError::malformed(
                self.input,
                format!("chain must start with 't', found '{}'", root),
            ));
        }

        let mut calls = Vec::new();
        while *self.peek() == TokenKind::Dot {
            self.bump();
            let name = self.identifier()?;
            let args = self.parse_arguments()?;
            calls.push(Call { name, args });
        }

        let token = self.bump();
        if token.kind != TokenKind::Eof {
            return Err(self.error(&token, "'.' or end of input"));
        }
        if calls.is_empty() {
            return Err(MigrateError::malformed(self.input, "missing column method"));
        }
        Ok(calls)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Arg>> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        self.parse_list(&TokenKind::RightParen, "')'")
    }

    fn parse_list(&mut self, close: &TokenKind, expected: &str) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        if self.peek() == close {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_argument()?);
            let token = self.bump();
            if &token.kind == close {
                return Ok(args);
            }
            if token.kind != TokenKind::Comma {
                return Err(self.error(&token, expected));
            }
        }
    }

    fn parse_argument(&mut self) -> Result<Arg> {
        let token = self.bump();
        match token.kind {
            TokenKind::Str(value) => Ok(Arg::Str(value)),
            TokenKind::Number(value) => Ok(Arg::Number(value)),
            TokenKind::LeftBracket => Ok(Arg::Array(
                self.parse_list(&TokenKind::RightBracket, "']'")?,
            )),
            TokenKind::Identifier(name) => match name.as_str() {
                "true" => Ok(Arg::Bool(true)),
                "false" => Ok(Arg::Bool(false)),
                "null" => Ok(Arg::Null),
                _ => {
                    let mut path = vec![name];
                    while *self.peek() == TokenKind::Dot {
                        self.bump();
                        path.push(self.identifier()?);
                    }
                    let args = self.parse_arguments()?;
                    Ok(Arg::Call(path, args))
                }
            },
            _ => Err(self.error(&token, "argument")),
        }
    }
}

fn string_arg(input: &str, call: &Call, index: usize) -> Result<String> {
    match call.args.get(index) {
        Some(Arg::Str(value)) => Ok(value.clone()),
        _ => Err(MigrateError::malformed(
            input,
            format!("{}() expects a string argument at position {}", call.name, index),
        )),
    }
}

fn number_arg<T: std::str::FromStr>(input: &str, call: &Call, index: usize) -> Result<Option<T>> {
    match call.args.get(index) {
        None => Ok(None),
        Some(Arg::Number(text)) => text.parse().map(Some).map_err(|_| {
            let reason = format!("{}() has an invalid number '{}'", call.name, text);
            MigrateError::malformed(input, reason)
        }),
        Some(_) => Err(MigrateError::malformed(
            input,
            format!("{}() expects a number at position {}", call.name, index),
        )),
    }
}

fn decode_type(input: &str, call: &Call) -> Result<ColumnType> {
    let column_type = match call.name.as_str() {
        "increments" => ColumnType::Increments,
        "boolean" => ColumnType::Boolean,
        "timestamp" => ColumnType::Timestamp,
        "dateTime" => ColumnType::DateTime,
        "integer" => ColumnType::Integer,
        "float" => ColumnType::Float {
            precision: number_arg(input, call, 1)?.unwrap_or(DEFAULT_FLOAT.0),
            scale: number_arg(input, call, 2)?.unwrap_or(DEFAULT_FLOAT.1),
        },
        "string" => ColumnType::String {
            length: number_arg(input, call, 1)?,
        },
        "text" => match call.args.get(1) {
            None => ColumnType::Text(None),
            Some(_) => match string_arg(input, call, 1)?.to_ascii_lowercase().as_str() {
                "text" => ColumnType::Text(None),
                "mediumtext" => ColumnType::Text(Some(TextSize::Medium)),
                "longtext" => ColumnType::Text(Some(TextSize::Long)),
                other => {
                    return Err(MigrateError::UnsupportedColumnType {
                        method: format!("text '{}'", other),
                        input: input.to_string(),
                    })
                }
            },
        },
        "enum" => match call.args.get(1) {
            Some(Arg::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Arg::Str(value) => values.push(value.clone()),
                        _ => {
                            return Err(MigrateError::malformed(
                                input,
                                "enum() values must be strings",
                            ))
                        }
                    }
                }
                ColumnType::Enum(values)
            }
            _ => {
                return Err(MigrateError::malformed(
                    input,
                    "enum() expects an array of values",
                ))
            }
        },
        "specificType" => {
            let raw = string_arg(input, call, 1)?;
            let mut words = raw.split_whitespace();
            let kind = words.next().and_then(NumericKind::from_keyword);
            let rest: Vec<&str> = words.collect();
            match (kind, rest.as_slice()) {
                (Some(kind), []) => ColumnType::Specific {
                    kind,
                    unsigned: false,
                },
                (Some(kind), [word]) if word.eq_ignore_ascii_case("unsigned") => {
                    ColumnType::Specific {
                        kind,
                        unsigned: true,
                    }
                }
                _ => {
                    return Err(MigrateError::UnsupportedColumnType {
                        method: format!("specificType '{}'", raw),
                        input: input.to_string(),
                    })
                }
            }
        }
        other => {
            return Err(MigrateError::UnsupportedColumnType {
                method: other.to_string(),
                input: input.to_string(),
            })
        }
    };
    Ok(column_type)
}

fn decode_default(input: &str, arg: Option<&Arg>) -> Result<Option<DefaultValue>> {
    let value = match arg {
        None | Some(Arg::Null) => None,
        Some(Arg::Str(s)) => Some(DefaultValue::Text(s.clone())),
        Some(Arg::Bool(b)) => Some(DefaultValue::Boolean(*b)),
        Some(Arg::Number(text)) => match text.parse::<i64>() {
            Ok(i) => Some(DefaultValue::Integer(i)),
            Err(_) => Some(DefaultValue::Float(text.parse().map_err(|_| {
                MigrateError::malformed(input, format!("invalid default number '{}'", text))
            })?)),
        },
        Some(Arg::Call(path, args)) => {
            let path: Vec<&str> = path.iter().map(String::as_str).collect();
            match (path.as_slice(), args.as_slice()) {
                (["knex", "fn", "now"], []) => Some(DefaultValue::Now),
                (["knex", "raw"], [Arg::Str(raw)])
                    if raw.eq_ignore_ascii_case("now()")
                        || raw.eq_ignore_ascii_case("CURRENT_TIMESTAMP") =>
                {
                    Some(DefaultValue::Now)
                }
                _ => {
                    return Err(MigrateError::malformed(
                        input,
                        format!("unsupported default expression '{}()'", path.join(".")),
                    ))
                }
            }
        }
        Some(Arg::Array(_)) => {
            return Err(MigrateError::malformed(
                input,
                "defaultTo() does not accept arrays",
            ))
        }
    };
    Ok(value)
}

fn cascade(input: &str, call: &Call) -> Result<bool> {
    let action = string_arg(input, call, 0)?;
    if action.eq_ignore_ascii_case("CASCADE") {
        Ok(true)
    } else {
        Err(MigrateError::malformed(
            input,
            format!("{}('{}') is not supported, only CASCADE", call.name, action),
        ))
    }
}

/// Decodes a canonical (or equivalent) builder chain into a [`ColumnSpec`].
pub fn decode(input: &str) -> Result<ColumnSpec> {
    let calls = Parser::new(input).parse_chain()?;
    let (base, modifiers) = match calls.split_first() {
        Some(split) => split,
        None => return Err(MigrateError::malformed(input, "missing column method")),
    };

    let column_type = decode_type(input, base)?;
    let name = string_arg(input, base, 0)?;
    let mut spec = ColumnSpec::new(name, column_type);

    let mut references: Option<String> = None;
    let mut in_table: Option<String> = None;
    let mut on_delete_cascade = false;
    let mut on_update_cascade = false;

    for call in modifiers {
        match call.name.as_str() {
            "unsigned" => spec.unsigned = true,
            "unique" => spec.unique = true,
            "primary" => spec.primary = true,
            "notNullable" => spec.not_nullable = true,
            "nullable" => spec.not_nullable = false,
            "references" => references = Some(string_arg(input, call, 0)?),
            "inTable" => in_table = Some(string_arg(input, call, 0)?),
            "onDelete" => on_delete_cascade = cascade(input, call)?,
            "onUpdate" => on_update_cascade = cascade(input, call)?,
            "defaultTo" => spec.default = decode_default(input, call.args.first())?,
            other => {
                return Err(MigrateError::UnknownModifier {
                    modifier: other.to_string(),
                    input: input.to_string(),
                })
            }
        }
    }

    spec.foreign_key = match (references, in_table) {
        (Some(column), Some(table)) => Some(ForeignKey {
            table,
            column,
            on_delete_cascade,
            on_update_cascade,
        }),
        (Some(qualified), None) => match qualified.split_once('.') {
            Some((table, column)) => Some(ForeignKey {
                table: table.to_string(),
                column: column.to_string(),
                on_delete_cascade,
                on_update_cascade,
            }),
            None => {
                return Err(MigrateError::malformed(
                    input,
                    "references() needs inTable() or a 'table.column' target",
                ))
            }
        },
        (None, Some(_)) => {
            return Err(MigrateError::malformed(
                input,
                "inTable() without references()",
            ))
        }
        (None, None) => {
            if on_delete_cascade || on_update_cascade {
                return Err(MigrateError::malformed(
                    input,
                    "cascade rule without a foreign key",
                ));
            }
            None
        }
    };

    if spec.is_increments() {
        spec.primary = true;
        spec.unsigned = true;
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_canonical_order() {
        let col = ColumnSpec::integer("author_id")
            .not_nullable()
            .references(ForeignKey::new("authors", "id").on_delete_cascade())
            .default_to(DefaultValue::Integer(1))
            .unsigned()
            .unique();
        assert_eq!(
            encode(&col),
            "t.integer('author_id').unsigned().unique().references('id').inTable('authors')\
             .defaultTo(1).notNullable().onDelete('CASCADE')"
        );
    }

    #[test]
    fn test_encode_increments_hides_implied_modifiers() {
        assert_eq!(encode(&ColumnSpec::increments("id")), "t.increments('id')");
    }

    #[test]
    fn test_encode_type_arguments() {
        assert_eq!(
            encode(&ColumnSpec::float("price", 10, 2)),
            "t.float('price', 10, 2)"
        );
        assert_eq!(
            encode(&ColumnSpec::specific("total", NumericKind::BigInt, true)),
            "t.specificType('total', 'bigint unsigned')"
        );
        assert_eq!(
            encode(&ColumnSpec::enumeration("status", ["on", "off"])),
            "t.enum('status', ['on', 'off'])"
        );
        assert_eq!(
            encode(&ColumnSpec::new(
                "body",
                ColumnType::Text(Some(TextSize::Medium))
            )),
            "t.text('body', 'mediumtext')"
        );
        assert_eq!(
            encode(&ColumnSpec::timestamp("created_at").default_to(DefaultValue::Now)),
            "t.timestamp('created_at').defaultTo(knex.fn.now())"
        );
    }

    #[test]
    fn test_decode_any_modifier_order() {
        let spec = decode(
            "t.integer('author_id').inTable('authors').notNullable().references('id').unsigned()",
        )
        .unwrap();
        assert!(spec.not_nullable);
        assert!(spec.unsigned);
        assert_eq!(spec.foreign_key, Some(ForeignKey::new("authors", "id")));
    }

    #[test]
    fn test_decode_qualified_reference() {
        let spec = decode("t.integer('author_id').references('authors.id')").unwrap();
        assert_eq!(spec.foreign_key, Some(ForeignKey::new("authors", "id")));
    }

    #[test]
    fn test_decode_normalizes_increments() {
        let spec = decode("t.increments('id').primary().unsigned()").unwrap();
        assert_eq!(spec, ColumnSpec::increments("id"));
        assert_eq!(encode(&spec), "t.increments('id')");
    }

    #[test]
    fn test_decode_defaults() {
        let cases = [
            ("t.string('s').defaultTo('x')", DefaultValue::Text("x".into())),
            ("t.integer('i').defaultTo(-3)", DefaultValue::Integer(-3)),
            ("t.float('f').defaultTo(1.5)", DefaultValue::Float(1.5)),
            ("t.boolean('b').defaultTo(true)", DefaultValue::Boolean(true)),
            ("t.timestamp('d').defaultTo(knex.fn.now())", DefaultValue::Now),
            ("t.dateTime('d').defaultTo(knex.raw('now()'))", DefaultValue::Now),
        ];
        for (input, expected) in cases {
            assert_eq!(decode(input).unwrap().default, Some(expected), "{input}");
        }
    }

    #[test]
    fn test_round_trip() {
        let specs = vec![
            ColumnSpec::increments("id"),
            ColumnSpec::string("email", 50).unique().not_nullable(),
            ColumnSpec::string("o'brien", 20).default_to(DefaultValue::Text("it's".into())),
            ColumnSpec::float("ratio", 5, 2).default_to(DefaultValue::Float(2.0)),
            ColumnSpec::float("ratio", 8, 2).default_to(DefaultValue::Float(1e-7)),
            ColumnSpec::float("ratio", 8, 2).default_to(DefaultValue::Float(-2.5e-9)),
            ColumnSpec::float("ratio", 8, 2).default_to(DefaultValue::Float(1e300)),
            ColumnSpec::specific("id", NumericKind::Int, true).primary(),
            ColumnSpec::integer("post_id").unsigned().references(
                ForeignKey::new("posts", "id")
                    .on_delete_cascade()
                    .on_update_cascade(),
            ),
            ColumnSpec::new("body", ColumnType::Text(Some(TextSize::Long))),
            ColumnSpec::new("title", ColumnType::String { length: None }),
            ColumnSpec::enumeration("kind", ["a", "b"]).default_to(DefaultValue::Text("a".into())),
            ColumnSpec::boolean("active").default_to(DefaultValue::Boolean(false)),
            ColumnSpec::new("seen_at", ColumnType::DateTime).default_to(DefaultValue::Now),
        ];
        for spec in specs {
            let encoded = encode(&spec);
            assert_eq!(decode(&encoded).unwrap(), spec, "{encoded}");
        }
    }

    #[test]
    fn test_encode_with_name() {
        let a = ColumnSpec::string("email", 50).unique();
        let b = ColumnSpec::string("contact_email", 50).unique();
        assert_eq!(
            encode_with_name(&a, RENAME_PLACEHOLDER),
            encode_with_name(&b, RENAME_PLACEHOLDER)
        );
        assert_eq!(
            encode_with_name(&a, RENAME_PLACEHOLDER),
            "t.string('_NO_VALUE', 50).unique()"
        );
    }

    #[test]
    fn test_unknown_modifier_rejected() {
        let err = decode("t.string('name').index()").unwrap_err();
        assert!(matches!(
            err,
            MigrateError::UnknownModifier { ref modifier, .. } if modifier == "index"
        ));
    }

    #[test]
    fn test_unsupported_type_rejected() {
        assert!(matches!(
            decode("t.json('payload')"),
            Err(MigrateError::UnsupportedColumnType { .. })
        ));
        assert!(matches!(
            decode("t.specificType('x', 'varchar(20)')"),
            Err(MigrateError::UnsupportedColumnType { .. })
        ));
    }

    #[test]
    fn test_malformed_input() {
        for input in [
            "",
            "x.string('a')",
            "t.string('a'",
            "t.string(a)",
            "t.string('a').inTable('b')",
            "t.integer('a').references('b')",
            "t.integer('a').references('id').inTable('b').onDelete('RESTRICT')",
            "t.string('a') extra",
        ] {
            assert!(
                matches!(decode(input), Err(MigrateError::MalformedColumn { .. })),
                "{input}"
            );
        }
    }
}
