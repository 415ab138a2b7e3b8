//! Action compilation.
//!
//! Turns a [`Delta`] into ordered DDL actions for both directions. The forward
//! list is compiled from the delta, the reverse list from the inverted delta,
//! so both always come from the same rules.
//!
//! Within one direction the list is built as deleted, renamed, updated, then
//! added columns. Constraint removals on updated columns are prepended to the
//! updated section, additions are appended, so no constraint is created before
//! the removals it could conflict with.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::changes::classify;
use crate::column::{encode, ColumnSpec, ForeignKey, Modifier};
use crate::diff::Delta;

// ============================================================================
// Actions
// ============================================================================

/// Where an action is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Inside a table alteration block.
    TableBlock,
    /// As its own raw statement.
    Standalone,
}

/// Which way a group of actions moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One atomic DDL step on a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create a column. Unique and foreign constraints come as separate actions.
    AddColumn(ColumnSpec),
    /// Redefine an existing column's type, default, nullability and sign.
    AlterColumn(ColumnSpec),
    DropColumn {
        column: String,
    },
    RenameColumn {
        from: String,
        to: String,
    },
    SetPrimary {
        column: String,
    },
    DropPrimary {
        column: String,
    },
    SetForeign {
        column: String,
        foreign_key: ForeignKey,
    },
    DropForeign {
        column: String,
    },
    SetUnique {
        column: String,
    },
    DropUnique {
        column: String,
    },
    /// Turn an existing primary key into an auto-increment column.
    SetAutoIncrement {
        column: String,
    },
    /// Move a primary key column to the first position.
    PositionFirst(ColumnSpec),
    DropDefault {
        column: String,
    },
}

impl Action {
    /// Returns where the action runs.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        match self {
            Self::SetAutoIncrement { .. } | Self::PositionFirst(_) | Self::DropDefault { .. } => {
                Scope::Standalone
            }
            _ => Scope::TableBlock,
        }
    }

    /// Returns the name of the column the action touches.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::AddColumn(spec) | Self::AlterColumn(spec) | Self::PositionFirst(spec) => {
                &spec.name
            }
            Self::RenameColumn { from, .. } => from,
            Self::DropColumn { column }
            | Self::SetPrimary { column }
            | Self::DropPrimary { column }
            | Self::SetForeign { column, .. }
            | Self::DropForeign { column }
            | Self::SetUnique { column }
            | Self::DropUnique { column }
            | Self::SetAutoIncrement { column }
            | Self::DropDefault { column } => column,
        }
    }
}

/// Renders the action in builder vocabulary, e.g. `t.dropUnique('email')`.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn(spec) => write!(f, "{}", encode(spec)),
            Self::AlterColumn(spec) => write!(f, "{}.alter()", encode(spec)),
            Self::DropColumn { column } => write!(f, "t.dropColumn('{}')", column),
            Self::RenameColumn { from, to } => {
                write!(f, "t.renameColumn('{}', '{}')", from, to)
            }
            Self::SetPrimary { column } => write!(f, "t.primary('{}')", column),
            Self::DropPrimary { .. } => f.write_str("t.dropPrimary()"),
            Self::SetForeign {
                column,
                foreign_key,
            } => {
                write!(
                    f,
                    "t.foreign('{}').references('{}').inTable('{}')",
                    column, foreign_key.column, foreign_key.table
                )?;
                if foreign_key.on_delete_cascade {
                    f.write_str(".onDelete('CASCADE')")?;
                }
                if foreign_key.on_update_cascade {
                    f.write_str(".onUpdate('CASCADE')")?;
                }
                Ok(())
            }
            Self::DropForeign { column } => write!(f, "t.dropForeign('{}')", column),
            Self::SetUnique { column } => write!(f, "t.unique('{}')", column),
            Self::DropUnique { column } => write!(f, "t.dropUnique('{}')", column),
            Self::SetAutoIncrement { column } => write!(f, "raw.setAutoIncrement('{}')", column),
            Self::PositionFirst(spec) => write!(f, "raw.positionFirst({})", encode(spec)),
            Self::DropDefault { column } => write!(f, "raw.dropDefault('{}')", column),
        }
    }
}

/// A contiguous run of actions sharing one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionGroup {
    pub scope: Scope,
    pub direction: Direction,
    pub actions: Vec<Action>,
}

/// Forward and reverse action groups for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledMigration {
    pub table: String,
    pub forward: Vec<ActionGroup>,
    pub reverse: Vec<ActionGroup>,
}

impl CompiledMigration {
    /// Returns whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    /// Iterates over forward actions in execution order.
    pub fn forward_actions(&self) -> impl Iterator<Item = &Action> {
        self.forward.iter().flat_map(|g| g.actions.iter())
    }

    /// Iterates over reverse actions in execution order.
    pub fn reverse_actions(&self) -> impl Iterator<Item = &Action> {
        self.reverse.iter().flat_map(|g| g.actions.iter())
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compiles the delta of `table` into forward and reverse groups.
#[must_use]
pub fn compile(delta: &Delta, table: &str) -> CompiledMigration {
    CompiledMigration {
        table: table.to_string(),
        forward: group(compile_actions(delta), Direction::Forward),
        reverse: group(compile_actions(&delta.inverted()), Direction::Reverse),
    }
}

/// Builds the flat action list for one direction.
#[must_use]
pub fn compile_actions(delta: &Delta) -> Vec<Action> {
    let mut actions = Vec::new();

    for (name, spec) in &delta.deleted {
        deleted_actions(name, spec, &mut actions);
    }

    for renamed in &delta.renamed {
        actions.push(Action::RenameColumn {
            from: renamed.old_name.clone(),
            to: renamed.new_name.clone(),
        });
    }

    let mut updated = VecDeque::new();
    for (name, update) in &delta.updated {
        updated_actions(name, &update.old, &update.new, &mut updated);
    }
    actions.extend(updated);

    for spec in delta.added.values() {
        added_actions(spec, &mut actions);
    }

    actions
}

/// Splits actions into contiguous runs of equal scope, keeping their order.
#[must_use]
pub fn group(actions: Vec<Action>, direction: Direction) -> Vec<ActionGroup> {
    let mut groups: Vec<ActionGroup> = Vec::new();
    for action in actions {
        let scope = action.scope();
        match groups.last_mut() {
            Some(last) if last.scope == scope => last.actions.push(action),
            _ => groups.push(ActionGroup {
                scope,
                direction,
                actions: vec![action],
            }),
        }
    }
    groups
}

/// Definition used to strip auto-increment from a column that keeps existing.
fn without_auto_increment(name: &str) -> ColumnSpec {
    ColumnSpec::integer(name).unsigned().not_nullable()
}

/// The parts of a column an alter redefines.
fn alter_definition(spec: &ColumnSpec) -> ColumnSpec {
    spec.clear(&[Modifier::Primary, Modifier::ForeignKey, Modifier::Unique])
}

fn deleted_actions(name: &str, spec: &ColumnSpec, actions: &mut Vec<Action>) {
    let column = name.to_string();
    if let Some(state) = spec.primary_state() {
        if state.auto_increment {
            actions.push(Action::AlterColumn(without_auto_increment(name)));
        }
        actions.push(Action::DropPrimary {
            column: column.clone(),
        });
    }
    if spec.foreign_key.is_some() {
        actions.push(Action::DropForeign {
            column: column.clone(),
        });
    }
    if spec.unique {
        actions.push(Action::DropUnique {
            column: column.clone(),
        });
    }
    actions.push(Action::DropColumn { column });
}

fn updated_actions(name: &str, prev: &ColumnSpec, next: &ColumnSpec, list: &mut VecDeque<Action>) {
    let flags = classify(prev, next);
    let column = name.to_string();

    // Increments columns are redefined through SetAutoIncrement / PositionFirst.
    let mut alter = (flags.format_changed() && !next.is_increments())
        .then(|| Action::AlterColumn(alter_definition(next)));
    let mut additions = Vec::new();

    if flags.primary_changed {
        match (prev.primary_state(), next.primary_state()) {
            (Some(p), Some(n)) => {
                if p.auto_increment && !n.auto_increment {
                    if alter.is_none() {
                        alter = Some(Action::AlterColumn(alter_definition(next)));
                    }
                } else if !p.auto_increment && n.auto_increment {
                    additions.push(Action::SetAutoIncrement {
                        column: column.clone(),
                    });
                }
            }
            (None, Some(_)) => {
                additions.push(Action::SetPrimary {
                    column: column.clone(),
                });
                additions.push(Action::PositionFirst(next.clone()));
            }
            (Some(p), None) => {
                list.push_front(Action::DropPrimary {
                    column: column.clone(),
                });
                // Auto-increment has to go while the key still exists.
                if p.auto_increment {
                    let redefine = alter
                        .take()
                        .unwrap_or_else(|| Action::AlterColumn(alter_definition(next)));
                    list.push_front(redefine);
                }
            }
            (None, None) => {}
        }
    }

    if flags.foreign_key_changed {
        match (&prev.foreign_key, &next.foreign_key) {
            (Some(_), Some(foreign_key)) => {
                list.push_front(Action::DropForeign {
                    column: column.clone(),
                });
                additions.push(Action::SetForeign {
                    column: column.clone(),
                    foreign_key: foreign_key.clone(),
                });
            }
            (None, Some(foreign_key)) => additions.push(Action::SetForeign {
                column: column.clone(),
                foreign_key: foreign_key.clone(),
            }),
            (Some(_), None) => list.push_front(Action::DropForeign {
                column: column.clone(),
            }),
            (None, None) => {}
        }
    }

    if flags.unique_changed {
        if next.unique {
            additions.push(Action::SetUnique {
                column: column.clone(),
            });
        } else {
            list.push_front(Action::DropUnique {
                column: column.clone(),
            });
        }
    }

    if let Some(alter) = alter {
        if flags.default_changed && next.default.is_none() {
            list.push_back(Action::DropDefault { column });
        }
        list.push_back(alter);
    }
    list.extend(additions);
}

fn added_actions(spec: &ColumnSpec, actions: &mut Vec<Action>) {
    actions.push(Action::AddColumn(
        spec.clear(&[Modifier::Unique, Modifier::ForeignKey]),
    ));
    if spec.unique {
        actions.push(Action::SetUnique {
            column: spec.name.clone(),
        });
    }
    if let Some(foreign_key) = &spec.foreign_key {
        actions.push(Action::SetForeign {
            column: spec.name.clone(),
            foreign_key: foreign_key.clone(),
        });
    }
    if spec.primary {
        actions.push(Action::PositionFirst(spec.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{DefaultValue, NumericKind};
    use crate::diff::diff;
    use crate::snapshot::TableSnapshot;

    fn delta(old: &[ColumnSpec], new: &[ColumnSpec]) -> Delta {
        diff(
            &TableSnapshot::from_specs("users", old).unwrap(),
            &TableSnapshot::from_specs("users", new).unwrap(),
        )
        .unwrap()
    }

    fn drop(column: &str) -> Action {
        Action::DropColumn {
            column: column.into(),
        }
    }

    fn users() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::increments("id"),
            ColumnSpec::string("name", 100).not_nullable(),
        ]
    }

    #[test]
    fn test_add_unique_column() {
        let mut new = users();
        new.push(ColumnSpec::string("email", 50).unique());
        let compiled = compile(&delta(&users(), &new), "users");

        assert_eq!(
            compiled.forward_actions().cloned().collect::<Vec<_>>(),
            vec![
                Action::AddColumn(ColumnSpec::string("email", 50)),
                Action::SetUnique {
                    column: "email".into()
                },
            ]
        );
        assert_eq!(compiled.forward.len(), 1);
        assert_eq!(compiled.forward[0].scope, Scope::TableBlock);

        assert_eq!(
            compiled.reverse_actions().cloned().collect::<Vec<_>>(),
            vec![
                Action::DropUnique {
                    column: "email".into()
                },
                drop("email"),
            ]
        );
        assert_eq!(compiled.reverse[0].direction, Direction::Reverse);
    }

    #[test]
    fn test_constraint_removal_precedes_drop() {
        let mut old = users();
        old.push(
            ColumnSpec::integer("team_id")
                .unsigned()
                .unique()
                .references(ForeignKey::new("teams", "id")),
        );
        let actions = compile_actions(&delta(&old, &users()));

        let position = |wanted: &Action| actions.iter().position(|a| a == wanted).unwrap();
        let drop_column = position(&drop("team_id"));
        assert!(
            position(&Action::DropForeign {
                column: "team_id".into()
            }) < drop_column
        );
        assert!(
            position(&Action::DropUnique {
                column: "team_id".into()
            }) < drop_column
        );
    }

    #[test]
    fn test_drop_auto_increment_primary() {
        let actions = compile_actions(&delta(&users(), &users()[1..]));
        assert_eq!(
            actions,
            vec![
                Action::AlterColumn(ColumnSpec::integer("id").unsigned().not_nullable()),
                Action::DropPrimary {
                    column: "id".into()
                },
                drop("id"),
            ]
        );
    }

    #[test]
    fn test_section_order() {
        let old = vec![
            ColumnSpec::boolean("gone"),
            ColumnSpec::string("title", 10),
            ColumnSpec::string("nick", 30),
        ];
        let new = vec![
            ColumnSpec::string("title", 20),
            ColumnSpec::string("nickname", 30),
            ColumnSpec::integer("added"),
        ];
        let actions = compile_actions(&delta(&old, &new));
        assert_eq!(
            actions,
            vec![
                drop("gone"),
                Action::RenameColumn {
                    from: "nick".into(),
                    to: "nickname".into()
                },
                Action::AlterColumn(ColumnSpec::string("title", 20)),
                Action::AddColumn(ColumnSpec::integer("added")),
            ]
        );
    }

    #[test]
    fn test_primary_gained_repositions_first() {
        let old = vec![ColumnSpec::specific("code", NumericKind::Int, true)];
        let new = vec![ColumnSpec::specific("code", NumericKind::Int, true).primary()];
        let compiled = compile(&delta(&old, &new), "users");

        assert_eq!(compiled.forward.len(), 2);
        assert_eq!(compiled.forward[0].scope, Scope::TableBlock);
        assert_eq!(
            compiled.forward[0].actions,
            vec![Action::SetPrimary {
                column: "code".into()
            }]
        );
        assert_eq!(compiled.forward[1].scope, Scope::Standalone);
        assert_eq!(compiled.forward[1].actions, vec![Action::PositionFirst(new[0].clone())]);

        assert_eq!(
            compiled.reverse_actions().cloned().collect::<Vec<_>>(),
            vec![Action::DropPrimary {
                column: "code".into()
            }]
        );
    }

    #[test]
    fn test_auto_increment_gained_on_kept_key() {
        let old = vec![ColumnSpec::specific("id", NumericKind::Int, true).primary()];
        let new = vec![ColumnSpec::increments("id")];
        let compiled = compile(&delta(&old, &new), "users");

        assert_eq!(
            compiled.forward_actions().cloned().collect::<Vec<_>>(),
            vec![Action::SetAutoIncrement {
                column: "id".into()
            }]
        );
        // Back to a plain key: auto-increment dropped through an alter.
        assert_eq!(
            compiled.reverse_actions().cloned().collect::<Vec<_>>(),
            vec![Action::AlterColumn(ColumnSpec::specific(
                "id",
                NumericKind::Int,
                true
            ))]
        );
    }

    #[test]
    fn test_primary_lost_removes_auto_increment_first() {
        let old = vec![ColumnSpec::increments("id")];
        let new = vec![ColumnSpec::integer("id").unsigned().not_nullable()];
        let actions = compile_actions(&delta(&old, &new));
        assert_eq!(
            actions,
            vec![
                Action::AlterColumn(new[0].clone()),
                Action::DropPrimary {
                    column: "id".into()
                },
            ]
        );
    }

    #[test]
    fn test_foreign_key_recreated() {
        let old = vec![ColumnSpec::integer("team_id").references(ForeignKey::new("teams", "id"))];
        let new = vec![ColumnSpec::integer("team_id")
            .references(ForeignKey::new("teams", "id").on_delete_cascade())];
        let actions = compile_actions(&delta(&old, &new));
        assert_eq!(
            actions,
            vec![
                Action::DropForeign {
                    column: "team_id".into()
                },
                Action::SetForeign {
                    column: "team_id".into(),
                    foreign_key: ForeignKey::new("teams", "id").on_delete_cascade(),
                },
            ]
        );
    }

    #[test]
    fn test_removals_prepended_across_columns() {
        let old = vec![
            ColumnSpec::string("a", 10),
            ColumnSpec::string("b", 10).unique(),
        ];
        let new = vec![ColumnSpec::string("a", 20), ColumnSpec::string("b", 10)];
        let actions = compile_actions(&delta(&old, &new));
        assert_eq!(
            actions,
            vec![
                Action::DropUnique { column: "b".into() },
                Action::AlterColumn(ColumnSpec::string("a", 20)),
            ]
        );
    }

    #[test]
    fn test_alter_layers_full_definition() {
        let old = vec![ColumnSpec::integer("age").unique()];
        let new = vec![ColumnSpec::integer("age")
            .unique()
            .unsigned()
            .not_nullable()
            .default_to(DefaultValue::Integer(18))];
        let actions = compile_actions(&delta(&old, &new));
        assert_eq!(
            actions,
            vec![Action::AlterColumn(
                ColumnSpec::integer("age")
                    .unsigned()
                    .not_nullable()
                    .default_to(DefaultValue::Integer(18))
            )]
        );
        assert_eq!(
            actions[0].to_string(),
            "t.integer('age').unsigned().defaultTo(18).notNullable().alter()"
        );
    }

    #[test]
    fn test_default_removed() {
        let old = vec![ColumnSpec::string("role", 20).default_to(DefaultValue::Text("user".into()))];
        let new = vec![ColumnSpec::string("role", 20)];
        let compiled = compile(&delta(&old, &new), "users");
        assert_eq!(compiled.forward.len(), 2);
        assert_eq!(
            compiled.forward[0].actions,
            vec![Action::DropDefault {
                column: "role".into()
            }]
        );
        assert_eq!(
            compiled.forward[1].actions,
            vec![Action::AlterColumn(ColumnSpec::string("role", 20))]
        );
    }

    #[test]
    fn test_reverse_is_compiled_from_inverted_delta() {
        let old = vec![
            ColumnSpec::increments("id"),
            ColumnSpec::string("email", 50).unique(),
            ColumnSpec::integer("score"),
        ];
        let new = vec![
            ColumnSpec::specific("id", NumericKind::Int, true).primary(),
            ColumnSpec::string("email", 80),
            ColumnSpec::integer("points"),
            ColumnSpec::boolean("active").default_to(DefaultValue::Boolean(true)),
        ];
        let d = delta(&old, &new);
        let compiled = compile(&d, "users");
        let reverse: Vec<Action> = compiled.reverse_actions().cloned().collect();
        assert_eq!(reverse, compile_actions(&d.inverted()));
        assert!(compiled.reverse.iter().all(|g| g.direction == Direction::Reverse));
    }

    #[test]
    fn test_grouping_keeps_runs() {
        let actions = vec![
            Action::SetPrimary { column: "a".into() },
            Action::PositionFirst(ColumnSpec::integer("a").primary()),
            Action::DropDefault { column: "b".into() },
            Action::SetUnique { column: "c".into() },
        ];
        let groups = group(actions, Direction::Forward);
        let shape: Vec<(Scope, usize)> = groups.iter().map(|g| (g.scope, g.actions.len())).collect();
        assert_eq!(
            shape,
            vec![
                (Scope::TableBlock, 1),
                (Scope::Standalone, 2),
                (Scope::TableBlock, 1),
            ]
        );
    }

    #[test]
    fn test_no_changes_compile_to_nothing() {
        let compiled = compile(&delta(&users(), &users()), "users");
        assert!(compiled.is_empty());
    }

    #[test]
    fn test_action_json() {
        let action = Action::DropUnique {
            column: "email".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"action":"drop_unique","column":"email"}"#);
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
