//! Persisted template-group representation
//!
//! The external persistence collaborator stores groups as a structured
//! record; this module converts between the runtime types and that record.
//! The record mirrors the runtime shapes rather than serializing them
//! directly so the wire format is independent of in-memory details (and so
//! compiled regexes never reach the wire; they are recompiled on load).
//!
//! The one obligation here is the round-trip law:
//! `from_persistable(&to_persistable(g)) == g` for every group `g`.

use crate::group::{Combinator, ConjunctionScope, Snippet, TemplateGroup};
use crate::pattern::{
    Children, ConstraintValue, Pattern, Predicate, SeqItem, SeqMode, SequencePattern,
};
use crate::tree::Literal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("invalid stored regex {pattern:?}")]
    BadRegex {
        pattern: String,
        #[source]
        error: regex::Error,
    },
}

/// Stored form of a template group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedGroup {
    pub name: String,
    pub combinator: PersistedCombinator,
    pub scope: PersistedScope,
    pub snippets: Vec<PersistedSnippet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedCombinator {
    Conjunctive,
    Disjunctive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedScope {
    SharedBindings,
    Colocated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnippet {
    pub pattern: PersistedPattern,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

/// Tree-shaped pattern encoding with variable markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum PersistedPattern {
    Concrete {
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<PersistedLiteral>,
        children: PersistedChildren,
    },
    Variable {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        constraints: Vec<PersistedPredicate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<Box<PersistedPattern>>,
    },
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedLiteral {
    Ident(String),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedChildren {
    Fixed(Vec<PersistedPattern>),
    Seq {
        items: Vec<PersistedItem>,
        mode: PersistedMode,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedItem {
    pub pattern: PersistedPattern,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedMode {
    Strict,
    Subsequence,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedPredicate {
    Any,
    KindIs(PersistedValue),
    LiteralIs(PersistedValue),
    IsLeaf,
    HasArity(usize),
    Not(Box<PersistedPredicate>),
    AllOf(Vec<PersistedPredicate>),
    AnyOf(Vec<PersistedPredicate>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedValue {
    Literal(String),
    Regex(String),
}

/// Convert a group into its stored form
pub fn to_persistable(group: &TemplateGroup) -> PersistedGroup {
    PersistedGroup {
        name: group.name().to_string(),
        combinator: match group.combinator() {
            Combinator::Conjunctive => PersistedCombinator::Conjunctive,
            Combinator::Disjunctive => PersistedCombinator::Disjunctive,
        },
        scope: match group.scope() {
            ConjunctionScope::SharedBindings => PersistedScope::SharedBindings,
            ConjunctionScope::Colocated => PersistedScope::Colocated,
        },
        snippets: group.snippets().map(snippet_to_persistable).collect(),
    }
}

/// Rebuild a group from its stored form
pub fn from_persistable(stored: &PersistedGroup) -> Result<TemplateGroup, PersistError> {
    let mut group = TemplateGroup::new(&stored.name)
        .with_combinator(match stored.combinator {
            PersistedCombinator::Conjunctive => Combinator::Conjunctive,
            PersistedCombinator::Disjunctive => Combinator::Disjunctive,
        })
        .with_scope(match stored.scope {
            PersistedScope::SharedBindings => ConjunctionScope::SharedBindings,
            PersistedScope::Colocated => ConjunctionScope::Colocated,
        });
    for snippet in &stored.snippets {
        group = group.add_snippet(pattern_from(&snippet.pattern)?, snippet.conditions.clone());
    }
    Ok(group)
}

fn snippet_to_persistable(snippet: &Snippet) -> PersistedSnippet {
    PersistedSnippet {
        pattern: pattern_to(&snippet.pattern),
        conditions: snippet.conditions.clone(),
    }
}

fn pattern_to(pattern: &Pattern) -> PersistedPattern {
    match pattern {
        Pattern::Concrete {
            kind,
            literal,
            children,
        } => PersistedPattern::Concrete {
            kind: kind.clone(),
            literal: literal.as_ref().map(|lit| match lit {
                Literal::Ident(s) => PersistedLiteral::Ident(s.clone()),
                Literal::Int(n) => PersistedLiteral::Int(*n),
                Literal::Str(s) => PersistedLiteral::Str(s.clone()),
            }),
            children: match children {
                Children::Fixed(list) => {
                    PersistedChildren::Fixed(list.iter().map(pattern_to).collect())
                }
                Children::Seq(seq) => PersistedChildren::Seq {
                    items: seq
                        .items
                        .iter()
                        .map(|item| PersistedItem {
                            pattern: pattern_to(&item.pattern),
                            optional: item.optional,
                        })
                        .collect(),
                    mode: match seq.mode {
                        SeqMode::Strict => PersistedMode::Strict,
                        SeqMode::Subsequence => PersistedMode::Subsequence,
                        SeqMode::Unordered => PersistedMode::Unordered,
                    },
                },
            },
        },
        Pattern::Variable {
            name,
            constraints,
            scope,
        } => PersistedPattern::Variable {
            name: name.clone(),
            constraints: constraints.iter().map(predicate_to).collect(),
            scope: scope.as_ref().map(|inner| Box::new(pattern_to(inner))),
        },
        Pattern::Wildcard => PersistedPattern::Wildcard,
    }
}

fn predicate_to(predicate: &Predicate) -> PersistedPredicate {
    match predicate {
        Predicate::Any => PersistedPredicate::Any,
        Predicate::KindIs(value) => PersistedPredicate::KindIs(value_to(value)),
        Predicate::LiteralIs(value) => PersistedPredicate::LiteralIs(value_to(value)),
        Predicate::IsLeaf => PersistedPredicate::IsLeaf,
        Predicate::HasArity(n) => PersistedPredicate::HasArity(*n),
        Predicate::Not(inner) => PersistedPredicate::Not(Box::new(predicate_to(inner))),
        Predicate::AllOf(list) => PersistedPredicate::AllOf(list.iter().map(predicate_to).collect()),
        Predicate::AnyOf(list) => PersistedPredicate::AnyOf(list.iter().map(predicate_to).collect()),
    }
}

fn value_to(value: &ConstraintValue) -> PersistedValue {
    match value {
        ConstraintValue::Literal(s) => PersistedValue::Literal(s.clone()),
        ConstraintValue::Regex(source, _) => PersistedValue::Regex(source.clone()),
    }
}

fn pattern_from(stored: &PersistedPattern) -> Result<Pattern, PersistError> {
    Ok(match stored {
        PersistedPattern::Concrete {
            kind,
            literal,
            children,
        } => Pattern::Concrete {
            kind: kind.clone(),
            literal: literal.as_ref().map(|lit| match lit {
                PersistedLiteral::Ident(s) => Literal::Ident(s.clone()),
                PersistedLiteral::Int(n) => Literal::Int(*n),
                PersistedLiteral::Str(s) => Literal::Str(s.clone()),
            }),
            children: match children {
                PersistedChildren::Fixed(list) => Children::Fixed(
                    list.iter()
                        .map(pattern_from)
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                PersistedChildren::Seq { items, mode } => Children::Seq(SequencePattern {
                    items: items
                        .iter()
                        .map(|item| {
                            Ok(SeqItem {
                                pattern: pattern_from(&item.pattern)?,
                                optional: item.optional,
                            })
                        })
                        .collect::<Result<Vec<_>, PersistError>>()?,
                    mode: match mode {
                        PersistedMode::Strict => SeqMode::Strict,
                        PersistedMode::Subsequence => SeqMode::Subsequence,
                        PersistedMode::Unordered => SeqMode::Unordered,
                    },
                }),
            },
        },
        PersistedPattern::Variable {
            name,
            constraints,
            scope,
        } => Pattern::Variable {
            name: name.clone(),
            constraints: constraints
                .iter()
                .map(predicate_from)
                .collect::<Result<Vec<_>, _>>()?,
            scope: match scope {
                Some(inner) => Some(Box::new(pattern_from(inner)?)),
                None => None,
            },
        },
        PersistedPattern::Wildcard => Pattern::Wildcard,
    })
}

fn predicate_from(stored: &PersistedPredicate) -> Result<Predicate, PersistError> {
    Ok(match stored {
        PersistedPredicate::Any => Predicate::Any,
        PersistedPredicate::KindIs(value) => Predicate::KindIs(value_from(value)?),
        PersistedPredicate::LiteralIs(value) => Predicate::LiteralIs(value_from(value)?),
        PersistedPredicate::IsLeaf => Predicate::IsLeaf,
        PersistedPredicate::HasArity(n) => Predicate::HasArity(*n),
        PersistedPredicate::Not(inner) => Predicate::Not(Box::new(predicate_from(inner)?)),
        PersistedPredicate::AllOf(list) => Predicate::AllOf(
            list.iter()
                .map(predicate_from)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        PersistedPredicate::AnyOf(list) => Predicate::AnyOf(
            list.iter()
                .map(predicate_from)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

fn value_from(stored: &PersistedValue) -> Result<ConstraintValue, PersistError> {
    match stored {
        PersistedValue::Literal(s) => Ok(ConstraintValue::Literal(s.clone())),
        PersistedValue::Regex(source) => {
            ConstraintValue::regex(source).map_err(|error| PersistError::BadRegex {
                pattern: source.clone(),
                error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::quote;
    use crate::tree::TreeNode;
    use pretty_assertions::assert_eq;

    fn sample_group() -> TemplateGroup {
        let call = TreeNode::branch(
            "method-call",
            vec![TreeNode::literal_leaf(
                "identifier",
                Literal::Ident("m".to_string()),
            )],
        );
        let first = quote(&call)
            .generalize_at(&[0], "name")
            .unwrap()
            .bind_constraint(
                "name",
                Predicate::LiteralIs(ConstraintValue::regex("^set[A-Z]").unwrap()),
            )
            .unwrap();
        let second = Pattern::Concrete {
            kind: "body".to_string(),
            literal: None,
            children: Children::Seq(SequencePattern {
                items: vec![
                    SeqItem {
                        pattern: Pattern::Wildcard,
                        optional: true,
                    },
                    SeqItem::required(Pattern::var("stmt")),
                ],
                mode: SeqMode::Subsequence,
            }),
        };
        TemplateGroup::new("setter-calls")
            .with_combinator(Combinator::Disjunctive)
            .with_scope(ConjunctionScope::Colocated)
            .add_snippet(first, vec!["name notEmpty".to_string()])
            .add_snippet(second, Vec::new())
    }

    #[test]
    fn test_round_trip_structural_equality() {
        let group = sample_group();
        let restored = from_persistable(&to_persistable(&group)).unwrap();
        assert_eq!(restored, group);
    }

    #[test]
    fn test_round_trip_through_json() {
        let group = sample_group();
        let json = serde_json::to_string_pretty(&to_persistable(&group)).unwrap();
        let parsed: PersistedGroup = serde_json::from_str(&json).unwrap();
        let restored = from_persistable(&parsed).unwrap();
        assert_eq!(restored, group);
    }

    #[test]
    fn test_record_shape() {
        let stored = to_persistable(&sample_group());
        let json = serde_json::to_value(&stored).unwrap();

        assert_eq!(json["name"], "setter-calls");
        assert_eq!(json["snippets"][0]["conditions"][0], "name notEmpty");
        // Variable markers are explicit in the tree encoding
        assert_eq!(json["snippets"][0]["pattern"]["node"], "concrete");
    }

    #[test]
    fn test_bad_stored_regex_is_an_error() {
        let mut stored = to_persistable(&sample_group());
        if let PersistedPattern::Concrete { children, .. } = &mut stored.snippets[0].pattern
            && let PersistedChildren::Seq { items, .. } = children
            && let PersistedPattern::Variable { constraints, .. } = &mut items[0].pattern
        {
            constraints[0] = PersistedPredicate::LiteralIs(PersistedValue::Regex("[".to_string()));
        }

        assert!(matches!(
            from_persistable(&stored),
            Err(PersistError::BadRegex { .. })
        ));
    }
}
