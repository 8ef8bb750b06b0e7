//! Relaxation operator catalog
//!
//! Pure `Pattern -> Pattern` generalizations. Operators preserve the
//! monotonicity contract: the relaxed pattern matches a superset of the
//! subjects the input pattern matched, over any corpus. The one exception
//! is `AllowExtras` applied to an `Unordered` sequence, which reinstates
//! ordering constraints; `enumerate_ops` never emits that instance, so the
//! search engine can rely on the contract to prune whole branches of the
//! generalization lattice.

use crate::pattern::{Children, Path, Pattern, Predicate, SeqItem, SeqMode, SequencePattern, widen};
use thiserror::Error;

/// Error from an operator that is inapplicable at the requested location
///
/// The input pattern is never modified; on error the caller still holds it
/// unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperatorError {
    #[error("path {0:?} does not resolve inside the pattern")]
    BadPath(Path),

    #[error("no concrete literal leaf at {0:?}")]
    NotALiteral(Path),

    #[error("no sequence at {0:?}")]
    NotASequence(Path),

    #[error("ordering at {0:?} is not present or already relaxed")]
    AlreadyRelaxed(Path),

    #[error("sequence at {path:?} has no item {item}")]
    NoSuchItem { path: Path, item: usize },

    #[error("item {item} of sequence at {path:?} is already optional")]
    AlreadyOptional { path: Path, item: usize },

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("group has no snippet {0}")]
    NoSuchSnippet(usize),
}

/// One generalization step over a pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelaxOp {
    /// Replace a concrete literal leaf with a fresh variable
    GeneralizeLiteral { path: Path, var: String },
    /// Change a sequence's mode from `Strict` to `Unordered`
    RelaxOrder { path: Path },
    /// Change a sequence's mode from `Strict`/`Unordered` to `Subsequence`
    AllowExtras { path: Path },
    /// Mark one item of a sequence as individually optional
    MakeOptional { path: Path, item: usize },
    /// OR a new acceptance predicate into a variable's constraints
    WidenConstraint { var: String, predicate: Predicate },
}

impl RelaxOp {
    /// Apply this operator, returning the generalized pattern
    pub fn apply(&self, pattern: &Pattern) -> Result<Pattern, OperatorError> {
        match self {
            RelaxOp::GeneralizeLiteral { path, var } => {
                match pattern.at(path) {
                    Some(Pattern::Concrete {
                        literal: Some(_),
                        children,
                        ..
                    }) if children.is_empty() => {}
                    Some(_) => return Err(OperatorError::NotALiteral(path.clone())),
                    None => return Err(OperatorError::BadPath(path.clone())),
                }
                pattern
                    .replace_at(path, Pattern::var(var))
                    .map_err(|_| OperatorError::BadPath(path.clone()))
            }

            RelaxOp::RelaxOrder { path } => {
                replace_sequence(pattern, path, |seq| match seq.mode {
                    SeqMode::Strict => Ok(SequencePattern {
                        items: seq.items.clone(),
                        mode: SeqMode::Unordered,
                    }),
                    _ => Err(OperatorError::AlreadyRelaxed(path.clone())),
                })
            }

            RelaxOp::AllowExtras { path } => {
                replace_sequence(pattern, path, |seq| match seq.mode {
                    SeqMode::Strict | SeqMode::Unordered => Ok(SequencePattern {
                        items: seq.items.clone(),
                        mode: SeqMode::Subsequence,
                    }),
                    SeqMode::Subsequence => Err(OperatorError::AlreadyRelaxed(path.clone())),
                })
            }

            RelaxOp::MakeOptional { path, item } => {
                replace_sequence(pattern, path, |seq| {
                    let Some(existing) = seq.items.get(*item) else {
                        return Err(OperatorError::NoSuchItem {
                            path: path.clone(),
                            item: *item,
                        });
                    };
                    if existing.optional {
                        return Err(OperatorError::AlreadyOptional {
                            path: path.clone(),
                            item: *item,
                        });
                    }
                    let mut items = seq.items.clone();
                    items[*item] = SeqItem {
                        pattern: existing.pattern.clone(),
                        optional: true,
                    };
                    Ok(SequencePattern {
                        items,
                        mode: seq.mode,
                    })
                })
            }

            RelaxOp::WidenConstraint { var, predicate } => {
                let mut hits = 0;
                // (p1 AND p2) OR q distributes to (p1 OR q) AND (p2 OR q),
                // so widening each conjunct widens the whole list
                let widened = pattern.map_constraints(
                    var,
                    &|constraints| constraints.iter().map(|c| widen(c, predicate)).collect(),
                    &mut hits,
                );
                if hits == 0 {
                    Err(OperatorError::UnknownVariable(var.clone()))
                } else {
                    Ok(widened)
                }
            }
        }
    }
}

/// Rewrite the sequence at `path` through `f`, rebuilding the pattern
fn replace_sequence(
    pattern: &Pattern,
    path: &Path,
    f: impl FnOnce(&SequencePattern) -> Result<SequencePattern, OperatorError>,
) -> Result<Pattern, OperatorError> {
    let target = pattern
        .at(path)
        .ok_or_else(|| OperatorError::BadPath(path.clone()))?;
    let (kind, literal, seq) = match target {
        Pattern::Concrete {
            kind,
            literal,
            children: Children::Seq(seq),
        } => (kind, literal, seq),
        _ => return Err(OperatorError::NotASequence(path.clone())),
    };
    let replacement = Pattern::Concrete {
        kind: kind.clone(),
        literal: literal.clone(),
        children: Children::Seq(f(seq)?),
    };
    pattern
        .replace_at(path, replacement)
        .map_err(|_| OperatorError::BadPath(path.clone()))
}

/// Source of fresh variable names for generated generalizations
///
/// Generated names are prefixed so they cannot collide with user-written
/// variable names.
#[derive(Debug, Clone, Default)]
pub struct FreshNames {
    counter: usize,
}

impl FreshNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&mut self) -> String {
        self.counter += 1;
        format!("_g{}", self.counter)
    }
}

/// Every operator instance applicable at every structurally valid location
///
/// This is the search engine's branching rule. `WidenConstraint` is not
/// enumerated: its predicate argument has no finite instance set, so it is
/// only available to callers that supply one.
pub fn enumerate_ops(pattern: &Pattern, names: &mut FreshNames) -> Vec<RelaxOp> {
    let mut ops = Vec::new();
    collect_ops(pattern, &mut Vec::new(), &mut ops, names);
    ops
}

fn collect_ops(
    pattern: &Pattern,
    path: &mut Path,
    ops: &mut Vec<RelaxOp>,
    names: &mut FreshNames,
) {
    match pattern {
        Pattern::Concrete {
            literal, children, ..
        } => {
            if literal.is_some() && children.is_empty() {
                ops.push(RelaxOp::GeneralizeLiteral {
                    path: path.clone(),
                    var: names.next_name(),
                });
            }
            match children {
                Children::Fixed(list) => {
                    for (index, child) in list.iter().enumerate() {
                        path.push(index);
                        collect_ops(child, path, ops, names);
                        path.pop();
                    }
                }
                Children::Seq(seq) => {
                    if seq.mode == SeqMode::Strict && seq.items.len() > 1 {
                        ops.push(RelaxOp::RelaxOrder { path: path.clone() });
                    }
                    // Only the Strict instance is monotone; from Unordered
                    // the switch would reinstate ordering constraints
                    if seq.mode == SeqMode::Strict && !seq.items.is_empty() {
                        ops.push(RelaxOp::AllowExtras { path: path.clone() });
                    }
                    for (index, item) in seq.items.iter().enumerate() {
                        if !item.optional {
                            ops.push(RelaxOp::MakeOptional {
                                path: path.clone(),
                                item: index,
                            });
                        }
                    }
                    for (index, item) in seq.items.iter().enumerate() {
                        path.push(index);
                        collect_ops(&item.pattern, path, ops, names);
                        path.pop();
                    }
                }
            }
        }
        Pattern::Variable { scope, .. } => {
            if let Some(inner) = scope {
                path.push(0);
                collect_ops(inner, path, ops, names);
                path.pop();
            }
        }
        Pattern::Wildcard => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::matches;
    use crate::pattern::{ConstraintValue, quote};
    use crate::tree::{Literal, TreeNode};

    fn call(name: &str) -> TreeNode {
        TreeNode::branch(
            "method-call",
            vec![TreeNode::literal_leaf(
                "identifier",
                Literal::Ident(name.to_string()),
            )],
        )
    }

    fn body(calls: &[&str]) -> TreeNode {
        TreeNode::branch("body", calls.iter().map(|name| call(name)).collect())
    }

    #[test]
    fn test_relax_order_monotone() {
        let pattern = quote(&body(&["m", "c"]));
        assert!(matches(&pattern, &body(&["m", "c"])));
        assert!(!matches(&pattern, &body(&["c", "m"])));

        let relaxed = RelaxOp::RelaxOrder { path: vec![] }.apply(&pattern).unwrap();
        // Everything matched before is still matched, plus the permutation
        assert!(matches(&relaxed, &body(&["m", "c"])));
        assert!(matches(&relaxed, &body(&["c", "m"])));

        // A second relaxation of the same ordering is inapplicable
        assert_eq!(
            RelaxOp::RelaxOrder { path: vec![] }.apply(&relaxed),
            Err(OperatorError::AlreadyRelaxed(vec![]))
        );
    }

    #[test]
    fn test_allow_extras_monotone() {
        let pattern = quote(&body(&["m", "c"]));
        let relaxed = RelaxOp::AllowExtras { path: vec![] }.apply(&pattern).unwrap();

        assert!(matches(&relaxed, &body(&["m", "c"])));
        assert!(matches(&relaxed, &body(&["m", "d", "c", "d", "e"])));
        assert!(!matches(&relaxed, &body(&["c", "m"])));
    }

    #[test]
    fn test_generalize_literal_monotone() {
        let pattern = quote(&call("m"));
        let op = RelaxOp::GeneralizeLiteral {
            path: vec![0],
            var: "_g1".to_string(),
        };
        let relaxed = op.apply(&pattern).unwrap();

        assert!(matches(&relaxed, &call("m")));
        assert!(matches(&relaxed, &call("x")));
        assert!(!matches(&relaxed, &TreeNode::leaf("if-statement")));

        // Not applicable to an interior node
        assert_eq!(
            RelaxOp::GeneralizeLiteral {
                path: vec![],
                var: "_g2".to_string(),
            }
            .apply(&pattern),
            Err(OperatorError::NotALiteral(vec![]))
        );
    }

    #[test]
    fn test_make_optional_monotone() {
        let pattern = quote(&body(&["m", "c"]));
        let op = RelaxOp::MakeOptional {
            path: vec![],
            item: 1,
        };
        let relaxed = op.apply(&pattern).unwrap();

        assert!(matches(&relaxed, &body(&["m", "c"])));
        assert!(matches(&relaxed, &body(&["m"])));

        assert_eq!(
            op.apply(&relaxed),
            Err(OperatorError::AlreadyOptional {
                path: vec![],
                item: 1
            })
        );
        assert_eq!(
            RelaxOp::MakeOptional {
                path: vec![],
                item: 7
            }
            .apply(&pattern),
            Err(OperatorError::NoSuchItem {
                path: vec![],
                item: 7
            })
        );
    }

    #[test]
    fn test_widen_constraint_monotone() {
        let pattern = Pattern::var("stmt")
            .bind_constraint(
                "stmt",
                Predicate::KindIs(ConstraintValue::Literal("if-statement".to_string())),
            )
            .unwrap();
        assert!(!matches(&pattern, &TreeNode::leaf("while-statement")));

        let widened = RelaxOp::WidenConstraint {
            var: "stmt".to_string(),
            predicate: Predicate::KindIs(ConstraintValue::Literal("while-statement".to_string())),
        }
        .apply(&pattern)
        .unwrap();

        assert!(matches(&widened, &TreeNode::leaf("if-statement")));
        assert!(matches(&widened, &TreeNode::leaf("while-statement")));
        assert!(!matches(&widened, &TreeNode::leaf("for-statement")));

        assert_eq!(
            RelaxOp::WidenConstraint {
                var: "nope".to_string(),
                predicate: Predicate::Any,
            }
            .apply(&pattern),
            Err(OperatorError::UnknownVariable("nope".to_string()))
        );
    }

    #[test]
    fn test_enumerate_ops_sites() {
        let pattern = quote(&body(&["m", "c"]));
        let ops = enumerate_ops(&pattern, &mut FreshNames::new());

        // Root sequence: relax order, allow extras, two make-optional
        assert!(ops.contains(&RelaxOp::RelaxOrder { path: vec![] }));
        assert!(ops.contains(&RelaxOp::AllowExtras { path: vec![] }));
        assert!(ops.contains(&RelaxOp::MakeOptional {
            path: vec![],
            item: 0
        }));
        // Two literal leaves, each with a distinct fresh name
        let literal_ops: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, RelaxOp::GeneralizeLiteral { .. }))
            .collect();
        assert_eq!(literal_ops.len(), 2);
        // No widen ops are generated without a predicate source
        assert!(
            !ops.iter()
                .any(|op| matches!(op, RelaxOp::WidenConstraint { .. }))
        );
    }
}
