//! Template (pattern) representation
//!
//! A pattern is a tree whose nodes are either concrete (must match a
//! subject node of the same kind, recursively), logic variables (bind to
//! any subject subtree satisfying their constraints), or wildcards. Sibling
//! lists may be governed by a sequence pattern whose mode controls how
//! strictly order and count are enforced.
//!
//! Patterns are immutable values: every edit operation returns a new
//! pattern and leaves the input untouched.

use crate::tree::{Literal, TreeNode};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Child-index path addressing a subtree inside a pattern
///
/// Sequence items count as children for addressing, and a variable's scope
/// pattern is its child 0.
pub type Path = Vec<usize>;

/// Error from a malformed edit request against a pattern
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("path {0:?} does not resolve inside the pattern")]
    Path(Path),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),
}

/// Value in a predicate: either a literal string or a regex
#[derive(Clone)]
pub enum ConstraintValue {
    Literal(String),
    Regex(String, Regex), // Pattern string + compiled regex
}

impl ConstraintValue {
    /// Compile a regex constraint value
    pub fn regex(source: &str) -> Result<Self, regex::Error> {
        Ok(ConstraintValue::Regex(
            source.to_string(),
            Regex::new(source)?,
        ))
    }

    pub fn accepts(&self, text: &str) -> bool {
        match self {
            ConstraintValue::Literal(s) => s == text,
            ConstraintValue::Regex(_, re) => re.is_match(text),
        }
    }
}

// Manual Debug implementation (compiled regexes have no useful Debug)
impl Debug for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintValue::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            ConstraintValue::Regex(pattern, _) => f.debug_tuple("Regex").field(pattern).finish(),
        }
    }
}

// Manual PartialEq implementation (compare pattern strings, not compiled regex)
impl PartialEq for ConstraintValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstraintValue::Literal(a), ConstraintValue::Literal(b)) => a == b,
            (ConstraintValue::Regex(a, _), ConstraintValue::Regex(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstraintValue {}

impl Hash for ConstraintValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ConstraintValue::Literal(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            ConstraintValue::Regex(s, _) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// Acceptance predicate attached to a pattern variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    Any,
    KindIs(ConstraintValue),
    LiteralIs(ConstraintValue),
    IsLeaf,
    HasArity(usize),
    Not(Box<Predicate>),
    AllOf(Vec<Predicate>),
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    /// Does this predicate accept the given subject node?
    pub fn accepts(&self, node: &TreeNode) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::KindIs(value) => value.accepts(node.kind()),
            Predicate::LiteralIs(value) => match node.literal() {
                Some(lit) => value.accepts(&lit.as_text()),
                None => false,
            },
            Predicate::IsLeaf => node.is_leaf(),
            Predicate::HasArity(n) => node.children().len() == *n,
            Predicate::Not(inner) => !inner.accepts(node),
            Predicate::AllOf(preds) => preds.iter().all(|p| p.accepts(node)),
            Predicate::AnyOf(preds) => preds.iter().any(|p| p.accepts(node)),
        }
    }
}

/// OR two predicates into one that accepts the union
///
/// `widen(a, b)` accepts every node that `a` or `b` accepts, flattening
/// nested `AnyOf` lists along the way.
pub fn widen(a: &Predicate, b: &Predicate) -> Predicate {
    match (a, b) {
        (Predicate::Any, _) | (_, Predicate::Any) => Predicate::Any,
        (Predicate::AnyOf(x_list), Predicate::AnyOf(y_list)) => Predicate::AnyOf(
            x_list
                .iter()
                .cloned()
                .chain(y_list.iter().cloned())
                .collect(),
        ),
        (Predicate::AnyOf(x_list), y) | (y, Predicate::AnyOf(x_list)) => {
            let y_list = std::iter::once(y.clone());
            Predicate::AnyOf(x_list.iter().cloned().chain(y_list).collect())
        }
        (x, y) => Predicate::AnyOf(vec![x.clone(), y.clone()]),
    }
}

/// How strictly a sequence pattern binds order and count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqMode {
    /// Same order, same count
    Strict,
    /// Items must occur in this relative order among possibly more subject items
    Subsequence,
    /// Count preserved, any order
    Unordered,
}

/// One item of a sequence pattern
///
/// An optional item may match zero subject elements; with every item
/// optional a strict sequence has the spec'd "optional" semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeqItem {
    pub pattern: Pattern,
    pub optional: bool,
}

impl SeqItem {
    pub fn required(pattern: Pattern) -> Self {
        Self {
            pattern,
            optional: false,
        }
    }
}

/// Governs a list of sibling statements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequencePattern {
    pub items: Vec<SeqItem>,
    pub mode: SeqMode,
}

/// Child list of a concrete pattern node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Children {
    /// Positional children, arity is structural
    Fixed(Vec<Pattern>),
    /// Sibling list governed by a sequence pattern
    Seq(SequencePattern),
}

impl Children {
    pub fn is_empty(&self) -> bool {
        match self {
            Children::Fixed(children) => children.is_empty(),
            Children::Seq(seq) => seq.items.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Children::Fixed(children) => children.len(),
            Children::Seq(seq) => seq.items.len(),
        }
    }
}

/// A template node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Must match a subject node of the same kind and literal, recursively
    Concrete {
        kind: String,
        literal: Option<Literal>,
        children: Children,
    },
    /// Binds any subject subtree consistent with the constraints; a scope
    /// pattern, if present, must itself match the bound subtree
    Variable {
        name: String,
        constraints: Vec<Predicate>,
        scope: Option<Box<Pattern>>,
    },
    /// Matches exactly one arbitrary subject node, binding nothing
    Wildcard,
}

/// Quote a concrete tree into an all-concrete pattern
///
/// The result matches exactly trees structurally equal to `node`. Children
/// of a branch are wrapped in a `Strict` sequence so ordering relaxations
/// have a site to act on.
pub fn quote(node: &TreeNode) -> Pattern {
    let children = if node.is_leaf() {
        Children::Fixed(Vec::new())
    } else {
        Children::Seq(SequencePattern {
            items: node
                .children()
                .iter()
                .map(|child| SeqItem::required(quote(child)))
                .collect(),
            mode: SeqMode::Strict,
        })
    };
    Pattern::Concrete {
        kind: node.kind().to_string(),
        literal: node.literal().cloned(),
        children,
    }
}

impl Pattern {
    /// Fresh unconstrained variable
    pub fn var(name: &str) -> Self {
        Pattern::Variable {
            name: name.to_string(),
            constraints: Vec::new(),
            scope: None,
        }
    }

    fn child(&self, index: usize) -> Option<&Pattern> {
        match self {
            Pattern::Concrete { children, .. } => match children {
                Children::Fixed(children) => children.get(index),
                Children::Seq(seq) => seq.items.get(index).map(|item| &item.pattern),
            },
            Pattern::Variable { scope, .. } => {
                if index == 0 {
                    scope.as_deref()
                } else {
                    None
                }
            }
            Pattern::Wildcard => None,
        }
    }

    /// Resolve a child-index path inside this pattern
    pub fn at(&self, path: &[usize]) -> Option<&Pattern> {
        let mut current = self;
        for &index in path {
            current = current.child(index)?;
        }
        Some(current)
    }

    /// Replace the subtree at `path` with `replacement`
    pub fn replace_at(&self, path: &[usize], replacement: Pattern) -> Result<Pattern, PatternError> {
        fn go(pattern: &Pattern, rest: &[usize], replacement: Pattern) -> Option<Pattern> {
            let Some((&index, rest)) = rest.split_first() else {
                return Some(replacement);
            };
            match pattern {
                Pattern::Concrete {
                    kind,
                    literal,
                    children,
                } => {
                    let children = match children {
                        Children::Fixed(list) => {
                            let new = go(list.get(index)?, rest, replacement)?;
                            let mut list = list.clone();
                            list[index] = new;
                            Children::Fixed(list)
                        }
                        Children::Seq(seq) => {
                            let item = seq.items.get(index)?;
                            let new = go(&item.pattern, rest, replacement)?;
                            let mut items = seq.items.clone();
                            items[index] = SeqItem {
                                pattern: new,
                                optional: item.optional,
                            };
                            Children::Seq(SequencePattern {
                                items,
                                mode: seq.mode,
                            })
                        }
                    };
                    Some(Pattern::Concrete {
                        kind: kind.clone(),
                        literal: literal.clone(),
                        children,
                    })
                }
                Pattern::Variable {
                    name,
                    constraints,
                    scope,
                } => {
                    if index != 0 {
                        return None;
                    }
                    let new = go(scope.as_deref()?, rest, replacement)?;
                    Some(Pattern::Variable {
                        name: name.clone(),
                        constraints: constraints.clone(),
                        scope: Some(Box::new(new)),
                    })
                }
                Pattern::Wildcard => None,
            }
        }
        go(self, path, replacement).ok_or_else(|| PatternError::Path(path.to_vec()))
    }

    /// Replace the subtree at `path` with a fresh unconstrained variable
    pub fn generalize_at(&self, path: &[usize], name: &str) -> Result<Pattern, PatternError> {
        self.replace_at(path, Pattern::var(name))
    }

    /// Attach an additional constraint to an existing variable
    pub fn bind_constraint(
        &self,
        name: &str,
        predicate: Predicate,
    ) -> Result<Pattern, PatternError> {
        let mut hits = 0;
        let rewritten = self.map_constraints(
            name,
            &|constraints| {
                let mut constraints = constraints.to_vec();
                constraints.push(predicate.clone());
                constraints
            },
            &mut hits,
        );
        if hits == 0 {
            Err(PatternError::UnknownVariable(name.to_string()))
        } else {
            Ok(rewritten)
        }
    }

    /// Rewrite the constraint lists of every occurrence of one variable
    pub(crate) fn map_constraints(
        &self,
        name: &str,
        f: &dyn Fn(&[Predicate]) -> Vec<Predicate>,
        hits: &mut usize,
    ) -> Pattern {
        match self {
            Pattern::Concrete {
                kind,
                literal,
                children,
            } => {
                let children = match children {
                    Children::Fixed(list) => Children::Fixed(
                        list.iter()
                            .map(|child| child.map_constraints(name, f, hits))
                            .collect(),
                    ),
                    Children::Seq(seq) => Children::Seq(SequencePattern {
                        items: seq
                            .items
                            .iter()
                            .map(|item| SeqItem {
                                pattern: item.pattern.map_constraints(name, f, hits),
                                optional: item.optional,
                            })
                            .collect(),
                        mode: seq.mode,
                    }),
                };
                Pattern::Concrete {
                    kind: kind.clone(),
                    literal: literal.clone(),
                    children,
                }
            }
            Pattern::Variable {
                name: var_name,
                constraints,
                scope,
            } => {
                let scope = scope
                    .as_ref()
                    .map(|inner| Box::new(inner.map_constraints(name, f, hits)));
                let constraints = if var_name == name {
                    *hits += 1;
                    f(constraints)
                } else {
                    constraints.clone()
                };
                Pattern::Variable {
                    name: var_name.clone(),
                    constraints,
                    scope,
                }
            }
            Pattern::Wildcard => Pattern::Wildcard,
        }
    }

    /// Variable names in first-occurrence (pre-order) order
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Pattern::Concrete { children, .. } => match children {
                Children::Fixed(list) => {
                    for child in list {
                        child.collect_variables(names);
                    }
                }
                Children::Seq(seq) => {
                    for item in &seq.items {
                        item.pattern.collect_variables(names);
                    }
                }
            },
            Pattern::Variable { name, scope, .. } => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
                if let Some(inner) = scope {
                    inner.collect_variables(names);
                }
            }
            Pattern::Wildcard => {}
        }
    }

    /// Rename variables according to `mapping`; unmapped names are kept
    pub fn rename(&self, mapping: &FxHashMap<String, String>) -> Pattern {
        match self {
            Pattern::Concrete {
                kind,
                literal,
                children,
            } => {
                let children = match children {
                    Children::Fixed(list) => {
                        Children::Fixed(list.iter().map(|child| child.rename(mapping)).collect())
                    }
                    Children::Seq(seq) => Children::Seq(SequencePattern {
                        items: seq
                            .items
                            .iter()
                            .map(|item| SeqItem {
                                pattern: item.pattern.rename(mapping),
                                optional: item.optional,
                            })
                            .collect(),
                        mode: seq.mode,
                    }),
                };
                Pattern::Concrete {
                    kind: kind.clone(),
                    literal: literal.clone(),
                    children,
                }
            }
            Pattern::Variable {
                name,
                constraints,
                scope,
            } => Pattern::Variable {
                name: mapping.get(name).cloned().unwrap_or_else(|| name.clone()),
                constraints: constraints.clone(),
                scope: scope.as_ref().map(|inner| Box::new(inner.rename(mapping))),
            },
            Pattern::Wildcard => Pattern::Wildcard,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Concrete {
                kind,
                literal,
                children,
            } => {
                write!(f, "{}", kind)?;
                if let Some(lit) = literal {
                    write!(f, "={}", lit)?;
                }
                match children {
                    Children::Fixed(list) if list.is_empty() => Ok(()),
                    Children::Fixed(list) => {
                        write!(f, "(")?;
                        for (i, child) in list.iter().enumerate() {
                            if i > 0 {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", child)?;
                        }
                        write!(f, ")")
                    }
                    Children::Seq(seq) => {
                        let (open, close) = match seq.mode {
                            SeqMode::Strict => ("[", "]"),
                            SeqMode::Subsequence => ("[..", "..]"),
                            SeqMode::Unordered => ("{", "}"),
                        };
                        write!(f, "{}", open)?;
                        for (i, item) in seq.items.iter().enumerate() {
                            if i > 0 {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", item.pattern)?;
                            if item.optional {
                                write!(f, "?")?;
                            }
                        }
                        write!(f, "{}", close)
                    }
                }
            }
            Pattern::Variable { name, scope, .. } => {
                write!(f, "?{}", name)?;
                if let Some(inner) = scope {
                    write!(f, "@{}", inner)?;
                }
                Ok(())
            }
            Pattern::Wildcard => write!(f, "_"),
        }
    }
}
