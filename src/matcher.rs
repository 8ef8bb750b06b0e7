//! Unification-based matching engine
//!
//! Matches a pattern against a subject tree, producing a lazy, restartable
//! sequence of variable bindings. Backtracking is expressed as an explicit
//! stack of alternative machine states rather than coroutine suspension: a
//! state is a goal list plus the bindings accumulated so far, and popping a
//! state resolves its first goal into zero or more successor states. A
//! caller may stop consuming the sequence at any point; nothing past the
//! solutions actually requested is ever computed.
//!
//! A unification step that does not hold is not an error. It silently
//! prunes that branch of the search and is invisible to the caller except
//! as the absence of a binding from the result sequence.

use crate::pattern::{Children, Pattern, SeqItem, SeqMode};
use crate::tree::TreeNode;
use rustc_hash::FxHashMap;

/// One consistent assignment of subject subtrees to a pattern's variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding(FxHashMap<String, TreeNode>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subtree bound to a variable, if any
    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (variable, subtree) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.0.iter().map(|(name, node)| (name.as_str(), node))
    }

    fn bind(&mut self, name: &str, node: TreeNode) {
        self.0.insert(name.to_string(), node);
    }

    /// Do two bindings agree on every shared variable?
    pub fn agrees_with(&self, other: &Binding) -> bool {
        self.0
            .iter()
            .all(|(name, node)| other.0.get(name).is_none_or(|theirs| theirs == node))
    }

    /// Union of two bindings, or `None` if they disagree on a shared variable
    pub fn merged(&self, other: &Binding) -> Option<Binding> {
        if !self.agrees_with(other) {
            return None;
        }
        let mut merged = self.clone();
        for (name, node) in &other.0 {
            merged.0.insert(name.clone(), node.clone());
        }
        Some(merged)
    }

    /// Substitute bound subtrees back into a pattern, rebuilding a tree
    ///
    /// Returns `None` if the pattern still contains an unbound variable, a
    /// wildcard, an optional item, or a non-strict sequence; those have no
    /// single concrete reading.
    pub fn substitute(&self, pattern: &Pattern) -> Option<TreeNode> {
        match pattern {
            Pattern::Concrete {
                kind,
                literal,
                children,
            } => {
                let child_nodes: Vec<TreeNode> = match children {
                    Children::Fixed(list) => list
                        .iter()
                        .map(|child| self.substitute(child))
                        .collect::<Option<_>>()?,
                    Children::Seq(seq) => {
                        if seq.mode != SeqMode::Strict {
                            return None;
                        }
                        let mut nodes = Vec::with_capacity(seq.items.len());
                        for item in &seq.items {
                            if item.optional {
                                return None;
                            }
                            nodes.push(self.substitute(&item.pattern)?);
                        }
                        nodes
                    }
                };
                Some(if child_nodes.is_empty() {
                    match literal {
                        Some(lit) => TreeNode::literal_leaf(kind, lit.clone()),
                        None => TreeNode::leaf(kind),
                    }
                } else {
                    TreeNode::branch(kind, child_nodes)
                })
            }
            Pattern::Variable { name, .. } => self.get(name).cloned(),
            Pattern::Wildcard => None,
        }
    }
}

/// A pending obligation within one machine state
#[derive(Debug, Clone)]
enum Goal<'a> {
    /// Unify one pattern node against one subject node
    Node(&'a Pattern, &'a TreeNode),
    /// Lockstep walk: items and subjects consumed together
    Strict {
        items: &'a [SeqItem],
        subjects: &'a [TreeNode],
    },
    /// Order-preserving injection of items into subject positions
    Subsequence {
        items: &'a [SeqItem],
        subjects: &'a [TreeNode],
    },
    /// Bijection between items and the remaining subject positions
    Unordered {
        items: &'a [SeqItem],
        remaining: Vec<&'a TreeNode>,
    },
}

/// One alternative in the backtracking search
#[derive(Debug, Clone)]
struct State<'a> {
    /// Pending goals; the top of the stack is resolved next
    goals: Vec<Goal<'a>>,
    binding: Binding,
}

/// Lazy iterator over all solutions of `match_pattern`
pub struct Matches<'a> {
    stack: Vec<State<'a>>,
}

/// Unify `pattern` against `subject`, enumerating every solution
///
/// Solutions come out in a deterministic depth-first order; for sequence
/// patterns, assignments are enumerated leftmost-first. The iterator is
/// lazy: consuming a finite prefix never computes the rest.
pub fn match_pattern<'a>(pattern: &'a Pattern, subject: &'a TreeNode) -> Matches<'a> {
    Matches {
        stack: vec![State {
            goals: vec![Goal::Node(pattern, subject)],
            binding: Binding::new(),
        }],
    }
}

/// Does `pattern` match `subject` at all?
///
/// Only the first solution is computed.
pub fn matches(pattern: &Pattern, subject: &TreeNode) -> bool {
    match_pattern(pattern, subject).next().is_some()
}

impl<'a> Iterator for Matches<'a> {
    type Item = Binding;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(mut state) = self.stack.pop() {
            match state.goals.pop() {
                None => return Some(state.binding),
                Some(goal) => self.resolve(goal, state),
            }
        }
        None
    }
}

impl<'a> Matches<'a> {
    /// Resolve one goal, pushing every viable successor state
    ///
    /// Successors are pushed in reverse preference order so the preferred
    /// alternative is popped first.
    fn resolve(&mut self, goal: Goal<'a>, state: State<'a>) {
        match goal {
            Goal::Node(pattern, subject) => self.resolve_node(pattern, subject, state),
            Goal::Strict { items, subjects } => self.resolve_strict(items, subjects, state),
            Goal::Subsequence { items, subjects } => {
                self.resolve_subsequence(items, subjects, state)
            }
            Goal::Unordered { items, remaining } => self.resolve_unordered(items, remaining, state),
        }
    }

    fn resolve_node(&mut self, pattern: &'a Pattern, subject: &'a TreeNode, mut state: State<'a>) {
        match pattern {
            Pattern::Concrete {
                kind,
                literal,
                children,
            } => {
                if subject.kind() != kind || literal.as_ref() != subject.literal() {
                    return;
                }
                match children {
                    Children::Fixed(list) => {
                        if list.len() != subject.children().len() {
                            return;
                        }
                        // Reverse so the leftmost child is resolved first
                        for (child, subj) in list.iter().zip(subject.children()).rev() {
                            state.goals.push(Goal::Node(child, subj));
                        }
                        self.stack.push(state);
                    }
                    Children::Seq(seq) => {
                        // A sequence with zero items matches vacuously
                        if seq.items.is_empty() {
                            self.stack.push(state);
                            return;
                        }
                        let goal = match seq.mode {
                            SeqMode::Strict => Goal::Strict {
                                items: &seq.items,
                                subjects: subject.children(),
                            },
                            SeqMode::Subsequence => Goal::Subsequence {
                                items: &seq.items,
                                subjects: subject.children(),
                            },
                            SeqMode::Unordered => Goal::Unordered {
                                items: &seq.items,
                                remaining: subject.children().iter().collect(),
                            },
                        };
                        state.goals.push(goal);
                        self.stack.push(state);
                    }
                }
            }

            Pattern::Variable {
                name,
                constraints,
                scope,
            } => {
                if let Some(bound) = state.binding.get(name) {
                    // Unification consistency: a repeated variable must
                    // resolve to a structurally equal subtree
                    if bound == subject {
                        self.stack.push(state);
                    }
                    return;
                }
                if !constraints.iter().all(|p| p.accepts(subject)) {
                    return;
                }
                state.binding.bind(name, subject.clone());
                if let Some(inner) = scope {
                    state.goals.push(Goal::Node(inner, subject));
                }
                self.stack.push(state);
            }

            Pattern::Wildcard => self.stack.push(state),
        }
    }

    fn resolve_strict(
        &mut self,
        items: &'a [SeqItem],
        subjects: &'a [TreeNode],
        mut state: State<'a>,
    ) {
        let Some((item, rest_items)) = items.split_first() else {
            // Items exhausted: strict mode requires the subjects to be too
            if subjects.is_empty() {
                self.stack.push(state);
            }
            return;
        };

        if item.optional {
            // Skip alternative, pushed first so matching is preferred
            let mut skip = state.clone();
            skip.goals.push(Goal::Strict {
                items: rest_items,
                subjects,
            });
            self.stack.push(skip);
        }

        if let Some((subject, rest_subjects)) = subjects.split_first() {
            state.goals.push(Goal::Strict {
                items: rest_items,
                subjects: rest_subjects,
            });
            state.goals.push(Goal::Node(&item.pattern, subject));
            self.stack.push(state);
        }
    }

    fn resolve_subsequence(
        &mut self,
        items: &'a [SeqItem],
        subjects: &'a [TreeNode],
        mut state: State<'a>,
    ) {
        let Some((item, rest_items)) = items.split_first() else {
            // Items exhausted: any remaining subjects are tolerated extras
            self.stack.push(state);
            return;
        };

        if item.optional {
            let mut skip = state.clone();
            skip.goals.push(Goal::Subsequence {
                items: rest_items,
                subjects,
            });
            self.stack.push(skip);
        }

        if let Some((subject, rest_subjects)) = subjects.split_first() {
            // Skip this subject element (an interleaved extra)
            let mut skip_subject = state.clone();
            skip_subject.goals.push(Goal::Subsequence {
                items,
                subjects: rest_subjects,
            });
            self.stack.push(skip_subject);

            // Match the first item here; pushed last so assignments come
            // out in increasing leftmost subject index
            state.goals.push(Goal::Subsequence {
                items: rest_items,
                subjects: rest_subjects,
            });
            state.goals.push(Goal::Node(&item.pattern, subject));
            self.stack.push(state);
        }
    }

    fn resolve_unordered(
        &mut self,
        items: &'a [SeqItem],
        remaining: Vec<&'a TreeNode>,
        state: State<'a>,
    ) {
        let Some((item, rest_items)) = items.split_first() else {
            // Every subject position must have been consumed
            if remaining.is_empty() {
                self.stack.push(state);
            }
            return;
        };

        if item.optional {
            let mut skip = state.clone();
            skip.goals.push(Goal::Unordered {
                items: rest_items,
                remaining: remaining.clone(),
            });
            self.stack.push(skip);
        }

        // Try each remaining position, in reverse so subject order wins.
        // Intentionally exponential in the list length; statement lists are
        // small in practice and callers needing better complexity should
        // use Subsequence with per-item ordering constraints instead.
        for position in (0..remaining.len()).rev() {
            let mut alternative = state.clone();
            let mut rest_remaining = remaining.clone();
            let subject = rest_remaining.remove(position);
            alternative.goals.push(Goal::Unordered {
                items: rest_items,
                remaining: rest_remaining,
            });
            alternative.goals.push(Goal::Node(&item.pattern, subject));
            self.stack.push(alternative);
        }
    }
}
