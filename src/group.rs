//! Named groups of templates with logical combinators
//!
//! A `TemplateGroup` aggregates snippets (pattern + side conditions) and
//! answers multi-pattern queries over a corpus. Groups are persistent
//! values: every mutating operation returns a new group and shares the
//! unchanged snippets with the old one, so holding an old group across an
//! edit is always safe.

use crate::frontend::CancelFlag;
use crate::index::CorpusIndex;
use crate::matcher::{Binding, match_pattern};
use crate::pattern::Pattern;
use crate::relax::{OperatorError, RelaxOp};
use crate::tree::TreeNode;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// One template with its user-supplied logical side conditions
///
/// Conditions are opaque to the core; they are carried along and persisted
/// verbatim for the host environment to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub pattern: Pattern,
    pub conditions: Vec<String>,
}

/// How a group combines its snippets' match sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Every snippet must match at the same candidate location
    Conjunctive,
    /// Any snippet matching yields a hit
    Disjunctive,
}

/// Scoping of variable bindings across a conjunctive group's snippets
///
/// Whether the original tool joins bindings across snippets or merely
/// co-locates them is not settled; both semantics are available and the
/// conservative one is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjunctionScope {
    /// Snippets must agree on shared variable names at a joined binding
    SharedBindings,
    /// Snippets match independently; only the location is shared
    Colocated,
}

/// A named, ordered collection of snippets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateGroup {
    name: String,
    snippets: Vec<Arc<Snippet>>,
    combinator: Combinator,
    scope: ConjunctionScope,
}

/// One query result: a candidate location and the snippet bindings there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHit {
    pub subject: TreeNode,
    /// (snippet index, binding) pairs; one entry per snippet for a
    /// conjunctive hit, a single entry for a disjunctive one
    pub matches: Vec<(usize, Binding)>,
}

impl TemplateGroup {
    /// Empty group with the conservative defaults
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            snippets: Vec::new(),
            combinator: Combinator::Conjunctive,
            scope: ConjunctionScope::SharedBindings,
        }
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn with_scope(mut self, scope: ConjunctionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn scope(&self) -> ConjunctionScope {
        self.scope
    }

    pub fn snippets(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets.iter().map(|snippet| &**snippet)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// New group with a snippet appended
    pub fn add_snippet(&self, pattern: Pattern, conditions: Vec<String>) -> Self {
        let mut snippets = self.snippets.clone();
        snippets.push(Arc::new(Snippet {
            pattern,
            conditions,
        }));
        Self {
            snippets,
            ..self.clone()
        }
    }

    /// New group without the snippets whose pattern equals `pattern`
    ///
    /// Removing an absent pattern is a no-op yielding an equal group.
    pub fn remove_snippet(&self, pattern: &Pattern) -> Self {
        let snippets = self
            .snippets
            .iter()
            .filter(|snippet| &snippet.pattern != pattern)
            .cloned()
            .collect();
        Self {
            snippets,
            ..self.clone()
        }
    }

    /// Independent copy of this group (cheap; snippets are shared)
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Append another group's snippets, renaming colliding variables
    ///
    /// Variable names already used in this group are renamed in the
    /// appended snippets (`x` becomes `x__2`, then `x__3`, …) so merging
    /// never introduces cross-snippet capture. Sharing within the appended
    /// group is preserved: one renaming is computed for the whole of
    /// `other`.
    pub fn merge_into(&self, other: &TemplateGroup) -> Self {
        let mut used: Vec<String> = Vec::new();
        for snippet in &self.snippets {
            for name in snippet.pattern.variables() {
                if !used.contains(&name) {
                    used.push(name);
                }
            }
        }

        let mut mapping: FxHashMap<String, String> = FxHashMap::default();
        for snippet in &other.snippets {
            for name in snippet.pattern.variables() {
                if used.contains(&name) && !mapping.contains_key(&name) {
                    let mut suffix = 2;
                    let fresh = loop {
                        let candidate = format!("{}__{}", name, suffix);
                        if !used.contains(&candidate) {
                            break candidate;
                        }
                        suffix += 1;
                    };
                    used.push(fresh.clone());
                    mapping.insert(name, fresh);
                }
            }
        }

        let mut snippets = self.snippets.clone();
        for snippet in &other.snippets {
            if mapping.is_empty() {
                snippets.push(snippet.clone());
            } else {
                snippets.push(Arc::new(Snippet {
                    pattern: snippet.pattern.rename(&mapping),
                    conditions: snippet.conditions.clone(),
                }));
            }
        }
        Self {
            snippets,
            ..self.clone()
        }
    }

    /// Apply a relaxation operator to one snippet, replacing it
    ///
    /// Atomic: on error the caller still holds the unchanged original and
    /// the error is surfaced, never swallowed.
    pub fn apply_operator(&self, index: usize, op: &RelaxOp) -> Result<Self, OperatorError> {
        let snippet = self
            .snippets
            .get(index)
            .ok_or(OperatorError::NoSuchSnippet(index))?;
        let relaxed = op.apply(&snippet.pattern)?;
        let mut snippets = self.snippets.clone();
        snippets[index] = Arc::new(Snippet {
            pattern: relaxed,
            conditions: snippet.conditions.clone(),
        });
        Ok(Self {
            snippets,
            ..self.clone()
        })
    }

    /// Query the group over a sequence of candidate subjects
    ///
    /// Candidates come from the external corpus traversal. The result is a
    /// lazy iterator; the cancellation flag is checked between candidates,
    /// and a cancelled query simply ends early.
    pub fn query<I>(&self, candidates: I, cancel: &CancelFlag) -> QueryHits<'_, I::IntoIter>
    where
        I: IntoIterator<Item = TreeNode>,
    {
        QueryHits {
            group: self,
            candidates: candidates.into_iter(),
            cancel: cancel.clone(),
            pending: VecDeque::new(),
        }
    }

    /// Query through a prebuilt corpus index
    ///
    /// Same semantics as [`query`](Self::query) over every indexed node,
    /// but a conjunctive group only visits the candidate bucket of its
    /// most selective snippet root.
    pub fn query_indexed(
        &self,
        index: &CorpusIndex,
        cancel: &CancelFlag,
    ) -> QueryHits<'_, std::vec::IntoIter<TreeNode>> {
        let candidates: Vec<TreeNode> = match self.combinator {
            // A conjunctive hit must match every snippet, so any snippet's
            // bucket is a sound prefilter; take the smallest
            Combinator::Conjunctive => self
                .snippets
                .iter()
                .map(|snippet| index.candidates_for(&snippet.pattern))
                .min_by_key(|bucket| bucket.len())
                .unwrap_or(index.all())
                .to_vec(),
            Combinator::Disjunctive => index.all().to_vec(),
        };
        self.query(candidates, cancel)
    }

    /// Conjunctive matching of every snippet at one candidate
    fn conjoin(&self, subject: &TreeNode) -> Option<Vec<(usize, Binding)>> {
        match self.scope {
            ConjunctionScope::SharedBindings => {
                let mut matched = Vec::with_capacity(self.snippets.len());
                if self.join_shared(subject, 0, &Binding::new(), &mut matched) {
                    Some(matched)
                } else {
                    None
                }
            }
            ConjunctionScope::Colocated => {
                let mut matched = Vec::with_capacity(self.snippets.len());
                for (index, snippet) in self.snippets.iter().enumerate() {
                    let binding = match_pattern(&snippet.pattern, subject).next()?;
                    matched.push((index, binding));
                }
                Some(matched)
            }
        }
    }

    /// Depth-first search for one consistent combination of bindings
    fn join_shared(
        &self,
        subject: &TreeNode,
        index: usize,
        accumulated: &Binding,
        matched: &mut Vec<(usize, Binding)>,
    ) -> bool {
        let Some(snippet) = self.snippets.get(index) else {
            return true;
        };
        for binding in match_pattern(&snippet.pattern, subject) {
            if let Some(merged) = accumulated.merged(&binding) {
                matched.push((index, binding));
                if self.join_shared(subject, index + 1, &merged, matched) {
                    return true;
                }
                matched.pop();
            }
        }
        false
    }
}

/// Lazy iterator over a group query's hits
pub struct QueryHits<'a, I> {
    group: &'a TemplateGroup,
    candidates: I,
    cancel: CancelFlag,
    pending: VecDeque<GroupHit>,
}

impl<'a, I> Iterator for QueryHits<'a, I>
where
    I: Iterator<Item = TreeNode>,
{
    type Item = GroupHit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.pending.pop_front() {
                return Some(hit);
            }
            if self.cancel.is_cancelled() {
                return None;
            }
            let candidate = self.candidates.next()?;
            self.collect_hits(&candidate);
        }
    }
}

impl<'a, I> QueryHits<'a, I> {
    fn collect_hits(&mut self, candidate: &TreeNode) {
        match self.group.combinator {
            Combinator::Disjunctive => {
                for (index, snippet) in self.group.snippets.iter().enumerate() {
                    for binding in match_pattern(&snippet.pattern, candidate) {
                        self.pending.push_back(GroupHit {
                            subject: candidate.clone(),
                            matches: vec![(index, binding)],
                        });
                    }
                }
            }
            Combinator::Conjunctive => {
                if self.group.snippets.is_empty() {
                    return;
                }
                if let Some(matched) = self.group.conjoin(candidate) {
                    debug!(group = self.group.name(), subject = %candidate, "conjunctive hit");
                    self.pending.push_back(GroupHit {
                        subject: candidate.clone(),
                        matches: matched,
                    });
                }
            }
        }
    }
}
