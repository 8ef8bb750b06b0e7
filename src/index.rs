//! Inverted index for candidate prefiltering
//!
//! Queries over a large corpus spend most of their time rejecting
//! candidates whose root kind cannot possibly match. The index groups
//! every node of the corpus by kind so a concrete-rooted snippet only
//! visits plausible candidates.

use crate::pattern::Pattern;
use crate::tree::TreeNode;
use rustc_hash::FxHashMap;

/// Corpus nodes grouped by syntactic kind
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    by_kind: FxHashMap<String, Vec<TreeNode>>,
    all: Vec<TreeNode>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over every node reachable from the given roots,
    /// in pre-order
    pub fn build(roots: impl IntoIterator<Item = TreeNode>) -> Self {
        let mut index = Self::new();
        for root in roots {
            for node in root.walk() {
                index.add_node(node);
            }
        }
        index
    }

    fn add_node(&mut self, node: TreeNode) {
        self.by_kind
            .entry(node.kind().to_string())
            .or_default()
            .push(node.clone());
        self.all.push(node);
    }

    /// Candidate nodes of one kind
    pub fn get_by_kind(&self, kind: &str) -> Option<&[TreeNode]> {
        self.by_kind.get(kind).map(|v| v.as_slice())
    }

    /// Every indexed node, in insertion order
    pub fn all(&self) -> &[TreeNode] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Candidates that could match the pattern's root
    ///
    /// A concrete root narrows to its kind bucket; variable or wildcard
    /// roots fall back to every node.
    pub fn candidates_for(&self, pattern: &Pattern) -> &[TreeNode] {
        match pattern {
            Pattern::Concrete { kind, .. } => self.get_by_kind(kind).unwrap_or(&[]),
            _ => self.all(),
        }
    }
}
