//! Example-driven template synthesis
//!
//! Given positive and negative example fragments, explores the
//! generalization lattice rooted at the quotation of the first positive:
//! each frontier pattern is evaluated against every example, accepted when
//! it covers all positives and no negative, pruned outright when it matches
//! a negative (by monotonicity every further generalization would too), and
//! otherwise expanded through every applicable relaxation operator.

use crate::frontend::CancelFlag;
use crate::matcher::matches;
use crate::pattern::{Pattern, quote};
use crate::relax::{FreshNames, enumerate_ops};
use crate::tree::TreeNode;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

/// Example polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Positive,
    Negative,
}

/// A labeled example fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub node: TreeNode,
    pub label: Label,
}

impl Example {
    pub fn positive(node: TreeNode) -> Self {
        Self {
            node,
            label: Label::Positive,
        }
    }

    pub fn negative(node: TreeNode) -> Self {
        Self {
            node,
            label: Label::Negative,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("fragment tagged both positive and negative: {0}")]
    InconsistentExamples(String),
}

/// Bounds on the lattice exploration
///
/// Both limits guarantee termination on example sets that admit no exact
/// generalization; exhausting them yields the results accumulated so far,
/// which may be empty. An empty result is a valid "no pattern found"
/// outcome, not an error.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum relaxation steps from the seed along one branch
    pub max_depth: usize,
    /// Maximum frontier pops over the whole search
    pub max_nodes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_nodes: 10_000,
        }
    }
}

/// Frontier entry: a pattern and its distance from the seed
#[derive(Debug)]
struct SearchNode {
    pattern: Pattern,
    depth: usize,
}

/// Search the generalization lattice for patterns consistent with the
/// examples
///
/// Returns every accepted pattern in discovery order (depth-first, most
/// specific first). Cancellation is checked between frontier pops; a
/// cancelled search returns what it has accepted so far.
pub fn search_space(
    positives: &[TreeNode],
    negatives: &[TreeNode],
    config: &SearchConfig,
    cancel: &CancelFlag,
) -> Result<Vec<Pattern>, SearchError> {
    check_consistency(positives, negatives)?;
    let Some(seed) = positives.first() else {
        return Ok(Vec::new());
    };

    let mut names = FreshNames::new();
    let mut stack = vec![SearchNode {
        pattern: quote(seed),
        depth: 0,
    }];
    let mut visited: FxHashSet<Pattern> = FxHashSet::default();
    let mut accepted = Vec::new();
    let mut popped = 0usize;

    while let Some(node) = stack.pop() {
        if cancel.is_cancelled() {
            break;
        }
        popped += 1;
        if popped > config.max_nodes {
            break;
        }
        // The lattice is a DAG; expand each pattern once
        if !visited.insert(node.pattern.clone()) {
            continue;
        }

        if negatives.iter().any(|n| matches(&node.pattern, n)) {
            // Every further generalization also matches that negative, so
            // no descendant can ever be accepted
            debug!(pattern = %node.pattern, "pruned, matches a negative");
            continue;
        }
        if positives.iter().all(|p| matches(&node.pattern, p)) {
            // Full positive coverage with zero negative coverage; further
            // generalization could only add unnecessary matches
            debug!(pattern = %node.pattern, depth = node.depth, "accepted");
            accepted.push(node.pattern);
            continue;
        }
        if node.depth >= config.max_depth {
            continue;
        }

        // One child per applicable operator instance, pushed in reverse so
        // the first instance is explored first
        for op in enumerate_ops(&node.pattern, &mut names).into_iter().rev() {
            if let Ok(child) = op.apply(&node.pattern) {
                stack.push(SearchNode {
                    pattern: child,
                    depth: node.depth + 1,
                });
            }
        }
    }

    Ok(accepted)
}

/// Search from a pre-labeled example set
pub fn search_examples(
    examples: &[Example],
    config: &SearchConfig,
    cancel: &CancelFlag,
) -> Result<Vec<Pattern>, SearchError> {
    let positives: Vec<TreeNode> = examples
        .iter()
        .filter(|e| e.label == Label::Positive)
        .map(|e| e.node.clone())
        .collect();
    let negatives: Vec<TreeNode> = examples
        .iter()
        .filter(|e| e.label == Label::Negative)
        .map(|e| e.node.clone())
        .collect();
    search_space(&positives, &negatives, config, cancel)
}

/// Reject example sets where a tree is tagged both positive and negative,
/// directly or via structural equality
fn check_consistency(positives: &[TreeNode], negatives: &[TreeNode]) -> Result<(), SearchError> {
    for positive in positives {
        if negatives.iter().any(|negative| negative == positive) {
            return Err(SearchError::InconsistentExamples(positive.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Literal;

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

    /// Every accepted pattern must match all positives and no negative
    fn assert_consistent(results: &[Pattern], positives: &[TreeNode], negatives: &[TreeNode]) {
        for pattern in results {
            for p in positives {
                assert!(matches(pattern, p), "{} should match {}", pattern, p);
            }
            for n in negatives {
                assert!(!matches(pattern, n), "{} should reject {}", pattern, n);
            }
        }
    }

    #[test]
    fn test_seed_accepted_when_sufficient() {
        let positives = vec![body(&["m", "c"])];
        let negatives = vec![body(&["c", "m"])];
        let results =
            search_space(&positives, &negatives, &SearchConfig::default(), &CancelFlag::new())
                .unwrap();

        // The quotation of the single positive already separates the sets
        assert_eq!(results, vec![quote(&positives[0])]);
        assert_consistent(&results, &positives, &negatives);
    }

    #[test]
    fn test_finds_order_relaxation() {
        let positives = vec![body(&["m", "c"]), body(&["c", "m"])];
        let results =
            search_space(&positives, &[], &SearchConfig::default(), &CancelFlag::new()).unwrap();

        assert!(!results.is_empty());
        assert_consistent(&results, &positives, &[]);
        // The seed alone covers only one positive, so every result is a
        // proper generalization of it
        assert!(!results.contains(&quote(&positives[0])));
    }

    #[test]
    fn test_finds_subsequence_relaxation() {
        let positives = vec![body(&["m", "c"]), body(&["m", "d", "c"])];
        let negatives = vec![body(&["c", "m"])];
        let results =
            search_space(&positives, &negatives, &SearchConfig::default(), &CancelFlag::new())
                .unwrap();

        assert!(!results.is_empty());
        assert_consistent(&results, &positives, &negatives);
    }

    #[test]
    fn test_finds_literal_generalization() {
        let positives = vec![call("m"), call("c")];
        let negatives = vec![TreeNode::leaf("if-statement")];
        let results =
            search_space(&positives, &negatives, &SearchConfig::default(), &CancelFlag::new())
                .unwrap();

        assert!(!results.is_empty());
        assert_consistent(&results, &positives, &negatives);
    }

    #[test]
    fn test_inconsistent_examples_fail_fast() {
        let shared = body(&["m"]);
        let err = search_space(
            &[shared.clone()],
            &[shared],
            &SearchConfig::default(),
            &CancelFlag::new(),
        );
        assert!(matches!(err, Err(SearchError::InconsistentExamples(_))));
    }

    #[test]
    fn test_unreachable_generalization_yields_empty() {
        // No relaxation changes a root kind, so these positives can never
        // be covered together; the bounded search must still terminate
        let positives = vec![call("m"), TreeNode::leaf("if-statement")];
        let results =
            search_space(&positives, &[], &SearchConfig::default(), &CancelFlag::new()).unwrap();

        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_positives_yield_empty() {
        let results = search_space(
            &[],
            &[body(&["m"])],
            &SearchConfig::default(),
            &CancelFlag::new(),
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_cancelled_search_returns_accumulated() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let results = search_space(
            &[body(&["m", "c"]), body(&["c", "m"])],
            &[],
            &SearchConfig::default(),
            &cancel,
        )
        .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_examples_splits_labels() {
        let examples = vec![
            Example::positive(body(&["m", "c"])),
            Example::negative(body(&["c", "m"])),
        ];
        let results =
            search_examples(&examples, &SearchConfig::default(), &CancelFlag::new()).unwrap();
        assert_eq!(results, vec![quote(&examples[0].node)]);
    }
}
