//! Immutable syntax tree model
//!
//! This module provides the uniform tree representation that patterns are
//! matched against. Nodes are produced by an external front end and are
//! read-only from this crate's point of view: once built they are never
//! mutated, only replaced.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Scalar value carried by a leaf node (identifier text or a constant)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Ident(String),
    Int(i64),
    Str(String),
}

impl Literal {
    /// Text of the literal without any quoting, as predicates see it
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Literal::Ident(s) | Literal::Str(s) => std::borrow::Cow::Borrowed(s),
            Literal::Int(n) => std::borrow::Cow::Owned(n.to_string()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Ident(s) => write!(f, "{}", s),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Reference back to the concrete source location of a node
///
/// Owned by the front end and used only for reporting; origins never
/// participate in matching decisions or structural equality.
#[derive(Debug, Clone)]
pub struct Origin {
    pub file: Arc<str>,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
struct NodeData {
    kind: String,
    literal: Option<Literal>,
    children: Vec<TreeNode>,
    origin: Option<Origin>,
}

/// A node in a parsed program fragment
///
/// `TreeNode` is a cheap-to-clone handle (`Arc`-backed), so subtrees are
/// shared freely between trees, patterns, and bindings. Equality is
/// structural: kind, literal, and children, recursively; `origin` is
/// ignored.
#[derive(Debug, Clone)]
pub struct TreeNode(Arc<NodeData>);

impl TreeNode {
    /// Create a leaf node with no literal value
    pub fn leaf(kind: &str) -> Self {
        Self(Arc::new(NodeData {
            kind: kind.to_string(),
            literal: None,
            children: Vec::new(),
            origin: None,
        }))
    }

    /// Create a leaf node carrying a literal value
    pub fn literal_leaf(kind: &str, literal: Literal) -> Self {
        Self(Arc::new(NodeData {
            kind: kind.to_string(),
            literal: Some(literal),
            children: Vec::new(),
            origin: None,
        }))
    }

    /// Create an interior node with ordered children
    pub fn branch(kind: &str, children: Vec<TreeNode>) -> Self {
        Self(Arc::new(NodeData {
            kind: kind.to_string(),
            literal: None,
            children,
            origin: None,
        }))
    }

    /// Return a copy of this node annotated with a source origin
    pub fn with_origin(&self, origin: Origin) -> Self {
        Self(Arc::new(NodeData {
            kind: self.0.kind.clone(),
            literal: self.0.literal.clone(),
            children: self.0.children.clone(),
            origin: Some(origin),
        }))
    }

    /// Syntactic category tag, e.g. "method-call" or "if-statement"
    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    /// Ordered children (empty for leaves)
    pub fn children(&self) -> &[TreeNode] {
        &self.0.children
    }

    /// Literal value, if this is a literal-bearing leaf
    pub fn literal(&self) -> Option<&Literal> {
        self.0.literal.as_ref()
    }

    /// Source origin, if the front end attached one
    pub fn origin(&self) -> Option<&Origin> {
        self.0.origin.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.children.is_empty()
    }

    /// Number of nodes in this subtree, including the root
    pub fn size(&self) -> usize {
        1 + self.0.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Pre-order traversal over this subtree, root first
    pub fn walk(&self) -> Walk {
        Walk {
            stack: vec![self.clone()],
        }
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.kind == other.0.kind
            && self.0.literal == other.0.literal
            && self.0.children == other.0.children
    }
}

impl Eq for TreeNode {}

impl Hash for TreeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
        self.0.literal.hash(state);
        self.0.children.hash(state);
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if let Some(lit) = self.literal() {
            write!(f, "={}", lit)?;
        }
        if !self.is_leaf() {
            write!(f, "(")?;
            for (i, child) in self.children().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Pre-order iterator over a subtree
pub struct Walk {
    stack: Vec<TreeNode>,
}

impl Iterator for Walk {
    type Item = TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children().iter().rev() {
            self.stack.push(child.clone());
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> TreeNode {
        TreeNode::branch(
            "method-call",
            vec![TreeNode::literal_leaf(
                "identifier",
                Literal::Ident(name.to_string()),
            )],
        )
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(call("m"), call("m"));
        assert_ne!(call("m"), call("c"));
        assert_ne!(call("m"), TreeNode::leaf("method-call"));
    }

    #[test]
    fn test_origin_ignored_by_equality() {
        let origin = Origin {
            file: Arc::from("a.src"),
            start: 10,
            end: 20,
        };
        let plain = call("m");
        let located = call("m").with_origin(origin);

        assert_eq!(plain, located);
        assert!(located.origin().is_some());
        assert!(plain.origin().is_none());
    }

    #[test]
    fn test_walk_preorder() {
        let body = TreeNode::branch("body", vec![call("m"), call("c")]);
        let kinds: Vec<_> = body.walk().map(|n| n.kind().to_string()).collect();

        assert_eq!(
            kinds,
            vec![
                "body",
                "method-call",
                "identifier",
                "method-call",
                "identifier"
            ]
        );
        assert_eq!(body.size(), 5);
    }

    #[test]
    fn test_display() {
        let tree = TreeNode::branch(
            "assign",
            vec![
                TreeNode::literal_leaf("identifier", Literal::Ident("x".to_string())),
                TreeNode::literal_leaf("number", Literal::Int(3)),
            ],
        );
        assert_eq!(tree.to_string(), "assign(identifier=x number=3)");
    }
}
