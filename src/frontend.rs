//! External collaborator seams
//!
//! The core never parses source text or walks a workspace itself; it
//! consumes trees produced by a front end and candidate sequences produced
//! by a corpus traversal. This module holds the contracts with those
//! collaborators, plus the cooperative cancellation flag that is the core's
//! only contract with asynchronous host wrappers.

use crate::tree::TreeNode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A fragment could not be turned into a tree
///
/// Produced by the front end and surfaced to the caller unchanged; no
/// partial pattern is ever created from a failed parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Front-end contract: turn source text into a tree
pub trait FragmentParser {
    fn parse_fragment(&self, source: &str) -> Result<TreeNode, ParseError>;
}

/// Cooperative cancellation flag
///
/// Long-running queries and searches check the flag between candidates or
/// frontier pops and stop early, returning whatever was accumulated so far.
/// Clones share the underlying flag, so a host may hand one side to a
/// worker and keep the other.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; all clones observe it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let worker_side = flag.clone();

        assert!(!worker_side.is_cancelled());
        flag.cancel();
        assert!(worker_side.is_cancelled());
    }
}
