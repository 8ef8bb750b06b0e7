//! Templatesearch: template matching and synthesis over syntax trees
//!
//! A toolkit for describing code shapes as partial syntax trees and finding
//! every location in a corpus that satisfies them. Templates mix concrete
//! subtrees, logic variables, and relaxed sequence constructs; matching is
//! unification with explicit backtracking, and templates can also be
//! synthesized from positive/negative example fragments by searching a
//! lattice of progressively more general patterns.

pub mod frontend; // External collaborator seams and cancellation
pub mod group; // Named template groups with logical combinators
pub mod index; // Inverted index for candidate prefiltering
pub mod matcher; // Unification engine with explicit choice points
pub mod pattern; // Template AST and edit operations
pub mod persist; // Stored template-group representation
pub mod relax; // Generalization operator catalog
pub mod search; // Example-driven lattice search
pub mod tree; // Immutable syntax tree model

// Re-exports for convenience
pub use frontend::{CancelFlag, FragmentParser, ParseError};
pub use group::{Combinator, ConjunctionScope, GroupHit, Snippet, TemplateGroup};
pub use index::CorpusIndex;
pub use matcher::{Binding, Matches, match_pattern, matches};
pub use pattern::{Pattern, PatternError, Path, Predicate, SeqMode, quote};
pub use persist::{PersistedGroup, from_persistable, to_persistable};
pub use relax::{OperatorError, RelaxOp};
pub use search::{Example, Label, SearchConfig, SearchError, search_space};
pub use tree::{Literal, Origin, TreeNode};
