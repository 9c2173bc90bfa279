//! Structural state differ.
//!
//! Aligns two successive page snapshots with a two-pass matcher (anchor
//! matching on identity tuples, then bounded fuzzy matching within parent
//! pairs), classifies per-node changes into a typed [`lens_types::Delta`],
//! filters cosmetic noise, and keeps `@eN` references stable across steps.
//! Everything here is synchronous, in-memory, and deterministic.

pub mod apply;
pub mod diff;
pub mod errors;
pub mod filter;
pub mod matcher;
pub mod refs;
pub mod store;

pub use apply::{apply, trees_equivalent};
pub use diff::{derive_cause, diff_trees};
pub use errors::{DiffError, Result};
pub use filter::{Candidate, FilterPredicate, SemanticFilter};
pub use matcher::{match_trees, FlatTree, Matching};
pub use refs::{RefAssignment, RefManager};
pub use store::SnapshotStore;
