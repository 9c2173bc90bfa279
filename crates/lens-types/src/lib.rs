//! Shared data model for BrowserLens.
//!
//! Everything that crosses a crate boundary lives here: the normalized
//! [`StateTree`] produced by the extractors, the typed [`Delta`] produced by
//! the differ, the [`Signals`] record feeding the representation router, and
//! the stable [`NodeRef`] tokens that name nodes across steps.

pub mod delta;
pub mod node;
pub mod signals;
pub mod tree;

pub use delta::{
    AddedSubtree, CauseHint, ChangedField, Cosmetic, Delta, FieldChange, Move, UnchangedSummary,
};
pub use node::{BoundingBox, Identity, Node, NodeOrigin, NodeRef, Role, StateFlag};
pub use signals::{PageKind, RepresentationKind, Signals};
pub use tree::StateTree;

use uuid::Uuid;

/// Identifier for one BrowserLens session (one agent loop).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
