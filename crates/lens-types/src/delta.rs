use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Node, NodeRef};

/// A new subtree, reported with its parent anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedSubtree {
    pub parent: NodeRef,
    /// Position hint: child index under the parent at which the subtree sits.
    pub position: usize,
    pub subtree: Node,
}

/// Which tracked field of a node diverged.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangedField {
    Name,
    Value,
    State,
    Level,
}

/// One `(ref, field, old, new)` tuple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(rename = "ref")]
    pub ref_id: NodeRef,
    pub field: ChangedField,
    pub old: Value,
    pub new: Value,
}

/// A node that persisted but reparented.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    #[serde(rename = "ref")]
    pub ref_id: NodeRef,
    pub old_parent: NodeRef,
    pub new_parent: NodeRef,
}

/// Structural roll-up of what did not change: region label to stable-node
/// count, plus the count of changes the semantic filter discarded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnchangedSummary {
    pub regions: BTreeMap<String, usize>,
    pub noise: usize,
}

impl UnchangedSummary {
    pub fn stable_total(&self) -> usize {
        self.regions.values().sum()
    }
}

/// Best-effort classification of what caused a delta.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CauseHint {
    Navigation,
    Mutation,
    Focus,
    Input,
    Unknown,
}

/// Changes the differ saw but the delta model cannot express on the wire.
/// The semantic filter consumes these; they are never serialized.
#[derive(Clone, Debug, PartialEq)]
pub enum Cosmetic {
    /// Matched children of `parent` changed relative order.
    Reorder {
        parent: NodeRef,
        identity_set_unchanged: bool,
    },
    /// A `vision-region` node moved or resized while its vision token
    /// stayed byte-identical.
    BoundsOnly { ref_id: NodeRef },
}

/// Typed difference between two [`crate::StateTree`]s.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub added: Vec<AddedSubtree>,
    pub removed: Vec<NodeRef>,
    pub changed: Vec<FieldChange>,
    pub moved: Vec<Move>,
    pub unchanged_summary: UnchangedSummary,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cause_hint: Option<CauseHint>,
    #[serde(skip, default)]
    pub cosmetics: Vec<Cosmetic>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len() + self.moved.len()
    }
}
