//! Wire-level observation model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lens_types::{
    CauseHint, Delta, Identity, NodeRef, RepresentationKind, StateTree, UnchangedSummary,
};

/// What one `observe()` call hands back to the agent loop: either the full
/// state (first step, forced refresh, recovery) or the delta since the last
/// committed snapshot. The refs map is always present so the caller can
/// resolve `@eN` tokens without walking the tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Full {
        tree: StateTree,
        refs: BTreeMap<NodeRef, Identity>,
        representation: RepresentationKind,
        step: u64,
        observed_at: DateTime<Utc>,
    },
    Delta {
        delta: Delta,
        refs: BTreeMap<NodeRef, Identity>,
        unchanged_summary: UnchangedSummary,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        cause_hint: Option<CauseHint>,
        representation: RepresentationKind,
        step: u64,
        observed_at: DateTime<Utc>,
    },
}

impl Observation {
    pub fn is_full(&self) -> bool {
        matches!(self, Observation::Full { .. })
    }

    pub fn refs(&self) -> &BTreeMap<NodeRef, Identity> {
        match self {
            Observation::Full { refs, .. } | Observation::Delta { refs, .. } => refs,
        }
    }

    pub fn step(&self) -> u64 {
        match self {
            Observation::Full { step, .. } | Observation::Delta { step, .. } => *step,
        }
    }

    pub fn representation(&self) -> RepresentationKind {
        match self {
            Observation::Full { representation, .. }
            | Observation::Delta { representation, .. } => *representation,
        }
    }
}
