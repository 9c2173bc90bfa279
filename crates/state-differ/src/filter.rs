//! Semantic noise filter.
//!
//! Drops cosmetic changes from a delta before emission. Predicates are
//! pluggable capability objects evaluated with short-circuit OR; anything
//! discarded is tallied into the `noise` bucket of the unchanged summary.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use lens_types::{
    AddedSubtree, ChangedField, Cosmetic, Delta, FieldChange, Node, NodeOrigin, NodeRef, Role,
    StateTree,
};

static TIMER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{1,2}:\d{2}(:\d{2})?$",
        r"(?i)^\d+\s*(second|minute|hour|sec|min)s?\s*ago$",
        r"(?i)^(just now|moments ago)$",
        r"^\d{1,3}%$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("timer patterns are static"))
    .collect()
});

static AD_HINTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(advertisement|sponsored|promoted|ad choice|ad by)")
        .expect("ad pattern is static")
});

/// One change under consideration by the filter.
pub enum Candidate<'a> {
    Changed {
        entry: &'a FieldChange,
        /// The node in the new tree, when still resolvable.
        node: Option<&'a Node>,
        /// Root-to-parent chain of the node.
        ancestors: Vec<&'a Node>,
        /// All fields that changed on this node this step.
        node_fields: &'a BTreeSet<ChangedField>,
    },
    Added {
        entry: &'a AddedSubtree,
    },
    Removed {
        node: Option<&'a Node>,
    },
    Reorder {
        parent: Option<&'a Node>,
        identity_set_unchanged: bool,
    },
    BoundsOnly {
        node: Option<&'a Node>,
    },
}

/// Returns true when the candidate is noise and should be discarded.
pub type FilterPredicate = Arc<dyn Fn(&Candidate<'_>) -> bool + Send + Sync>;

pub struct SemanticFilter {
    predicates: Vec<FilterPredicate>,
}

impl SemanticFilter {
    /// The built-in predicate list, in evaluation order.
    pub fn defaults() -> Self {
        Self {
            predicates: vec![
                Arc::new(live_role_churn),
                Arc::new(polite_region_churn),
                Arc::new(progressbar_state),
                Arc::new(stable_set_reorder),
                Arc::new(vision_bounds_only),
                Arc::new(timer_text),
                Arc::new(ad_content),
            ],
        }
    }

    pub fn with_predicates(predicates: Vec<FilterPredicate>) -> Self {
        Self { predicates }
    }

    fn is_noise(&self, candidate: &Candidate<'_>) -> bool {
        self.predicates.iter().any(|p| p(candidate))
    }

    /// Filter a delta in the context of the trees it was computed from.
    /// Idempotent: running it again over its own output changes nothing.
    pub fn apply(&self, mut delta: Delta, old: &StateTree, new: &StateTree) -> Delta {
        let mut noise = 0usize;

        let mut fields_by_ref: HashMap<NodeRef, BTreeSet<ChangedField>> = HashMap::new();
        for change in &delta.changed {
            fields_by_ref
                .entry(change.ref_id)
                .or_default()
                .insert(change.field);
        }

        let no_fields = BTreeSet::new();
        let changed = std::mem::take(&mut delta.changed);
        for entry in changed {
            let node = new.find(entry.ref_id);
            let ancestors = new.ancestor_path(entry.ref_id).unwrap_or_default();
            let node_fields = fields_by_ref.get(&entry.ref_id).unwrap_or(&no_fields);
            let candidate = Candidate::Changed {
                entry: &entry,
                node,
                ancestors,
                node_fields,
            };
            if self.is_noise(&candidate) {
                noise += 1;
            } else {
                delta.changed.push(entry);
            }
        }

        let added = std::mem::take(&mut delta.added);
        for entry in added {
            if self.is_noise(&Candidate::Added { entry: &entry }) {
                noise += 1;
            } else {
                delta.added.push(entry);
            }
        }

        let removed = std::mem::take(&mut delta.removed);
        for ref_id in removed {
            let candidate = Candidate::Removed {
                node: old.find(ref_id),
            };
            if self.is_noise(&candidate) {
                noise += 1;
            } else {
                delta.removed.push(ref_id);
            }
        }

        // Cosmetics are consumed here either way; the delta model cannot
        // express them on the wire.
        for cosmetic in std::mem::take(&mut delta.cosmetics) {
            let is_noise = match cosmetic {
                Cosmetic::Reorder {
                    parent,
                    identity_set_unchanged,
                } => self.is_noise(&Candidate::Reorder {
                    parent: new.find(parent),
                    identity_set_unchanged,
                }),
                Cosmetic::BoundsOnly { ref_id } => self.is_noise(&Candidate::BoundsOnly {
                    node: new.find(ref_id),
                }),
            };
            if is_noise {
                noise += 1;
            } else {
                debug!("dropping inexpressible cosmetic change");
            }
        }

        delta.unchanged_summary.noise += noise;
        if noise > 0 {
            debug!(noise, "semantic filter discarded changes");
        }
        delta
    }
}

impl Default for SemanticFilter {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Name/value churn on status, timer, and marquee roles.
fn live_role_churn(candidate: &Candidate<'_>) -> bool {
    let Candidate::Changed {
        node: Some(node),
        node_fields,
        ..
    } = candidate
    else {
        return false;
    };
    matches!(node.role, Role::Status | Role::Timer | Role::Marquee)
        && only_name_or_value(node_fields)
}

/// Name/value churn inside an `aria-live="polite"` region.
fn polite_region_churn(candidate: &Candidate<'_>) -> bool {
    let Candidate::Changed {
        node,
        ancestors,
        node_fields,
        ..
    } = candidate
    else {
        return false;
    };
    if !only_name_or_value(node_fields) {
        return false;
    }
    let self_polite = node
        .and_then(|n| n.live.as_deref())
        .map_or(false, |l| l == "polite");
    self_polite
        || ancestors
            .iter()
            .any(|a| a.live.as_deref() == Some("polite"))
}

/// State toggles on progress bars.
fn progressbar_state(candidate: &Candidate<'_>) -> bool {
    let Candidate::Changed {
        entry,
        node: Some(node),
        ..
    } = candidate
    else {
        return false;
    };
    entry.field == ChangedField::State && node.role == Role::Progressbar
}

/// Reorders inside carousels and tab lists whose child set is unchanged.
fn stable_set_reorder(candidate: &Candidate<'_>) -> bool {
    let Candidate::Reorder {
        parent: Some(parent),
        identity_set_unchanged,
    } = candidate
    else {
        return false;
    };
    *identity_set_unchanged && matches!(parent.role, Role::Carousel | Role::TabList)
}

/// Bounds-only movement of a vision region with an identical token.
fn vision_bounds_only(candidate: &Candidate<'_>) -> bool {
    let Candidate::BoundsOnly { node: Some(node) } = candidate else {
        return false;
    };
    node.origin == NodeOrigin::VisionRegion
}

/// Clock, countdown, and percentage churn.
fn timer_text(candidate: &Candidate<'_>) -> bool {
    let Candidate::Changed {
        entry, node_fields, ..
    } = candidate
    else {
        return false;
    };
    if !only_name_or_value(node_fields) {
        return false;
    }
    let Some(new_text) = entry.new.as_str() else {
        return false;
    };
    let trimmed = new_text.trim();
    TIMER_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

/// Advertisement churn in any direction.
fn ad_content(candidate: &Candidate<'_>) -> bool {
    let name = match candidate {
        Candidate::Changed { node: Some(n), .. } => &n.name,
        Candidate::Added { entry } => &entry.subtree.name,
        Candidate::Removed { node: Some(n) } => &n.name,
        _ => return false,
    };
    AD_HINTS.is_match(name)
}

fn only_name_or_value(fields: &BTreeSet<ChangedField>) -> bool {
    fields
        .iter()
        .all(|f| matches!(f, ChangedField::Name | ChangedField::Value))
}
