//! Delta construction from a tree matching.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use tracing::debug;

use lens_types::{
    AddedSubtree, CauseHint, ChangedField, Cosmetic, Delta, FieldChange, Move, Node, NodeRef,
    StateTree, UnchangedSummary,
};

use crate::errors::{DiffError, Result};
use crate::matcher::{match_trees, FlatTree};

/// Diff two committed trees into a typed delta.
///
/// Both trees must carry assigned, unique refs; anything else is an
/// internal invariant violation and surfaces as [`DiffError`] so the
/// session can transition to recovery.
pub fn diff_trees(old: &StateTree, new: &StateTree) -> Result<Delta> {
    validate_refs(old)?;
    validate_refs(new)?;

    let old_flat = FlatTree::build(&old.root);
    let new_flat = FlatTree::build(&new.root);
    let matching = match_trees(&old_flat, &new_flat);

    let mut delta = Delta::default();
    let mut changed_refs: HashSet<NodeRef> = HashSet::new();
    let mut moved_refs: HashSet<NodeRef> = HashSet::new();

    // Matched pairs: field divergence and reparenting.
    for (new_idx, old_idx) in matching.new_to_old.iter().enumerate() {
        let Some(old_idx) = *old_idx else { continue };
        let old_node = old_flat.nodes[old_idx].node;
        let new_node = new_flat.nodes[new_idx].node;

        let fields = compare_fields(old_node, new_node, &mut delta.cosmetics);
        if !fields.is_empty() {
            changed_refs.insert(new_node.ref_id);
            delta.changed.extend(fields);
        }

        if new_idx != 0 {
            let old_parent_ref = parent_ref(&old_flat, old_idx);
            let new_parent_ref = parent_ref(&new_flat, new_idx);
            if let (Some(op), Some(np)) = (old_parent_ref, new_parent_ref) {
                if op != np {
                    moved_refs.insert(new_node.ref_id);
                    delta.moved.push(Move {
                        ref_id: new_node.ref_id,
                        old_parent: op,
                        new_parent: np,
                    });
                }
            }
        }
    }

    // Unmatched new nodes: report maximal added subtrees only.
    for (new_idx, old_idx) in matching.new_to_old.iter().enumerate() {
        if old_idx.is_some() {
            continue;
        }
        let flat = &new_flat.nodes[new_idx];
        let Some(parent_idx) = flat.parent else { continue };
        if matching.new_to_old[parent_idx].is_none() {
            continue; // inside an added subtree already reported at its root
        }
        delta.added.push(AddedSubtree {
            parent: new_flat.nodes[parent_idx].node.ref_id,
            position: flat.sibling_index,
            subtree: flat.node.clone(),
        });
    }

    // Unmatched old nodes: maximal removed roots.
    for (old_idx, new_idx) in matching.old_to_new.iter().enumerate() {
        if new_idx.is_some() {
            continue;
        }
        let flat = &old_flat.nodes[old_idx];
        let Some(parent_idx) = flat.parent else { continue };
        if matching.old_to_new[parent_idx].is_none() {
            continue;
        }
        delta.removed.push(flat.node.ref_id);
    }

    detect_reorders(&old_flat, &new_flat, &matching, &mut delta);

    delta.unchanged_summary = summarize_unchanged(new, &matching, &new_flat, &changed_refs, &moved_refs);

    debug!(
        added = delta.added.len(),
        removed = delta.removed.len(),
        changed = delta.changed.len(),
        moved = delta.moved.len(),
        stable = delta.unchanged_summary.stable_total(),
        "built delta"
    );
    Ok(delta)
}

fn validate_refs(tree: &StateTree) -> Result<()> {
    let mut seen = HashSet::new();
    for node in tree.iter() {
        if !node.ref_id.is_assigned() {
            return Err(DiffError::invariant(format!(
                "unassigned ref on {} node {:?}",
                node.role, node.name
            )));
        }
        if !seen.insert(node.ref_id) {
            return Err(DiffError::invariant(format!(
                "duplicate ref {} in tree",
                node.ref_id
            )));
        }
    }
    Ok(())
}

fn parent_ref(flat: &FlatTree<'_>, idx: usize) -> Option<NodeRef> {
    flat.nodes[idx].parent.map(|p| flat.nodes[p].node.ref_id)
}

/// Compare the tracked fields of a matched pair; one entry per divergence.
fn compare_fields(old: &Node, new: &Node, cosmetics: &mut Vec<Cosmetic>) -> Vec<FieldChange> {
    let mut out = Vec::new();

    if old.name != new.name {
        out.push(FieldChange {
            ref_id: new.ref_id,
            field: ChangedField::Name,
            old: json!(old.name),
            new: json!(new.name),
        });
    }

    // Vision regions compare their token in place of a value; a pure
    // bounds change with an identical token is cosmetic.
    if old.vision_token.is_some() || new.vision_token.is_some() {
        if old.vision_token != new.vision_token {
            out.push(FieldChange {
                ref_id: new.ref_id,
                field: ChangedField::Value,
                old: json!(old.vision_token.as_deref().map(token_digest)),
                new: json!(new.vision_token.as_deref().map(token_digest)),
            });
        } else if old.bounds != new.bounds {
            cosmetics.push(Cosmetic::BoundsOnly { ref_id: new.ref_id });
        }
    } else if normalized_value(old.value.as_deref()) != normalized_value(new.value.as_deref()) {
        out.push(FieldChange {
            ref_id: new.ref_id,
            field: ChangedField::Value,
            old: json!(old.value),
            new: json!(new.value),
        });
    }

    if old.state != new.state {
        out.push(FieldChange {
            ref_id: new.ref_id,
            field: ChangedField::State,
            old: json!(old.state),
            new: json!(new.state),
        });
    }

    if old.level != new.level {
        out.push(FieldChange {
            ref_id: new.ref_id,
            field: ChangedField::Level,
            old: json!(old.level),
            new: json!(new.level),
        });
    }

    out
}

/// Whitespace-normalized, case-sensitive value comparison key.
fn normalized_value(value: Option<&str>) -> Option<String> {
    value.map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Short stable digest standing in for a (possibly large) vision token.
fn token_digest(token: &str) -> String {
    let hex = blake3::hash(token.as_bytes()).to_hex();
    format!("b3:{}", &hex[..16])
}

/// Record parents whose matched children changed relative order. The
/// semantic filter decides which of these are noise.
fn detect_reorders(
    old_flat: &FlatTree<'_>,
    new_flat: &FlatTree<'_>,
    matching: &crate::matcher::Matching,
    delta: &mut Delta,
) {
    for (new_idx, old_idx) in matching.new_to_old.iter().enumerate() {
        let Some(old_idx) = *old_idx else { continue };
        let new_children = new_flat.children_of(new_idx);
        if new_children.len() < 2 {
            continue;
        }

        let old_positions: Vec<usize> = new_children
            .iter()
            .filter_map(|&c| matching.new_to_old[c])
            .filter(|&o| old_flat.nodes[o].parent == Some(old_idx))
            .map(|o| old_flat.nodes[o].sibling_index)
            .collect();
        let is_reordered = old_positions.windows(2).any(|w| w[0] > w[1]);
        if !is_reordered {
            continue;
        }

        let identity_set_unchanged =
            child_identity_multiset(old_flat, old_idx) == child_identity_multiset(new_flat, new_idx);
        delta.cosmetics.push(Cosmetic::Reorder {
            parent: new_flat.nodes[new_idx].node.ref_id,
            identity_set_unchanged,
        });
    }
}

fn child_identity_multiset(flat: &FlatTree<'_>, parent: usize) -> Vec<(String, String, Option<u8>)> {
    let mut out: Vec<_> = flat
        .children_of(parent)
        .into_iter()
        .map(|c| {
            let n = flat.nodes[c].node;
            (n.role.to_string(), n.name.clone(), n.level)
        })
        .collect();
    out.sort();
    out
}

/// Region-level roll-up of stable nodes, grouped by the top-level child of
/// the root that contains them.
fn summarize_unchanged(
    new: &StateTree,
    matching: &crate::matcher::Matching,
    new_flat: &FlatTree<'_>,
    changed_refs: &HashSet<NodeRef>,
    moved_refs: &HashSet<NodeRef>,
) -> UnchangedSummary {
    let stable: HashSet<NodeRef> = matching
        .new_to_old
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, old)| old.is_some())
        .map(|(i, _)| new_flat.nodes[i].node.ref_id)
        .filter(|r| !changed_refs.contains(r) && !moved_refs.contains(r))
        .collect();

    let mut summary = UnchangedSummary::default();
    for child in &new.root.children {
        let count = count_stable(child, &stable);
        if count > 0 {
            *summary
                .regions
                .entry(lens_types::tree::region_label(child))
                .or_insert(0) += count;
        }
    }
    summary
}

fn count_stable(node: &Node, stable: &HashSet<NodeRef>) -> usize {
    let own = usize::from(stable.contains(&node.ref_id));
    own + node
        .children
        .iter()
        .map(|c| count_stable(c, stable))
        .sum::<usize>()
}

/// Best-effort classification of what caused a delta.
pub fn derive_cause(old: &StateTree, new: &StateTree, delta: &Delta) -> CauseHint {
    if old.url != new.url {
        return CauseHint::Navigation;
    }
    if delta.is_empty() {
        return CauseHint::Unknown;
    }
    let structural =
        !delta.added.is_empty() || !delta.removed.is_empty() || !delta.moved.is_empty();
    if !structural
        && !delta.changed.is_empty()
        && delta.changed.iter().all(|c| c.field == ChangedField::Value)
    {
        return CauseHint::Input;
    }
    if !structural && delta.changed.iter().any(focus_toggled) {
        return CauseHint::Focus;
    }
    if structural {
        return CauseHint::Mutation;
    }
    CauseHint::Unknown
}

fn focus_toggled(change: &FieldChange) -> bool {
    if change.field != ChangedField::State {
        return false;
    }
    let had = state_has_focus(&change.old);
    let has = state_has_focus(&change.new);
    had != has
}

fn state_has_focus(state: &Value) -> bool {
    state
        .as_array()
        .map_or(false, |flags| flags.iter().any(|f| f == "focused"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_types::{NodeOrigin, RepresentationKind, Role, StateFlag};

    fn node(ref_id: u32, role: Role, name: &str) -> Node {
        let mut n = Node::new(role, name, NodeOrigin::A11y);
        n.ref_id = NodeRef(ref_id);
        n
    }

    fn tree(url: &str, children: Vec<Node>) -> StateTree {
        let mut root = node(1, Role::Document, "");
        root.children = children;
        StateTree::new(url, "", RepresentationKind::A11y, root)
    }

    #[test]
    fn value_change_produces_single_changed_entry() {
        // Search form: textbox value set between steps, refs reused.
        let mut old_box = node(2, Role::Textbox, "Search");
        old_box.value = Some(String::new());
        let old = tree("https://x.test/", vec![old_box, node(3, Role::Button, "Go")]);

        let mut new_box = node(2, Role::Textbox, "Search");
        new_box.value = Some("laptop".into());
        let new = tree("https://x.test/", vec![new_box, node(3, Role::Button, "Go")]);

        let delta = diff_trees(&old, &new).unwrap();
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert!(delta.moved.is_empty());
        assert_eq!(delta.changed.len(), 1);
        let change = &delta.changed[0];
        assert_eq!(change.ref_id, NodeRef(2));
        assert_eq!(change.field, ChangedField::Value);
        assert_eq!(change.old, json!(""));
        assert_eq!(change.new, json!("laptop"));
        assert_eq!(derive_cause(&old, &new, &delta), CauseHint::Input);
    }

    #[test]
    fn modal_appearance_is_one_added_subtree() {
        let mut old_main = node(2, Role::Main, "");
        old_main.children.push(node(3, Role::Button, "Open"));
        let old = tree("https://x.test/", vec![old_main]);

        let mut new_main = node(2, Role::Main, "");
        new_main.children.push(node(3, Role::Button, "Open"));
        let mut dialog = node(4, Role::Dialog, "Confirm");
        let mut heading = node(5, Role::Heading, "Confirm");
        heading.level = Some(1);
        dialog.children.push(heading);
        dialog.children.push(node(6, Role::Button, "Yes"));
        dialog.children.push(node(7, Role::Button, "No"));
        let new = tree("https://x.test/", vec![new_main, dialog]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.added.len(), 1);
        let added = &delta.added[0];
        assert_eq!(added.parent, NodeRef(1));
        assert_eq!(added.subtree.role, Role::Dialog);
        assert_eq!(added.subtree.children.len(), 3);
        assert!(delta.changed.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(derive_cause(&old, &new, &delta), CauseHint::Mutation);
    }

    #[test]
    fn state_toggle_is_tracked_per_field() {
        let old = tree("https://x.test/", vec![node(7, Role::Button, "Submit")]);
        let mut disabled = node(7, Role::Button, "Submit");
        disabled.state.insert(StateFlag::Disabled);
        let new = tree("https://x.test/", vec![disabled]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.changed.len(), 1);
        let change = &delta.changed[0];
        assert_eq!(change.ref_id, NodeRef(7));
        assert_eq!(change.field, ChangedField::State);
        assert_eq!(change.old, json!([]));
        assert_eq!(change.new, json!(["disabled"]));
    }

    #[test]
    fn reparenting_is_one_move_with_same_ref() {
        let mut old_nav = node(2, Role::Navigation, "");
        old_nav.children.push(node(4, Role::Link, "Cart (0)"));
        let old = tree(
            "https://x.test/",
            vec![old_nav, node(3, Role::Banner, "")],
        );

        let mut new_banner = node(3, Role::Banner, "");
        new_banner.children.push(node(4, Role::Link, "Cart (0)"));
        let new = tree(
            "https://x.test/",
            vec![node(2, Role::Navigation, ""), new_banner],
        );

        let delta = diff_trees(&old, &new).unwrap();
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(delta.moved.len(), 1);
        let mv = &delta.moved[0];
        assert_eq!(mv.ref_id, NodeRef(4));
        assert_eq!(mv.old_parent, NodeRef(2));
        assert_eq!(mv.new_parent, NodeRef(3));
    }

    #[test]
    fn moved_node_with_field_divergence_also_emits_changed() {
        let mut old_nav = node(2, Role::Navigation, "");
        let mut old_link = node(4, Role::Link, "Cart (0)");
        old_link.value = Some("0".into());
        old_nav.children.push(old_link);
        let old = tree("https://x.test/", vec![old_nav, node(3, Role::Banner, "")]);

        let mut new_banner = node(3, Role::Banner, "");
        let mut new_link = node(4, Role::Link, "Cart (0)");
        new_link.value = Some("1".into());
        new_banner.children.push(new_link);
        let new = tree(
            "https://x.test/",
            vec![node(2, Role::Navigation, ""), new_banner],
        );

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.moved.len(), 1);
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.changed[0].ref_id, NodeRef(4));
        assert_eq!(delta.changed[0].field, ChangedField::Value);
    }

    #[test]
    fn identical_trees_yield_empty_delta_with_summary() {
        let mut nav = node(2, Role::Navigation, "Site");
        nav.children.push(node(3, Role::Link, "Home"));
        nav.children.push(node(4, Role::Link, "About"));
        let old = tree("https://x.test/", vec![nav]);
        let new = old.clone();

        let delta = diff_trees(&old, &new).unwrap();
        assert!(delta.is_empty());
        assert_eq!(delta.unchanged_summary.regions.get("Site"), Some(&3));
    }

    #[test]
    fn empty_old_tree_yields_pure_additions() {
        let old = tree("https://x.test/", vec![]);
        let mut main = node(2, Role::Main, "");
        main.children.push(node(3, Role::Button, "Go"));
        let new = tree("https://x.test/", vec![main]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.added.len(), 1);
        assert!(delta.removed.is_empty());
        assert!(delta.changed.is_empty());
    }

    #[test]
    fn empty_new_tree_yields_pure_removals() {
        let mut main = node(2, Role::Main, "");
        main.children.push(node(3, Role::Button, "Go"));
        let old = tree("https://x.test/", vec![main]);
        let new = tree("https://x.test/", vec![]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.removed, vec![NodeRef(2)]);
        assert!(delta.added.is_empty());
    }

    #[test]
    fn carousel_rotation_is_recorded_as_cosmetic_reorder() {
        let mut old_carousel = node(2, Role::Carousel, "Deals");
        old_carousel.children.push(node(3, Role::Image, "Slide A"));
        old_carousel.children.push(node(4, Role::Image, "Slide B"));
        old_carousel.children.push(node(5, Role::Image, "Slide C"));
        let old = tree("https://x.test/", vec![old_carousel]);

        let mut new_carousel = node(2, Role::Carousel, "Deals");
        new_carousel.children.push(node(4, Role::Image, "Slide B"));
        new_carousel.children.push(node(5, Role::Image, "Slide C"));
        new_carousel.children.push(node(3, Role::Image, "Slide A"));
        let new = tree("https://x.test/", vec![new_carousel]);

        let delta = diff_trees(&old, &new).unwrap();
        assert!(delta.is_empty());
        assert_eq!(delta.cosmetics.len(), 1);
        match &delta.cosmetics[0] {
            Cosmetic::Reorder {
                parent,
                identity_set_unchanged,
            } => {
                assert_eq!(*parent, NodeRef(2));
                assert!(identity_set_unchanged);
            }
            other => panic!("unexpected cosmetic {other:?}"),
        }
    }

    #[test]
    fn vision_token_change_is_a_value_change() {
        let mut old_region = node(2, Role::Image, "");
        old_region.origin = NodeOrigin::VisionRegion;
        old_region.vision_token = Some("AAAA".into());
        let old = tree("https://x.test/", vec![old_region.clone()]);

        let mut new_region = old_region.clone();
        new_region.vision_token = Some("BBBB".into());
        let new = tree("https://x.test/", vec![new_region]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.changed[0].field, ChangedField::Value);

        // Identical token with shifted bounds is cosmetic only.
        let mut shifted = old_region.clone();
        shifted.bounds = Some(lens_types::BoundingBox {
            x: 10.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
        });
        let new = tree("https://x.test/", vec![shifted]);
        let delta = diff_trees(&old, &new).unwrap();
        assert!(delta.changed.is_empty());
        assert!(matches!(delta.cosmetics[0], Cosmetic::BoundsOnly { .. }));
    }

    #[test]
    fn duplicate_refs_are_an_invariant_violation() {
        let old = tree(
            "https://x.test/",
            vec![node(2, Role::Button, "A"), node(2, Role::Button, "B")],
        );
        let new = tree("https://x.test/", vec![]);
        assert!(diff_trees(&old, &new).is_err());
    }

    #[test]
    fn navigation_cause_wins_over_everything() {
        let old = tree("https://x.test/a", vec![node(2, Role::Button, "Go")]);
        let new = tree("https://x.test/b", vec![node(2, Role::Button, "Go")]);
        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(derive_cause(&old, &new, &delta), CauseHint::Navigation);
    }

    #[test]
    fn focus_shift_is_classified() {
        let mut old_a = node(2, Role::Textbox, "Email");
        old_a.state.insert(StateFlag::Focused);
        let old_b = node(3, Role::Textbox, "Password");
        let old = tree("https://x.test/", vec![old_a, old_b]);

        let new_a = node(2, Role::Textbox, "Email");
        let mut new_b = node(3, Role::Textbox, "Password");
        new_b.state.insert(StateFlag::Focused);
        let new = tree("https://x.test/", vec![new_a, new_b]);

        let delta = diff_trees(&old, &new).unwrap();
        assert_eq!(derive_cause(&old, &new, &delta), CauseHint::Focus);
    }
}
