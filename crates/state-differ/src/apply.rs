//! Reference interpreter: replay a delta on top of the tree it was
//! computed from. Exists to make the differ testable against its own
//! output; sibling order of moved nodes is not tracked and therefore not
//! reproduced.

use serde_json::Value;

use lens_types::{ChangedField, Delta, Node, NodeRef, StateFlag, StateTree};

use crate::errors::{DiffError, Result};

/// Apply `delta` to `old`, producing the successor tree up to the tracked
/// fields.
pub fn apply(old: &StateTree, delta: &Delta) -> Result<StateTree> {
    let mut tree = old.clone();

    // Detach moved subtrees first: their old parent may itself be removed.
    let mut detached: Vec<(NodeRef, Node)> = Vec::new();
    for mv in &delta.moved {
        let node = remove_subtree(&mut tree.root, mv.ref_id).ok_or_else(|| {
            DiffError::UnknownRef(format!("moved node {} not in tree", mv.ref_id))
        })?;
        detached.push((mv.new_parent, node));
    }

    for &ref_id in &delta.removed {
        remove_subtree(&mut tree.root, ref_id)
            .ok_or_else(|| DiffError::UnknownRef(format!("removed node {} not in tree", ref_id)))?;
    }

    for (new_parent, node) in detached {
        let parent = find_mut(&mut tree.root, new_parent).ok_or_else(|| {
            DiffError::UnknownRef(format!("move target {} not in tree", new_parent))
        })?;
        parent.children.push(node);
    }

    for change in &delta.changed {
        let node = find_mut(&mut tree.root, change.ref_id).ok_or_else(|| {
            DiffError::UnknownRef(format!("changed node {} not in tree", change.ref_id))
        })?;
        set_field(node, change.field, &change.new);
    }

    for added in &delta.added {
        let parent = find_mut(&mut tree.root, added.parent).ok_or_else(|| {
            DiffError::UnknownRef(format!("add anchor {} not in tree", added.parent))
        })?;
        let position = added.position.min(parent.children.len());
        parent.children.insert(position, added.subtree.clone());
    }

    Ok(tree)
}

fn set_field(node: &mut Node, field: ChangedField, value: &Value) {
    match field {
        ChangedField::Name => {
            if let Some(s) = value.as_str() {
                node.name = s.to_string();
            }
        }
        ChangedField::Value => {
            node.value = value.as_str().map(str::to_string);
        }
        ChangedField::State => {
            node.state = value
                .as_array()
                .map(|flags| {
                    flags
                        .iter()
                        .filter_map(|f| f.as_str())
                        .filter_map(StateFlag::parse)
                        .collect()
                })
                .unwrap_or_default();
        }
        ChangedField::Level => {
            node.level = value.as_u64().and_then(|l| u8::try_from(l).ok());
        }
    }
}

fn remove_subtree(node: &mut Node, target: NodeRef) -> Option<Node> {
    if let Some(i) = node.children.iter().position(|c| c.ref_id == target) {
        return Some(node.children.remove(i));
    }
    for child in &mut node.children {
        if let Some(found) = remove_subtree(child, target) {
            return Some(found);
        }
    }
    None
}

fn find_mut(node: &mut Node, target: NodeRef) -> Option<&mut Node> {
    if node.ref_id == target {
        return Some(node);
    }
    for child in &mut node.children {
        if let Some(found) = find_mut(child, target) {
            return Some(found);
        }
    }
    None
}

/// Compare two trees over the tracked fields (ref, name, value, state,
/// level) with order-insensitive children and hidden subtrees ignored.
/// Role is intentionally not compared: it is not a tracked delta field.
pub fn trees_equivalent(a: &StateTree, b: &StateTree) -> bool {
    match (canonical(&a.root), canonical(&b.root)) {
        (Some(ca), Some(cb)) => ca == cb,
        (None, None) => true,
        _ => false,
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug)]
struct CanonicalNode {
    ref_id: u32,
    name: String,
    value: Option<String>,
    state: Vec<String>,
    level: Option<u8>,
    children: Vec<CanonicalNode>,
}

fn canonical(node: &Node) -> Option<CanonicalNode> {
    if node.has_flag(StateFlag::Hidden) {
        return None;
    }
    let mut children: Vec<CanonicalNode> = node.children.iter().filter_map(canonical).collect();
    children.sort();
    Some(CanonicalNode {
        ref_id: node.ref_id.0,
        name: node.name.clone(),
        value: node
            .value
            .as_deref()
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ")),
        state: node.state.iter().map(|f| format!("{f:?}")).collect(),
        level: node.level,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_trees;
    use lens_types::{NodeOrigin, RepresentationKind, Role};

    fn node(ref_id: u32, role: Role, name: &str) -> Node {
        let mut n = Node::new(role, name, NodeOrigin::A11y);
        n.ref_id = NodeRef(ref_id);
        n
    }

    fn tree(children: Vec<Node>) -> StateTree {
        let mut root = node(1, Role::Document, "");
        root.children = children;
        StateTree::new("https://x.test/", "", RepresentationKind::A11y, root)
    }

    fn roundtrip(old: &StateTree, new: &StateTree) {
        let delta = diff_trees(old, new).unwrap();
        let replayed = apply(old, &delta).unwrap();
        assert!(
            trees_equivalent(&replayed, new),
            "replayed {replayed:#?} != expected {new:#?}"
        );
    }

    #[test]
    fn roundtrip_value_change() {
        let mut old_box = node(2, Role::Textbox, "Search");
        old_box.value = Some(String::new());
        let old = tree(vec![old_box, node(3, Role::Button, "Go")]);

        let mut new_box = node(2, Role::Textbox, "Search");
        new_box.value = Some("laptop".into());
        let new = tree(vec![new_box, node(3, Role::Button, "Go")]);
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_added_subtree() {
        let old = tree(vec![node(2, Role::Main, "")]);
        let mut dialog = node(3, Role::Dialog, "Confirm");
        dialog.children.push(node(4, Role::Button, "Yes"));
        dialog.children.push(node(5, Role::Button, "No"));
        let new = tree(vec![node(2, Role::Main, ""), dialog]);
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_removal() {
        let mut main = node(2, Role::Main, "");
        main.children.push(node(3, Role::Button, "Temporary"));
        let old = tree(vec![main]);
        let new = tree(vec![node(2, Role::Main, "")]);
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_move_with_change() {
        let mut old_nav = node(2, Role::Navigation, "");
        let mut link = node(4, Role::Link, "Cart (0)");
        link.value = Some("0".into());
        old_nav.children.push(link);
        let old = tree(vec![old_nav, node(3, Role::Banner, "")]);

        let mut new_banner = node(3, Role::Banner, "");
        let mut moved_link = node(4, Role::Link, "Cart (0)");
        moved_link.value = Some("3".into());
        new_banner.children.push(moved_link);
        let new = tree(vec![node(2, Role::Navigation, ""), new_banner]);
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_everything_at_once() {
        let mut old_nav = node(2, Role::Navigation, "Site");
        old_nav.children.push(node(3, Role::Link, "Home"));
        old_nav.children.push(node(4, Role::Link, "Contact"));
        let mut old_main = node(5, Role::Main, "");
        let mut old_box = node(6, Role::Textbox, "Email");
        old_box.value = Some(String::new());
        old_main.children.push(old_box);
        let old = tree(vec![old_nav, old_main]);

        // Contact link removed, email value typed, button added.
        let mut new_nav = node(2, Role::Navigation, "Site");
        new_nav.children.push(node(3, Role::Link, "Home"));
        let mut new_main = node(5, Role::Main, "");
        let mut new_box = node(6, Role::Textbox, "Email");
        new_box.value = Some("a@b.c".into());
        new_main.children.push(new_box);
        new_main.children.push(node(7, Role::Button, "Subscribe"));
        let new = tree(vec![new_nav, new_main]);
        roundtrip(&old, &new);
    }

    #[test]
    fn coverage_every_node_is_accounted_for() {
        let mut old_main = node(2, Role::Main, "");
        old_main.children.push(node(3, Role::Button, "Stays"));
        old_main.children.push(node(4, Role::Button, "Goes"));
        let old = tree(vec![old_main]);

        let mut new_main = node(2, Role::Main, "");
        new_main.children.push(node(3, Role::Button, "Stays"));
        new_main.children.push(node(5, Role::Link, "Arrives"));
        let new = tree(vec![new_main]);

        let delta = diff_trees(&old, &new).unwrap();

        // Old side: every non-root node is removed, changed/moved, or stable.
        let removed: Vec<u32> = delta.removed.iter().map(|r| r.0).collect();
        assert_eq!(removed, vec![4]);
        let stable = delta.unchanged_summary.stable_total();
        // main + "Stays" are stable; "Goes" removed; "Arrives" added.
        assert_eq!(stable, 2);
        assert_eq!(delta.added.len(), 1);

        let old_accounted = removed.len() + stable + delta.changed.len() + delta.moved.len();
        assert_eq!(old_accounted, old.node_count() - 1);
        let added_nodes: usize = delta
            .added
            .iter()
            .map(|a| count_nodes(&a.subtree))
            .sum();
        let new_accounted = added_nodes + stable + delta.changed.len() + delta.moved.len();
        assert_eq!(new_accounted, new.node_count() - 1);
    }

    fn count_nodes(node: &Node) -> usize {
        1 + node.children.iter().map(count_nodes).sum::<usize>()
    }
}
