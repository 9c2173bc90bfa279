//! Cross-module properties of the differ pipeline: determinism, coverage,
//! apply-roundtrip, and noise idempotence over realistic step sequences.

use std::collections::HashMap;

use lens_types::{Node, NodeOrigin, NodeRef, RepresentationKind, Role, StateFlag, StateTree};
use state_differ::{
    apply, diff_trees, match_trees, trees_equivalent, FlatTree, RefManager, SemanticFilter,
};

fn node(role: Role, name: &str) -> Node {
    Node::new(role, name, NodeOrigin::A11y)
}

fn tree(children: Vec<Node>) -> StateTree {
    let mut root = node(Role::Document, "");
    root.children = children;
    StateTree::new("https://shop.test/", "Shop", RepresentationKind::A11y, root)
}

/// A mid-size page: navigation, a search form, a product list.
fn shop_page(query: &str, cart_items: usize, product_count: usize) -> StateTree {
    let mut nav = node(Role::Navigation, "Site");
    nav.children.push(node(Role::Link, "Home"));
    nav.children
        .push(node(Role::Link, &format!("Cart ({cart_items})")));

    let mut form = node(Role::Form, "");
    let mut search = node(Role::Searchbox, "Search products");
    search.value = Some(query.to_string());
    form.children.push(search);
    form.children.push(node(Role::Button, "Go"));

    let mut list = node(Role::List, "Results");
    for i in 0..product_count {
        let mut item = node(Role::ListItem, "");
        item.children
            .push(node(Role::Link, &format!("Product {i}")));
        item.children
            .push(node(Role::Button, "Add to cart"));
        list.children.push(item);
    }

    tree(vec![nav, form, list])
}

/// Assign refs the way the orchestrator does: match against the previous
/// tree, reuse matched refs, allocate the rest.
fn assign_refs(refs: &mut RefManager, prev: Option<&StateTree>, tree: &mut StateTree) {
    let reuse: HashMap<usize, NodeRef> = match prev {
        Some(prev) => {
            let old_flat = FlatTree::build(&prev.root);
            let new_flat = FlatTree::build(&tree.root);
            let matching = match_trees(&old_flat, &new_flat);
            matching
                .new_to_old
                .iter()
                .enumerate()
                .filter_map(|(n, o)| o.map(|o| (n, old_flat.nodes[o].node.ref_id)))
                .collect()
        }
        None => HashMap::new(),
    };
    refs.assign(tree, &reuse);
}

#[test]
fn differ_is_deterministic() {
    let mut refs = RefManager::new(65_535);
    let mut old = shop_page("", 0, 5);
    assign_refs(&mut refs, None, &mut old);
    let mut new = shop_page("laptop", 2, 7);
    assign_refs(&mut refs, Some(&old), &mut new);

    let first = diff_trees(&old, &new).unwrap();
    for _ in 0..5 {
        let again = diff_trees(&old, &new).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn apply_roundtrip_over_a_step_sequence() {
    let mut refs = RefManager::new(65_535);
    let mut prev = shop_page("", 0, 4);
    assign_refs(&mut refs, None, &mut prev);

    let steps = [
        shop_page("lap", 0, 4),
        shop_page("laptop", 0, 6),
        shop_page("laptop", 1, 6),
        shop_page("laptop", 1, 2),
    ];
    for next in steps {
        let mut next = next;
        assign_refs(&mut refs, Some(&prev), &mut next);
        let delta = diff_trees(&prev, &next).unwrap();
        let replayed = apply(&prev, &delta).unwrap();
        assert!(
            trees_equivalent(&replayed, &next),
            "delta replay diverged from the observed tree"
        );
        prev = next;
    }
}

#[test]
fn coverage_accounts_for_every_node() {
    let mut refs = RefManager::new(65_535);
    let mut old = shop_page("", 2, 6);
    assign_refs(&mut refs, None, &mut old);
    let mut new = shop_page("phone", 3, 3);
    assign_refs(&mut refs, Some(&old), &mut new);

    let delta = diff_trees(&old, &new).unwrap();

    fn count(node: &Node) -> usize {
        1 + node.children.iter().map(count).sum::<usize>()
    }
    let removed_nodes: usize = delta
        .removed
        .iter()
        .map(|r| old.find(*r).map(count).unwrap_or(0))
        .sum();
    let added_nodes: usize = delta.added.iter().map(|a| count(&a.subtree)).sum();
    let stable = delta.unchanged_summary.stable_total();

    // Changed refs, counted once per node rather than once per field.
    let changed_nodes = {
        let mut refs: Vec<NodeRef> = delta.changed.iter().map(|c| c.ref_id).collect();
        refs.sort();
        refs.dedup();
        // Entries for nodes that also moved are classified under moved.
        refs.retain(|r| !delta.moved.iter().any(|m| m.ref_id == *r));
        refs.len()
    };

    assert_eq!(
        stable + changed_nodes + delta.moved.len() + removed_nodes,
        old.node_count() - 1,
        "old-side coverage"
    );
    assert_eq!(
        stable + changed_nodes + delta.moved.len() + added_nodes,
        new.node_count() - 1,
        "new-side coverage"
    );
}

#[test]
fn filter_is_idempotent_over_mixed_noise() {
    let mut refs = RefManager::new(65_535);

    let mut status = node(Role::Status, "0 notifications");
    status.live = Some("polite".into());
    let mut clock = node(Role::Text, "09:41");
    clock.live = None;
    let mut button = node(Role::Button, "Send");
    button.state.insert(StateFlag::Disabled);
    let mut old = tree(vec![status, clock, button]);
    assign_refs(&mut refs, None, &mut old);

    let mut status = node(Role::Status, "3 notifications");
    status.live = Some("polite".into());
    let clock = node(Role::Text, "09:42");
    let button = node(Role::Button, "Send");
    let mut new = tree(vec![status, clock, button]);
    assign_refs(&mut refs, Some(&old), &mut new);

    let delta = diff_trees(&old, &new).unwrap();
    let filter = SemanticFilter::defaults();
    let once = filter.apply(delta, &old, &new);

    // Status and clock churn are gone; the enabled button survives.
    assert_eq!(once.changed.len(), 1);
    assert_eq!(once.unchanged_summary.noise, 2);

    let twice = filter.apply(once.clone(), &old, &new);
    assert_eq!(twice, once);
}

#[test]
fn hidden_nodes_never_reach_the_delta() {
    let mut refs = RefManager::new(65_535);
    let mut old = tree(vec![node(Role::Main, "")]);
    assign_refs(&mut refs, None, &mut old);

    let mut hidden_dialog = node(Role::Dialog, "Prefetched modal");
    hidden_dialog.state.insert(StateFlag::Hidden);
    hidden_dialog.children.push(node(Role::Button, "Ok"));
    let mut new = tree(vec![node(Role::Main, ""), hidden_dialog]);
    assign_refs(&mut refs, Some(&old), &mut new);

    let delta = diff_trees(&old, &new).unwrap();
    assert!(delta.is_empty(), "hidden subtree must be invisible to the diff");
}
