//! Target re-resolution against a fresh state tree.
//!
//! When every recorded selector misses, the page has drifted since the
//! trace was recorded. The healer looks the element up again by role and
//! name in the latest observed tree and derives fresh selectors from
//! whatever node it finds.

use lens_types::{Node, Role, StateTree};
use tracing::debug;

use crate::model::ElementTarget;
use crate::selectors::build_target;

/// Find the recorded element in a fresh tree and rebuild its selectors.
pub fn reresolve(tree: &StateTree, target: &ElementTarget) -> Option<ElementTarget> {
    let found = find_by_role_name(&tree.root, &target.role, &target.name)
        .or_else(|| find_by_name_prefix(&tree.root, &target.role, &target.name))?;
    debug!(
        role = %found.role,
        name = %found.name,
        "healed target from fresh tree"
    );
    Some(build_target(found))
}

fn find_by_role_name<'a>(node: &'a Node, role: &Role, name: &str) -> Option<&'a Node> {
    if &node.role == role && node.name == name {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|c| find_by_role_name(c, role, name))
}

/// Fallback for drifting labels: same role, recorded name is a prefix of
/// the current one or vice versa.
fn find_by_name_prefix<'a>(node: &'a Node, role: &Role, name: &str) -> Option<&'a Node> {
    if name.is_empty() {
        return None;
    }
    if &node.role == role
        && !node.name.is_empty()
        && (node.name.starts_with(name) || name.starts_with(&node.name))
    {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|c| find_by_name_prefix(c, role, name))
}
