use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeRef, Role};
use crate::signals::RepresentationKind;

/// A rooted, ordered tree representing the page at one observation.
///
/// Child order reflects accessibility-tree order, which reflects document
/// reading order. The root is always present even when its single child is
/// the entire body subtree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTree {
    pub url: String,
    pub title: String,
    pub representation: RepresentationKind,
    pub root: Node,
}

impl StateTree {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        representation: RepresentationKind,
        root: Node,
    ) -> StateTree {
        StateTree {
            url: url.into(),
            title: title.into(),
            representation,
            root,
        }
    }

    /// Depth-first iteration over every node, root first.
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter {
            stack: vec![&self.root],
        }
    }

    /// Depth-first iteration paired with each node's parent.
    pub fn iter_with_parent(&self) -> impl Iterator<Item = (&Node, Option<&Node>)> {
        let mut out = Vec::new();
        collect_with_parent(&self.root, None, &mut out);
        out.into_iter()
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn find(&self, ref_id: NodeRef) -> Option<&Node> {
        self.iter().find(|n| n.ref_id == ref_id)
    }

    /// Root-to-node ref path for `ref_id`, excluding the node itself.
    /// `None` when the ref is not in the tree.
    pub fn ancestor_path(&self, ref_id: NodeRef) -> Option<Vec<&Node>> {
        fn walk<'a>(node: &'a Node, target: NodeRef, path: &mut Vec<&'a Node>) -> bool {
            if node.ref_id == target {
                return true;
            }
            path.push(node);
            for child in &node.children {
                if walk(child, target, path) {
                    return true;
                }
            }
            path.pop();
            false
        }
        let mut path = Vec::new();
        walk(&self.root, ref_id, &mut path).then_some(path)
    }

    /// The root's child subtree containing `ref_id`, i.e. the top-level
    /// region the node belongs to. The root itself for direct children.
    pub fn region_of(&self, ref_id: NodeRef) -> Option<&Node> {
        if self.root.ref_id == ref_id {
            return Some(&self.root);
        }
        for child in &self.root.children {
            if subtree_contains(child, ref_id) {
                return Some(child);
            }
        }
        None
    }
}

fn subtree_contains(node: &Node, ref_id: NodeRef) -> bool {
    node.ref_id == ref_id || node.children.iter().any(|c| subtree_contains(c, ref_id))
}

fn collect_with_parent<'a>(
    node: &'a Node,
    parent: Option<&'a Node>,
    out: &mut Vec<(&'a Node, Option<&'a Node>)>,
) {
    out.push((node, parent));
    for child in &node.children {
        collect_with_parent(child, Some(node), out);
    }
}

pub struct TreeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Label used for a region in the unchanged roll-up: accessible name when
/// present, role otherwise.
pub fn region_label(node: &Node) -> String {
    if node.name.is_empty() {
        node.role.to_string()
    } else {
        node.name.clone()
    }
}

/// Convenience for tests and fixtures.
pub fn document_root() -> Node {
    Node::new(Role::Document, "", crate::node::NodeOrigin::A11y)
}
