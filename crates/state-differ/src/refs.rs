//! Session-wide `@eN` reference manager.
//!
//! Maintains a bijection between semantic identities and short ref tokens.
//! A ref reused across steps always names the same semantic node: reuse
//! happens either through the matcher (the node was declared equivalent to
//! one in the previous tree) or through an exact identity-tuple hit in the
//! session index. Refs freed by removal are never recycled.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use lens_types::{Identity, Node, NodeRef, Role, StateFlag, StateTree};

pub struct RefManager {
    next: u32,
    cap: u32,
    identities: HashMap<NodeRef, Identity>,
    by_identity: HashMap<Identity, NodeRef>,
}

/// Outcome of one assignment pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RefAssignment {
    /// The session cap was hit and the table was rebuilt from the current
    /// tree; the diff for this step is invalid and the orchestrator must
    /// emit a full state.
    pub compacted: bool,
}

impl RefManager {
    pub fn new(cap: u32) -> Self {
        Self {
            next: 1,
            cap,
            identities: HashMap::new(),
            by_identity: HashMap::new(),
        }
    }

    /// Total refs allocated this session.
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }

    pub fn identity_of(&self, ref_id: NodeRef) -> Option<&Identity> {
        self.identities.get(&ref_id)
    }

    pub fn reset(&mut self) {
        self.next = 1;
        self.identities.clear();
        self.by_identity.clear();
    }

    /// Assign a ref to every node of `tree`.
    ///
    /// `reuse` maps flattened (hidden-excluded, DFS) node positions to the
    /// ref of the previous-tree node the matcher declared equivalent.
    /// Nodes without a matcher verdict fall back to the session identity
    /// index, then to a fresh allocation.
    pub fn assign(&mut self, tree: &mut StateTree, reuse: &HashMap<usize, NodeRef>) -> RefAssignment {
        let mut used: HashSet<NodeRef> = HashSet::new();
        let mut flat_idx = 0usize;
        let overflow = self.walk(
            &mut tree.root,
            Role::Document,
            false,
            true,
            reuse,
            &mut used,
            &mut flat_idx,
        );

        if overflow {
            warn!(cap = self.cap, "ref session cap hit; compacting to current tree");
            self.reset();
            let mut used = HashSet::new();
            let mut flat_idx = 0usize;
            let empty = HashMap::new();
            // The rebuild ignores the cap: every node of the current tree
            // must end up with a ref.
            self.walk(
                &mut tree.root,
                Role::Document,
                false,
                false,
                &empty,
                &mut used,
                &mut flat_idx,
            );
            return RefAssignment { compacted: true };
        }
        debug!(allocated = self.allocated(), "assigned refs");
        RefAssignment::default()
    }

    /// Returns true on cap overflow, which aborts the pass.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        node: &mut Node,
        parent_role: Role,
        in_hidden: bool,
        enforce_cap: bool,
        reuse: &HashMap<usize, NodeRef>,
        used: &mut HashSet<NodeRef>,
        flat_idx: &mut usize,
    ) -> bool {
        let hidden = in_hidden || node.has_flag(StateFlag::Hidden);
        let identity = node.identity(parent_role.clone());

        let matched = if hidden {
            // Hidden subtrees are invisible to the matcher and consume no
            // flattened positions.
            None
        } else {
            let r = reuse.get(flat_idx).copied();
            *flat_idx += 1;
            r
        };

        let ref_id = match matched {
            Some(r) if !used.contains(&r) => r,
            _ => match self.by_identity.get(&identity) {
                Some(&r) if !used.contains(&r) => r,
                _ => {
                    if enforce_cap && self.next > self.cap {
                        return true;
                    }
                    let r = NodeRef(self.next);
                    self.next += 1;
                    r
                }
            },
        };
        used.insert(ref_id);
        self.bind(ref_id, identity);
        node.ref_id = ref_id;

        let own_role = node.role.clone();
        for child in &mut node.children {
            if self.walk(child, own_role.clone(), hidden, enforce_cap, reuse, used, flat_idx) {
                return true;
            }
        }
        false
    }

    /// Point `ref_id` at `identity`, dropping any stale reverse binding.
    fn bind(&mut self, ref_id: NodeRef, identity: Identity) {
        if let Some(previous) = self.identities.insert(ref_id, identity.clone()) {
            if previous != identity {
                if self.by_identity.get(&previous) == Some(&ref_id) {
                    self.by_identity.remove(&previous);
                }
            }
        }
        self.by_identity.entry(identity).or_insert(ref_id);
    }

    /// The wire-level refs map for a tree: every ref in it with its
    /// identity tuple.
    pub fn refs_map(&self, tree: &StateTree) -> std::collections::BTreeMap<NodeRef, Identity> {
        let mut out = std::collections::BTreeMap::new();
        for (node, parent) in tree.iter_with_parent() {
            let parent_role = parent.map(|p| p.role.clone()).unwrap_or(Role::Document);
            out.insert(node.ref_id, node.identity(parent_role));
        }
        out
    }
}
