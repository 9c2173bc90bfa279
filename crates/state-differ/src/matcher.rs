//! Two-pass tree matcher.
//!
//! Pass A anchors nodes on their identity tuple
//! `(role, normalized_name, parent_role, level)`, order-independently, with
//! sibling-index tie-breaking when fingerprints collide. A reparent pass
//! then anchors nodes whose identity matches modulo the parent role, which
//! is what turns a detach-and-reattach into a `moved` entry instead of a
//! removed/added pair. Pass B runs a bounded bipartite match inside each
//! corresponding parent pair to absorb small renames.

use std::collections::HashMap;

use lens_types::{Node, Role, StateFlag};

/// Maximum fuzzy cost; pairs at or above it stay unmatched.
const COST_REJECT: u32 = 3;

/// Optimal-assignment refinement is applied only to parents with at most
/// this many unmatched children per side; larger groups fall back to the
/// greedy result.
const REFINE_LIMIT: usize = 16;

/// One node of a flattened tree. Hidden nodes (and their subtrees) are
/// excluded before matching.
pub struct FlatNode<'a> {
    pub node: &'a Node,
    pub parent: Option<usize>,
    pub parent_role: Role,
    /// Index among included siblings.
    pub sibling_index: usize,
    /// Ordinal among preceding included siblings with the same role and
    /// name; resolves fingerprint collisions positionally.
    pub run_index: usize,
    pub depth: usize,
}

pub struct FlatTree<'a> {
    pub nodes: Vec<FlatNode<'a>>,
}

impl<'a> FlatTree<'a> {
    /// Flatten a tree depth-first, excluding hidden subtrees. The root is
    /// always index 0 and its parent role is `document`.
    pub fn build(root: &'a Node) -> FlatTree<'a> {
        let mut nodes = Vec::new();
        flatten(root, None, Role::Document, 0, 0, 0, &mut nodes);
        FlatTree { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of the included children of `parent`, in document order.
    pub fn children_of(&self, parent: usize) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(i, _)| i)
            .collect()
    }
}

#[allow(clippy::too_many_arguments)]
fn flatten<'a>(
    node: &'a Node,
    parent: Option<usize>,
    parent_role: Role,
    sibling_index: usize,
    run_index: usize,
    depth: usize,
    out: &mut Vec<FlatNode<'a>>,
) {
    if node.has_flag(StateFlag::Hidden) {
        return;
    }
    let index = out.len();
    out.push(FlatNode {
        node,
        parent,
        parent_role,
        sibling_index,
        run_index,
        depth,
    });

    let mut sibling = 0usize;
    let mut runs: HashMap<(&Role, &str), usize> = HashMap::new();
    for child in &node.children {
        if child.has_flag(StateFlag::Hidden) {
            continue;
        }
        let run = runs.entry((&child.role, child.name.as_str())).or_insert(0);
        let child_run = *run;
        *run += 1;
        flatten(
            child,
            Some(index),
            node.role.clone(),
            sibling,
            child_run,
            depth + 1,
            out,
        );
        sibling += 1;
    }
}

/// Alignment between two flattened trees.
#[derive(Clone, Debug)]
pub struct Matching {
    pub old_to_new: Vec<Option<usize>>,
    pub new_to_old: Vec<Option<usize>>,
    /// Fuzzy cost per matched new node; 0 for anchor matches.
    pub cost: Vec<u32>,
}

impl Matching {
    fn with_capacity(old: usize, new: usize) -> Matching {
        Matching {
            old_to_new: vec![None; old],
            new_to_old: vec![None; new],
            cost: vec![0; new],
        }
    }

    fn record(&mut self, old_idx: usize, new_idx: usize, cost: u32) {
        self.old_to_new[old_idx] = Some(new_idx);
        self.new_to_old[new_idx] = Some(old_idx);
        self.cost[new_idx] = cost;
    }
}

type IdentityKey = (Role, String, Role, Option<u8>);

fn identity_key(node: &FlatNode<'_>) -> IdentityKey {
    (
        node.node.role.clone(),
        node.node.name.clone(),
        node.parent_role.clone(),
        node.node.level,
    )
}

/// Match two flattened trees. Deterministic for fixed inputs.
pub fn match_trees(old: &FlatTree<'_>, new: &FlatTree<'_>) -> Matching {
    let mut matching = Matching::with_capacity(old.len(), new.len());
    if old.is_empty() || new.is_empty() {
        return matching;
    }

    // Both roots are the synthetic document node.
    matching.record(0, 0, 0);

    anchor_pass(old, new, &mut matching);
    reparent_pass(old, new, &mut matching);
    fuzzy_pass(old, new, &mut matching);
    matching
}

/// Pass A: exact identity-tuple matching, order-independent across the
/// whole tree, positional within fingerprint-collision runs.
fn anchor_pass(old: &FlatTree<'_>, new: &FlatTree<'_>, matching: &mut Matching) {
    let mut by_key: HashMap<IdentityKey, Vec<usize>> = HashMap::new();
    for (i, node) in old.nodes.iter().enumerate().skip(1) {
        by_key.entry(identity_key(node)).or_default().push(i);
    }

    // New nodes in DFS order, so parents are matched before children and
    // the parent-correspondence tie-break below can fire.
    for (new_idx, new_node) in new.nodes.iter().enumerate().skip(1) {
        let Some(candidates) = by_key.get(&identity_key(new_node)) else {
            continue;
        };
        let open: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| matching.old_to_new[i].is_none())
            .collect();
        if open.is_empty() {
            continue;
        }
        // Empty names within a collision run match positionally only.
        let open: Vec<usize> = if new_node.node.name.is_empty() {
            open.into_iter()
                .filter(|&i| old.nodes[i].run_index == new_node.run_index)
                .collect()
        } else {
            open
        };
        if let Some(old_idx) = pick_candidate(&open, old, new, new_idx, matching) {
            matching.record(old_idx, new_idx, 0);
        }
    }
}

/// Tie-break colliding anchors: prefer a candidate under the corresponding
/// parent, then the closest sibling index.
fn pick_candidate(
    open: &[usize],
    old: &FlatTree<'_>,
    new: &FlatTree<'_>,
    new_idx: usize,
    matching: &Matching,
) -> Option<usize> {
    if open.is_empty() {
        return None;
    }
    let new_node = &new.nodes[new_idx];
    let old_parent_of_new = new_node
        .parent
        .and_then(|p| matching.new_to_old.get(p).copied().flatten());

    let mut best: Option<(usize, (bool, usize, usize))> = None;
    for &old_idx in open {
        let old_node = &old.nodes[old_idx];
        let same_parent = old_parent_of_new == old_node.parent && old_parent_of_new.is_some();
        let distance = old_node.sibling_index.abs_diff(new_node.sibling_index);
        // Lower rank wins; bool false (same parent) sorts first.
        let rank = (!same_parent, distance, old_idx);
        if best.map_or(true, |(_, b)| rank < b) {
            best = Some((old_idx, rank));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Reparent pass: identity modulo parent role, applied only when the key is
/// unambiguous on both sides. These become `moved` entries downstream.
fn reparent_pass(old: &FlatTree<'_>, new: &FlatTree<'_>, matching: &mut Matching) {
    type MoveKey = (Role, String, Option<u8>);
    let mut old_by_key: HashMap<MoveKey, Vec<usize>> = HashMap::new();
    let mut new_by_key: HashMap<MoveKey, Vec<usize>> = HashMap::new();

    for (i, node) in old.nodes.iter().enumerate().skip(1) {
        if matching.old_to_new[i].is_some() || node.node.name.is_empty() {
            continue;
        }
        let key = (node.node.role.clone(), node.node.name.clone(), node.node.level);
        old_by_key.entry(key).or_default().push(i);
    }
    for (i, node) in new.nodes.iter().enumerate().skip(1) {
        if matching.new_to_old[i].is_some() || node.node.name.is_empty() {
            continue;
        }
        let key = (node.node.role.clone(), node.node.name.clone(), node.node.level);
        new_by_key.entry(key).or_default().push(i);
    }

    for (key, old_indices) in &old_by_key {
        let Some(new_indices) = new_by_key.get(key) else {
            continue;
        };
        if old_indices.len() == 1 && new_indices.len() == 1 {
            matching.record(old_indices[0], new_indices[0], 0);
        }
    }
}

/// Pass B: bipartite fuzzy match among still-unmatched children of each
/// corresponding parent pair.
fn fuzzy_pass(old: &FlatTree<'_>, new: &FlatTree<'_>, matching: &mut Matching) {
    // Parents in ascending depth so that a pair matched here can enable
    // its own children's pair on a later iteration of the loop.
    let mut parent_pairs: Vec<(usize, usize)> = matching
        .new_to_old
        .iter()
        .enumerate()
        .filter_map(|(new_idx, old_idx)| old_idx.map(|o| (o, new_idx)))
        .collect();
    parent_pairs.sort_by_key(|&(_, new_idx)| new.nodes[new_idx].depth);

    let mut cursor = 0;
    while cursor < parent_pairs.len() {
        let (old_parent, new_parent) = parent_pairs[cursor];
        cursor += 1;

        let old_open: Vec<usize> = old
            .children_of(old_parent)
            .into_iter()
            .filter(|&i| matching.old_to_new[i].is_none())
            .collect();
        let new_open: Vec<usize> = new
            .children_of(new_parent)
            .into_iter()
            .filter(|&i| matching.new_to_old[i].is_none())
            .collect();
        if old_open.is_empty() || new_open.is_empty() {
            continue;
        }

        let costs = cost_matrix(&old_open, &new_open, old, new);
        let assignment = if old_open.len() <= REFINE_LIMIT && new_open.len() <= REFINE_LIMIT {
            optimal_assignment(&costs, old_open.len(), new_open.len())
        } else {
            greedy_assignment(&costs, old_open.len(), new_open.len())
        };

        for (o, n) in assignment {
            let (old_idx, new_idx) = (old_open[o], new_open[n]);
            let cost = costs[o][n].unwrap_or(COST_REJECT);
            if cost < COST_REJECT {
                matching.record(old_idx, new_idx, cost);
                parent_pairs.push((old_idx, new_idx));
            }
        }
    }
}

fn cost_matrix(
    old_open: &[usize],
    new_open: &[usize],
    old: &FlatTree<'_>,
    new: &FlatTree<'_>,
) -> Vec<Vec<Option<u32>>> {
    old_open
        .iter()
        .map(|&o| {
            new_open
                .iter()
                .map(|&n| pair_cost(old.nodes[o].node, new.nodes[n].node))
                .collect()
        })
        .collect()
}

/// Fuzzy cost of pairing two nodes. `None` when the pair is implausible.
fn pair_cost(old: &Node, new: &Node) -> Option<u32> {
    let role_eq = old.role == new.role;
    let name_eq = old.name == new.name;
    let mut cost = if role_eq && name_eq {
        0
    } else if role_eq && names_close(&old.name, &new.name) {
        1
    } else if role_eq {
        2
    } else if name_eq && !new.name.is_empty() {
        // Reparenting across semantics; rare.
        2
    } else {
        return None;
    };
    if old.level != new.level {
        cost += 1;
    }
    (cost < COST_REJECT).then_some(cost)
}

/// Edit distance at most 2, or one name a prefix of the other.
fn names_close(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.starts_with(b) || b.starts_with(a) {
        return true;
    }
    bounded_edit_distance(a, b, 2).is_some()
}

/// Levenshtein distance when it is at most `bound`.
fn bounded_edit_distance(a: &str, b: &str, bound: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > bound {
        return None;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];
        for (j, &cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitute.min(prev[j + 1] + 1).min(current[j] + 1);
            row_min = row_min.min(current[j + 1]);
        }
        if row_min > bound {
            return None;
        }
        std::mem::swap(&mut prev, &mut current);
    }
    (prev[b.len()] <= bound).then_some(prev[b.len()])
}

/// Greedy lowest-cost-first assignment for oversized sibling groups.
fn greedy_assignment(
    costs: &[Vec<Option<u32>>],
    old_len: usize,
    new_len: usize,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(u32, usize, usize)> = Vec::new();
    for o in 0..old_len {
        for n in 0..new_len {
            if let Some(c) = costs[o][n] {
                pairs.push((c, o, n));
            }
        }
    }
    pairs.sort();
    let mut used_old = vec![false; old_len];
    let mut used_new = vec![false; new_len];
    let mut out = Vec::new();
    for (_, o, n) in pairs {
        if !used_old[o] && !used_new[n] {
            used_old[o] = true;
            used_new[n] = true;
            out.push((o, n));
        }
    }
    out
}

/// Exact assignment maximizing match count, then minimizing total cost.
/// Bitmask DP over the old side, which pass B bounds at 16.
fn optimal_assignment(
    costs: &[Vec<Option<u32>>],
    old_len: usize,
    new_len: usize,
) -> Vec<(usize, usize)> {
    if old_len == 0 || new_len == 0 {
        return Vec::new();
    }
    let full = 1usize << old_len;
    const UNSET: (i32, u32) = (i32::MIN, u32::MAX);
    // dp[mask] = best (matches, cost) over a prefix of new nodes with
    // `mask` of old nodes consumed; choices recorded for reconstruction.
    let mut choice: Vec<Vec<Option<(usize, usize)>>> = Vec::new();
    let mut prev_dp: Vec<(i32, u32)> = vec![UNSET; full];
    prev_dp[0] = (0, 0);
    for n in 0..new_len {
        let mut next_dp: Vec<(i32, u32)> = vec![UNSET; full];
        let mut step_choice: Vec<Option<(usize, usize)>> = vec![None; full];
        for mask in 0..full {
            let (matches, cost) = prev_dp[mask];
            if matches == i32::MIN {
                continue;
            }
            // Leave new node n unmatched.
            if better(next_dp[mask], (matches, cost)) {
                next_dp[mask] = (matches, cost);
                step_choice[mask] = None;
            }
            // Match n to any free old node.
            for o in 0..old_len {
                if mask & (1 << o) != 0 {
                    continue;
                }
                if let Some(c) = costs[o][n] {
                    let candidate = (matches + 1, cost + c);
                    let new_mask = mask | (1 << o);
                    if better(next_dp[new_mask], candidate) {
                        next_dp[new_mask] = candidate;
                        step_choice[new_mask] = Some((o, mask));
                    }
                }
            }
        }
        choice.push(step_choice);
        prev_dp = next_dp;
    }

    // Best terminal state.
    let mut best_mask = 0;
    for mask in 0..full {
        if better(prev_dp[best_mask], prev_dp[mask]) {
            best_mask = mask;
        }
    }

    // Walk back through the per-step choices.
    let mut out = Vec::new();
    let mut mask = best_mask;
    for n in (0..new_len).rev() {
        if let Some((o, prev_mask)) = choice[n][mask] {
            out.push((o, n));
            mask = prev_mask;
        }
    }
    out.reverse();
    out
}

/// Is `candidate` strictly better than `current`? More matches first, then
/// lower cost.
fn better(current: (i32, u32), candidate: (i32, u32)) -> bool {
    if current.0 == i32::MIN {
        return candidate.0 != i32::MIN;
    }
    if candidate.0 == i32::MIN {
        return false;
    }
    candidate.0 > current.0 || (candidate.0 == current.0 && candidate.1 < current.1)
}
