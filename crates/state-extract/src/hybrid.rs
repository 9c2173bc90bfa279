//! Hybrid extraction: a11y tree plus vision-region leaves for canvas areas.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use lens_types::{BoundingBox, Node, NodeOrigin, Role, Signals, StateTree};
use page_port::PageDriver;

use crate::{a11y, ExtractOptions, Result};

/// Roles a vision-region leaf may be anchored under.
const ANCHOR_ROLES: &[Role] = &[Role::Region, Role::Main, Role::Figure, Role::Application];

pub async fn extract(
    page: &dyn PageDriver,
    signals: &Signals,
    options: &ExtractOptions,
) -> Result<StateTree> {
    let mut tree = a11y::extract(page, options).await?;
    tree.representation = lens_types::RepresentationKind::Hybrid;

    for region in &signals.canvas_regions {
        let shot = match page.screenshot(Some(*region)).await {
            Ok(shot) => shot,
            Err(err) => {
                warn!(%err, "canvas screenshot failed; skipping region");
                continue;
            }
        };
        let leaf = vision_leaf(shot.rect, &shot.data);
        attach_under_anchor(&mut tree.root, leaf);
    }

    debug!(
        url = %tree.url,
        regions = signals.canvas_regions.len(),
        "extracted hybrid tree"
    );
    Ok(tree)
}

/// A vision-region leaf: bounds always set, never any children.
pub(crate) fn vision_leaf(rect: BoundingBox, data: &[u8]) -> Node {
    let mut leaf = Node::new(Role::Image, "", NodeOrigin::VisionRegion);
    leaf.bounds = Some(rect);
    leaf.vision_token = Some(BASE64.encode(data));
    leaf
}

/// Attach `leaf` under the deepest anchor-role ancestor whose bounds contain
/// the region center; the root when no anchor qualifies.
pub(crate) fn attach_under_anchor(root: &mut Node, leaf: Node) {
    let target = match leaf.bounds {
        Some(bounds) => bounds,
        None => {
            root.children.push(leaf);
            return;
        }
    };
    match find_anchor(root, &target) {
        Some(anchor) => anchor.children.push(leaf),
        None => root.children.push(leaf),
    }
}

fn find_anchor<'a>(node: &'a mut Node, target: &BoundingBox) -> Option<&'a mut Node> {
    let path = find_anchor_path(node, target)?;
    let mut current = node;
    for idx in path {
        current = &mut current.children[idx];
    }
    Some(current)
}

/// Locate the deepest anchor-role node whose bounds contain the target's
/// center, returning the child-index path from `node` down to it.
fn find_anchor_path(node: &Node, target: &BoundingBox) -> Option<Vec<usize>> {
    for (idx, child) in node.children.iter().enumerate() {
        if let Some(mut path) = find_anchor_path(child, target) {
            path.insert(0, idx);
            return Some(path);
        }
    }
    let qualifies = ANCHOR_ROLES.contains(&node.role)
        && node
            .bounds
            .map_or(false, |bounds| bounds.contains_center_of(target));
    qualifies.then(Vec::new)
}
