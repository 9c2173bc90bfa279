//! Vision extraction: a single full-page vision-region leaf.

use tracing::debug;

use lens_types::{Node, NodeOrigin, Role, StateTree};
use page_port::PageDriver;

use crate::hybrid::vision_leaf;
use crate::Result;

pub async fn extract(page: &dyn PageDriver) -> Result<StateTree> {
    let shot = page.screenshot(None).await?;
    let title = page.title().await.unwrap_or_default();

    let mut root = Node::new(Role::Document, "", NodeOrigin::A11y);
    root.children.push(vision_leaf(shot.rect, &shot.data));

    debug!(url = %page.url(), "extracted vision tree");
    Ok(StateTree::new(
        page.url(),
        title,
        lens_types::RepresentationKind::Vision,
        root,
    ))
}
