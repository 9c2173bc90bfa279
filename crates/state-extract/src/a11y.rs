//! Accessibility-tree extraction.

use tracing::debug;

use lens_types::{Node, NodeOrigin, Role, StateFlag, StateTree};
use page_port::{AxNode, AxSnapshotOptions, PageDriver};

use crate::normalize::normalize_text;
use crate::{ExtractOptions, Result};

/// Browser-internal role names mapped onto the normalized vocabulary.
const INTERNAL_ROLES: &[(&str, &str)] = &[
    ("RootWebArea", "document"),
    ("StaticText", "text"),
    ("LineBreak", "text"),
    ("InlineTextBox", "text"),
    ("GenericContainer", "generic"),
    ("LayoutTable", "table"),
    ("LayoutTableRow", "row"),
    ("LayoutTableCell", "cell"),
    ("img", "image"),
];

pub async fn extract(page: &dyn PageDriver, options: &ExtractOptions) -> Result<StateTree> {
    let snapshot = page
        .accessibility_snapshot(AxSnapshotOptions::default())
        .await?;
    let title = page.title().await.unwrap_or_default();
    let root = build_root(&snapshot, options);
    debug!(url = %page.url(), "extracted a11y tree");
    Ok(StateTree::new(
        page.url(),
        title,
        lens_types::RepresentationKind::A11y,
        root,
    ))
}

/// Wrap the converted snapshot under a synthetic `document` root. When the
/// browser's own root is already a document, its content is lifted directly.
pub(crate) fn build_root(snapshot: &AxNode, options: &ExtractOptions) -> Node {
    let mut root = Node::new(Role::Document, "", NodeOrigin::A11y);
    if map_role(&snapshot.role) == Role::Document {
        root.name = normalize_text(&snapshot.name, options.name_cap);
        attach_children(&mut root, &snapshot.children, options);
    } else {
        attach_children(&mut root, std::slice::from_ref(snapshot), options);
    }
    root
}

/// Convert raw children onto `parent`, collapsing ignored and
/// presentational nodes into it.
fn attach_children(parent: &mut Node, raw_children: &[AxNode], options: &ExtractOptions) {
    for raw in raw_children {
        let role = map_role(&raw.role);
        if raw.ignored || role.is_presentational() {
            attach_children(parent, &raw.children, options);
            continue;
        }
        let node = convert(raw, role, options);
        if is_interesting(&node) {
            parent.children.push(node);
        }
    }
}

fn convert(raw: &AxNode, role: Role, options: &ExtractOptions) -> Node {
    let mut node = Node::new(role, normalize_text(&raw.name, options.name_cap), NodeOrigin::A11y);
    node.value = raw.value.clone();
    node.level = raw.level;
    node.bounds = raw.bounds;
    node.live = raw
        .live
        .as_deref()
        .filter(|l| !l.is_empty() && *l != "off" && *l != "none")
        .map(str::to_string);
    for flag in &raw.flags {
        if let Some(parsed) = StateFlag::parse(flag) {
            node.state.insert(parsed);
        }
    }
    attach_children(&mut node, &raw.children, options);
    node
}

fn map_role(raw: &str) -> Role {
    for (internal, normalized) in INTERNAL_ROLES {
        if raw == *internal {
            return Role::parse(normalized);
        }
    }
    Role::parse(&raw.to_ascii_lowercase())
}

/// Structural wrappers with no name and no children carry nothing.
fn is_interesting(node: &Node) -> bool {
    if !matches!(node.role, Role::Generic | Role::Text | Role::Document) {
        return true;
    }
    !node.name.is_empty() || !node.children.is_empty()
}
