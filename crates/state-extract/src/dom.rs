//! Distilled-DOM extraction.
//!
//! Keeps only elements that are visible or interactive, with a fixed
//! attribute subset per node. Layout wrappers are collapsed into the
//! nearest kept ancestor.

use tracing::debug;

use lens_types::{Node, NodeOrigin, Role, StateFlag, StateTree};
use page_port::{DomNode, DomWalkOptions, PageDriver};

use crate::normalize::normalize_text;
use crate::{ExtractOptions, Result};

/// Data attributes preserved on distilled nodes, plus the tag itself.
const KEPT_ATTRS: &[&str] = &["data-testid", "name", "type"];

pub async fn extract(page: &dyn PageDriver, options: &ExtractOptions) -> Result<StateTree> {
    let body = page.dom_walk(DomWalkOptions::default()).await?;
    let title = page.title().await.unwrap_or_default();
    let root = build_root(&body, options);
    debug!(url = %page.url(), "extracted distilled dom");
    Ok(StateTree::new(
        page.url(),
        title,
        lens_types::RepresentationKind::DistilledDom,
        root,
    ))
}

pub(crate) fn build_root(body: &DomNode, options: &ExtractOptions) -> Node {
    let mut root = Node::new(Role::Document, "", NodeOrigin::Dom);
    attach_children(&mut root, std::slice::from_ref(body), options);
    root
}

fn attach_children(parent: &mut Node, raw_children: &[DomNode], options: &ExtractOptions) {
    for raw in raw_children {
        if is_text_leaf(raw) {
            let text = normalize_text(raw.text.as_deref().unwrap_or(""), options.text_cap);
            if !text.is_empty() {
                let mut leaf = Node::new(Role::Text, text, NodeOrigin::Dom);
                leaf.bounds = raw.bounds;
                parent.children.push(leaf);
            }
            continue;
        }
        if raw.visible || raw.interactive {
            parent.children.push(convert(raw, options));
        } else {
            // Dropped wrapper; its kept descendants move up.
            attach_children(parent, &raw.children, options);
        }
    }
}

fn convert(raw: &DomNode, options: &ExtractOptions) -> Node {
    let role = computed_role(raw);
    let mut node = Node::new(role, normalize_text(&raw.name, options.name_cap), NodeOrigin::Dom);
    node.value = raw.value.clone();
    node.level = raw.level.or_else(|| heading_level(&raw.tag));
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
    if !raw.visible {
        node.state.insert(StateFlag::Hidden);
    }
    node.attrs.insert("tag".into(), raw.tag.to_ascii_lowercase());
    for key in KEPT_ATTRS {
        if let Some(value) = raw.attributes.get(*key) {
            node.attrs.insert((*key).to_string(), value.clone());
        }
    }
    attach_children(&mut node, &raw.children, options);
    node
}

fn is_text_leaf(raw: &DomNode) -> bool {
    raw.visible
        && raw.children.is_empty()
        && raw.text.as_deref().map_or(false, |t| !t.trim().is_empty())
        && !raw.interactive
        && raw.name.is_empty()
        && raw.role.is_none()
        && matches!(raw.tag.as_str(), "#text" | "span" | "p" | "div")
}

/// The driver's computed role when present, the tag-role table otherwise.
fn computed_role(raw: &DomNode) -> Role {
    if let Some(role) = raw.role.as_deref() {
        return Role::parse(&role.to_ascii_lowercase());
    }
    let tag = raw.tag.to_ascii_lowercase();
    let mapped = match tag.as_str() {
        "a" => "link",
        "button" => "button",
        "input" => input_role(raw),
        "select" => "combobox",
        "textarea" => "textbox",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "nav" => "navigation",
        "main" => "main",
        "header" => "banner",
        "footer" => "contentinfo",
        "aside" => "complementary",
        "section" => "region",
        "article" => "article",
        "form" => "form",
        "table" => "table",
        "tr" => "row",
        "td" | "th" => "cell",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "dialog" => "dialog",
        "details" => "group",
        "img" => "image",
        _ => "generic",
    };
    Role::parse(mapped)
}

fn input_role(raw: &DomNode) -> &'static str {
    match raw
        .attributes
        .get("type")
        .map(|t| t.to_ascii_lowercase())
        .as_deref()
    {
        Some("checkbox") => "checkbox",
        Some("radio") => "radio",
        Some("submit") | Some("button") | Some("reset") => "button",
        Some("range") => "slider",
        Some("search") => "searchbox",
        _ => "textbox",
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag.to_ascii_lowercase().as_str() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn el(tag: &str, name: &str, visible: bool, children: Vec<DomNode>) -> DomNode {
        DomNode {
            tag: tag.into(),
            name: name.into(),
            visible,
            children,
            ..DomNode::default()
        }
    }

    #[test]
    fn invisible_wrappers_collapse_upward() {
        let body = el(
            "body",
            "",
            true,
            vec![el("div", "", false, vec![el("button", "Buy", true, vec![])])],
        );
        let root = build_root(&body, &ExtractOptions::default());
        // body is kept (visible); the div wrapper is gone, button moved up.
        let body_node = &root.children[0];
        assert_eq!(body_node.children.len(), 1);
        assert_eq!(body_node.children[0].role, Role::Button);
    }

    #[test]
    fn hidden_interactive_elements_keep_hidden_flag() {
        let mut input = el("input", "Promo code", false, vec![]);
        input.interactive = true;
        let body = el("body", "", true, vec![input]);
        let root = build_root(&body, &ExtractOptions::default());
        let node = &root.children[0].children[0];
        assert_eq!(node.role, Role::Textbox);
        assert!(node.has_flag(StateFlag::Hidden));
    }

    #[test]
    fn attribute_subset_is_bounded() {
        let mut button = el("button", "Add", true, vec![]);
        button.attributes = BTreeMap::from([
            ("data-testid".to_string(), "add-btn".to_string()),
            ("class".to_string(), "btn btn-primary".to_string()),
            ("onclick".to_string(), "handle()".to_string()),
        ]);
        let body = el("body", "", true, vec![button]);
        let root = build_root(&body, &ExtractOptions::default());
        let node = &root.children[0].children[0];
        assert_eq!(node.attrs.get("tag").unwrap(), "button");
        assert_eq!(node.attrs.get("data-testid").unwrap(), "add-btn");
        assert!(node.attrs.get("class").is_none());
        assert!(node.attrs.get("onclick").is_none());
    }

    #[test]
    fn text_leaves_are_capped() {
        let mut text = el("p", "", true, vec![]);
        text.text = Some(format!("  lead   {}", "y".repeat(500)));
        let body = el("body", "", true, vec![text]);
        let options = ExtractOptions::default();
        let root = build_root(&body, &options);
        let leaf = &root.children[0].children[0];
        assert_eq!(leaf.role, Role::Text);
        assert!(leaf.name.starts_with("lead y"));
        assert_eq!(leaf.name.chars().count(), options.text_cap);
    }

    #[test]
    fn heading_levels_come_from_tags() {
        let body = el("body", "", true, vec![el("h2", "Results", true, vec![])]);
        let root = build_root(&body, &ExtractOptions::default());
        let heading = &root.children[0].children[0];
        assert_eq!(heading.role, Role::Heading);
        assert_eq!(heading.level, Some(2));
    }

    #[test]
    fn input_type_drives_role() {
        let mut checkbox = el("input", "Agree", true, vec![]);
        checkbox.attributes = BTreeMap::from([("type".to_string(), "checkbox".to_string())]);
        let body = el("body", "", true, vec![checkbox]);
        let root = build_root(&body, &ExtractOptions::default());
        assert_eq!(root.children[0].children[0].role, Role::Checkbox);
        assert_eq!(
            root.children[0].children[0].attrs.get("type").unwrap(),
            "checkbox"
        );
    }
}
