//! Selector derivation from observed nodes.

use lens_types::{Node, Role};

use crate::model::{ElementTarget, SelectorStrategy};

/// Derive the prioritized selector list for a node. The first strategy that
/// yields a selector on replay wins; later ones are healing fallbacks.
pub fn build_target(node: &Node) -> ElementTarget {
    let mut selectors = Vec::new();

    if let Some(test_id) = node.attrs.get("data-testid") {
        selectors.push((SelectorStrategy::TestId, format!("testid={test_id}")));
    }
    if !node.name.is_empty() {
        selectors.push((
            SelectorStrategy::RoleName,
            format!("role={} name={:?}", node.role, node.name),
        ));
        if is_labelled_control(&node.role) {
            selectors.push((SelectorStrategy::Label, format!("label={}", node.name)));
        }
        if matches!(node.role, Role::Link | Role::Button | Role::Text) {
            selectors.push((SelectorStrategy::Text, format!("text={}", node.name)));
        }
    }
    if let Some(placeholder) = node.attrs.get("placeholder") {
        selectors.push((
            SelectorStrategy::Placeholder,
            format!("placeholder={placeholder}"),
        ));
    }
    if let Some(css) = css_fallback(node) {
        selectors.push((SelectorStrategy::Css, format!("css={css}")));
    }

    ElementTarget {
        ref_id: node.ref_id,
        role: node.role.clone(),
        name: node.name.clone(),
        selectors,
    }
}

fn is_labelled_control(role: &Role) -> bool {
    matches!(
        role,
        Role::Textbox
            | Role::Searchbox
            | Role::Checkbox
            | Role::Radio
            | Role::Combobox
            | Role::Listbox
            | Role::Switch
            | Role::Slider
    )
}

/// Attribute-based CSS as the last resort; only as specific as the
/// preserved attribute subset allows.
fn css_fallback(node: &Node) -> Option<String> {
    let tag = node.attrs.get("tag")?;
    let mut css = tag.clone();
    if let Some(name_attr) = node.attrs.get("name") {
        css.push_str(&format!("[name=\"{name_attr}\"]"));
    } else if let Some(type_attr) = node.attrs.get("type") {
        css.push_str(&format!("[type=\"{type_attr}\"]"));
    }
    Some(css)
}
