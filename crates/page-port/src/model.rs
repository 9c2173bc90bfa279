use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lens_types::BoundingBox;

/// Raw accessibility node as reported by the driver. Role and state flags
/// are plain strings here; the a11y extractor normalizes them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxNode {
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    /// Raw state flags, e.g. `"disabled"`, `"focused"`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub flags: Vec<String>,
    /// aria-live setting, when the element is a live region.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bounds: Option<BoundingBox>,
    /// Marked ignored by the browser; the extractor splices its children
    /// into the nearest kept ancestor.
    #[serde(default)]
    pub ignored: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<AxNode>,
}

/// Raw DOM element from the distilled walk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,
    /// Computed ARIA role when the driver resolved one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    /// Computed accessible name.
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    /// Own text content for textual leaves.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    /// Non-zero layout box, not `display:none`, not `aria-hidden`.
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub live: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bounds: Option<BoundingBox>,
    /// Full attribute map; the extractor keeps only its fixed subset.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<DomNode>,
}

/// Aggregate counters from the driver's scripted DOM walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomStats {
    pub node_count: usize,
    pub max_depth: usize,
    pub avg_children: f64,
}

/// Outcome of the short-lived mutation observer sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub total_mutations: usize,
    /// Mutations that touched an interactive subtree.
    pub interactive_mutations: usize,
}

/// Captured image plus the rectangle it covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub data: Vec<u8>,
    pub rect: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxSnapshotOptions {
    /// Limit the dump depth; `None` walks the full tree.
    pub max_depth: Option<usize>,
}

impl Default for AxSnapshotOptions {
    fn default() -> Self {
        Self { max_depth: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomWalkOptions {
    pub max_depth: usize,
}

impl Default for DomWalkOptions {
    fn default() -> Self {
        Self { max_depth: 40 }
    }
}
