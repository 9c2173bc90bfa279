use serde::{Deserialize, Serialize};

use crate::node::BoundingBox;

/// One rendering of page state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationKind {
    A11y,
    DistilledDom,
    Hybrid,
    Vision,
}

impl RepresentationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RepresentationKind::A11y => "a11y",
            RepresentationKind::DistilledDom => "distilled_dom",
            RepresentationKind::Hybrid => "hybrid",
            RepresentationKind::Vision => "vision",
        }
    }
}

/// Coarse page classification from the URL rule table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Form,
    Dashboard,
    Document,
    Listing,
    Unknown,
}

/// Cheap structural signals collected by the probe before routing.
///
/// `dom_node_count` of `usize::MAX` is the conservative stand-in for an
/// unmeasurable DOM (a failed probe biases the router toward richer
/// representations).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub has_canvas: bool,
    pub has_webgl: bool,
    /// Interactive a11y nodes / interactive DOM elements, clamped to [0, 1].
    pub a11y_coverage: f64,
    pub dom_node_count: usize,
    pub dom_max_depth: usize,
    pub dom_avg_children: f64,
    /// Fraction of sampled mutations touching interactive subtrees.
    /// `None` when the 500 ms sample was skipped.
    pub dynamic_ratio: Option<f64>,
    pub page_kind: PageKind,
    pub url: String,
    /// Cache key: `scheme://host[:port]`.
    pub url_origin: String,
    /// Bounding boxes of canvas/WebGL elements, feeding the hybrid extractor.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub canvas_regions: Vec<BoundingBox>,
}

impl Signals {
    /// The conservative record substituted when probing fails outright.
    pub fn conservative(url: impl Into<String>, url_origin: impl Into<String>) -> Signals {
        Signals {
            has_canvas: true,
            has_webgl: false,
            a11y_coverage: 0.0,
            dom_node_count: usize::MAX,
            dom_max_depth: 0,
            dom_avg_children: 0.0,
            dynamic_ratio: None,
            page_kind: PageKind::Unknown,
            url: url.into(),
            url_origin: url_origin.into(),
            canvas_regions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representation_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&RepresentationKind::DistilledDom).unwrap(),
            "\"distilled_dom\""
        );
        assert_eq!(
            serde_json::to_string(&RepresentationKind::A11y).unwrap(),
            "\"a11y\""
        );
    }

    #[test]
    fn conservative_signals_bias_toward_rich_output() {
        let s = Signals::conservative("https://x.test/a", "https://x.test");
        assert!(s.has_canvas);
        assert_eq!(s.a11y_coverage, 0.0);
        assert_eq!(s.dom_node_count, usize::MAX);
    }
}
