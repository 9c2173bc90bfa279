use std::sync::Arc;

use tracing::debug;

use lens_types::{RepresentationKind, Signals};

/// Coverage below which a canvas-free, oversized page falls back to vision.
const VISION_COVERAGE_FLOOR: f64 = 0.2;

/// Router thresholds, all overridable through session configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouterThresholds {
    /// Coverage at or above which the pure a11y tree is sufficient.
    pub a11y_full_threshold: f64,
    /// DOM size above which DOM extraction is rejected.
    pub dom_node_cap: usize,
    /// Coverage below which canvas pages need a vision component.
    pub hybrid_min_coverage: f64,
}

impl Default for RouterThresholds {
    fn default() -> Self {
        Self {
            a11y_full_threshold: 0.8,
            dom_node_cap: 2000,
            hybrid_min_coverage: 0.5,
        }
    }
}

/// A pluggable replacement for [`route`]; same signature, caller-supplied.
pub type RouterFn = Arc<dyn Fn(&Signals) -> RepresentationKind + Send + Sync>;

/// Map signals onto a representation. Pure; first matching rule wins.
pub fn route(signals: &Signals, thresholds: &RouterThresholds) -> RepresentationKind {
    let kind = decide(signals, thresholds);
    debug!(
        representation = kind.as_str(),
        coverage = signals.a11y_coverage,
        dom_nodes = signals.dom_node_count,
        has_canvas = signals.has_canvas,
        "routed representation"
    );
    kind
}

fn decide(signals: &Signals, t: &RouterThresholds) -> RepresentationKind {
    if signals.has_canvas && signals.a11y_coverage < t.hybrid_min_coverage {
        return RepresentationKind::Hybrid;
    }
    if signals.a11y_coverage >= t.a11y_full_threshold {
        return RepresentationKind::A11y;
    }
    if signals.dom_node_count < t.dom_node_cap && signals.a11y_coverage >= t.hybrid_min_coverage {
        return RepresentationKind::DistilledDom;
    }
    if signals.a11y_coverage < VISION_COVERAGE_FLOOR && signals.dom_node_count >= t.dom_node_cap {
        return RepresentationKind::Vision;
    }
    RepresentationKind::Hybrid
}
