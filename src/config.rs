//! Session configuration.

use serde::{Deserialize, Serialize};

use signal_probe::RouterThresholds;
use state_extract::ExtractOptions;

use crate::errors::{LensError, Result};

/// All tunables of a session. Defaults match the documented behavior; every
/// field is validated once at session creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LensConfig {
    /// Coverage at/above which the router picks the pure a11y tree.
    pub a11y_full_threshold: f64,
    /// DOM size above which DOM extraction is rejected.
    pub dom_node_cap: usize,
    /// Coverage below which canvas pages get a vision component.
    pub hybrid_min_coverage: f64,
    /// Truncation for accessible names (and thereby fingerprints).
    pub name_length_cap: usize,
    /// Truncation for textual leaf content.
    pub text_length_cap: usize,
    /// Max refs per session before forced compaction.
    pub ref_session_cap: u32,
    /// Signal cache TTL per origin, in milliseconds.
    pub snapshot_ttl_ms: u64,
    /// Bound on cached origins.
    pub signal_cache_capacity: usize,
    /// Whether to run the 500 ms mutation sample.
    pub dynamic_probe: bool,
    /// Signal probe budget. Covers the mutation sample when enabled.
    pub probe_timeout_ms: u64,
    /// Extractor budget.
    pub extract_timeout_ms: u64,
    /// Diff budget.
    pub diff_timeout_ms: u64,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            a11y_full_threshold: 0.8,
            dom_node_cap: 2000,
            hybrid_min_coverage: 0.5,
            name_length_cap: 200,
            text_length_cap: 240,
            ref_session_cap: 65_535,
            snapshot_ttl_ms: 600_000,
            signal_cache_capacity: 64,
            dynamic_probe: false,
            probe_timeout_ms: 600,
            extract_timeout_ms: 2000,
            diff_timeout_ms: 200,
        }
    }
}

impl LensConfig {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("a11y_full_threshold", self.a11y_full_threshold),
            ("hybrid_min_coverage", self.hybrid_min_coverage),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(LensError::configuration(format!(
                    "{label} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.dom_node_cap == 0 {
            return Err(LensError::configuration("dom_node_cap must be positive"));
        }
        if self.name_length_cap == 0 || self.text_length_cap == 0 {
            return Err(LensError::configuration("length caps must be positive"));
        }
        if self.ref_session_cap == 0 {
            return Err(LensError::configuration("ref_session_cap must be positive"));
        }
        if self.signal_cache_capacity == 0 {
            return Err(LensError::configuration(
                "signal_cache_capacity must be positive",
            ));
        }
        for (label, value) in [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("extract_timeout_ms", self.extract_timeout_ms),
            ("diff_timeout_ms", self.diff_timeout_ms),
        ] {
            if value == 0 {
                return Err(LensError::configuration(format!("{label} must be positive")));
            }
        }
        Ok(())
    }

    pub fn router_thresholds(&self) -> RouterThresholds {
        RouterThresholds {
            a11y_full_threshold: self.a11y_full_threshold,
            dom_node_cap: self.dom_node_cap,
            hybrid_min_coverage: self.hybrid_min_coverage,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            name_cap: self.name_length_cap,
            text_cap: self.text_length_cap,
        }
    }
}
