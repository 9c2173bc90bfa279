//! Error surface of the observation core.

use thiserror::Error;

/// Errors surfaced by [`crate::Session`] operations.
///
/// Every variant carries a machine-readable kind (see [`LensError::kind`])
/// and a human-readable detail. The core never retries on its own; retry is
/// the caller's policy.
#[derive(Debug, Error)]
pub enum LensError {
    /// The page handle errored out; the session is unchanged.
    #[error("page unavailable: {detail}")]
    PageUnavailable { detail: String },

    /// A phase exceeded its budget; the session moved to recovery and the
    /// next observation will emit a full state.
    #[error("{phase} phase exceeded its {budget_ms} ms budget")]
    ExtractionTimeout { phase: Phase, budget_ms: u64 },

    /// Internal invariant violation in the matcher; the session moved to
    /// recovery.
    #[error("diff failure: {detail}")]
    DiffFailure { detail: String },

    /// A reentrant `observe()` on the same session; no state change.
    #[error("an observation is already in flight on this session")]
    ConcurrentObservation,

    /// Invalid thresholds at session creation.
    #[error("invalid configuration: {detail}")]
    ConfigurationError { detail: String },
}

/// The per-phase timeout domains.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    SignalProbe,
    Extract,
    Diff,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::SignalProbe => "signal probe",
            Phase::Extract => "extractor",
            Phase::Diff => "diff",
        })
    }
}

impl LensError {
    pub fn kind(&self) -> &'static str {
        match self {
            LensError::PageUnavailable { .. } => "page_unavailable",
            LensError::ExtractionTimeout { .. } => "extraction_timeout",
            LensError::DiffFailure { .. } => "diff_failure",
            LensError::ConcurrentObservation => "concurrent_observation",
            LensError::ConfigurationError { .. } => "configuration_error",
        }
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        LensError::ConfigurationError {
            detail: detail.into(),
        }
    }
}

impl From<signal_probe::ProbeError> for LensError {
    fn from(err: signal_probe::ProbeError) -> Self {
        LensError::PageUnavailable {
            detail: err.to_string(),
        }
    }
}

impl From<state_extract::ExtractError> for LensError {
    fn from(err: state_extract::ExtractError) -> Self {
        LensError::PageUnavailable {
            detail: err.to_string(),
        }
    }
}

impl From<state_differ::DiffError> for LensError {
    fn from(err: state_differ::DiffError) -> Self {
        LensError::DiffFailure {
            detail: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
