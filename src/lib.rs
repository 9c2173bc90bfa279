//! BrowserLens: an adaptive page-state observation layer between a headless
//! browser and an LLM-driven agent.
//!
//! The core cuts the volume of page-state text an agent consumes per step
//! by (a) routing each page to the cheapest representation that still
//! describes it faithfully and (b) transmitting only what changed since the
//! last observation, under stable `@eN` node references.
//!
//! ```no_run
//! use browserlens::{create_session, LensConfig, ObserveOptions};
//! # async fn example(page: &dyn page_port::PageDriver) -> browserlens::Result<()> {
//! let session = create_session(LensConfig::default())?;
//! let first = session.observe(page, ObserveOptions::default()).await?;
//! assert!(first.is_full());
//! let next = session.observe(page, ObserveOptions::default()).await?;
//! // `next` is a delta unless the session had to recover.
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod observation;
pub mod session;

pub use config::LensConfig;
pub use errors::{LensError, Phase, Result};
pub use observation::Observation;
pub use session::{create_session, ObserveOptions, Session, SessionState};

// The data model and the pluggable seams, re-exported for callers.
pub use lens_types::{
    CauseHint, Delta, Identity, Node, NodeOrigin, NodeRef, PageKind, RepresentationKind, Role,
    Signals, StateFlag, StateTree, UnchangedSummary,
};
pub use signal_probe::RouterFn;
pub use state_differ::{Candidate, FilterPredicate, SemanticFilter};

/// The recorded-workflow layer on top of the observation core.
pub use workflow_compiler as workflow;
