//! Signal probe and representation router.
//!
//! The probe collects cheap structural signals from a page handle without
//! mutating page state; the router maps those signals onto the cheapest
//! page representation that still describes the page faithfully.

pub mod cache;
pub mod errors;
pub mod kind;
pub mod probe;
pub mod router;

pub use cache::SignalCache;
pub use errors::{ProbeError, Result};
pub use probe::{ProbeOptions, SignalProbe};
pub use router::{route, RouterFn, RouterThresholds};
