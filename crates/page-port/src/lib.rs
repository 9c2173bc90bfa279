//! Port to the headless-browser page handle.
//!
//! BrowserLens never talks to a browser directly; it consumes an
//! implementation of [`PageDriver`] that exposes DOM queries, accessibility
//! dumps, screenshots, and a short-lived mutation observer. The concrete
//! driver (CDP, WebDriver, a test double) lives outside the core.

pub mod driver;
pub mod model;

pub use driver::{PageDriver, PageError, PageResult};
pub use model::{
    AxNode, AxSnapshotOptions, DomNode, DomStats, DomWalkOptions, MutationSummary, Screenshot,
};
