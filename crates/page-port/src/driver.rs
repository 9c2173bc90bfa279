use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use lens_types::BoundingBox;

use crate::model::{
    AxNode, AxSnapshotOptions, DomNode, DomStats, DomWalkOptions, MutationSummary, Screenshot,
};

/// Errors surfaced by a page-handle implementation.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page is gone: {0}")]
    Gone(String),
    #[error("driver call failed: {0}")]
    Driver(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl PageError {
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }
}

pub type PageResult<T> = Result<T, PageError>;

/// The page handle the core observes through.
///
/// Every method may suspend. None of them may mutate page state; the core
/// relies on probing being side-effect-free.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Number of elements matching a CSS selector.
    async fn query_selector_count(&self, selector: &str) -> PageResult<usize>;

    /// Accessibility-tree dump rooted at the document.
    async fn accessibility_snapshot(&self, options: AxSnapshotOptions) -> PageResult<AxNode>;

    /// Distilled DOM walk rooted at `<body>`.
    async fn dom_walk(&self, options: DomWalkOptions) -> PageResult<DomNode>;

    /// Aggregate counters from a scripted in-page walk; far cheaper than
    /// [`PageDriver::dom_walk`].
    async fn dom_stats(&self) -> PageResult<DomStats>;

    /// Bounding boxes of canvas/WebGL elements with a non-zero layout box.
    async fn canvas_regions(&self) -> PageResult<Vec<BoundingBox>>;

    /// Screenshot of `clip`, or of the viewport when `clip` is `None`.
    async fn screenshot(&self, clip: Option<BoundingBox>) -> PageResult<Screenshot>;

    /// Install a mutation observer for `window`, then report what it saw.
    async fn observe_mutations(&self, window: Duration) -> PageResult<MutationSummary>;

    /// Content of a `<meta>` tag by name or property, e.g. `og:type`.
    async fn meta_content(&self, name: &str) -> PageResult<Option<String>>;

    async fn title(&self) -> PageResult<String>;

    /// Current URL. Cheap and non-suspending on every real driver.
    fn url(&self) -> String;
}
