//! Extractors: raw driver snapshots in, normalized [`lens_types::StateTree`] out.
//!
//! Four extraction paths share one output shape. The a11y extractor walks
//! the accessibility tree; the DOM extractor distills the DOM down to
//! visible-or-interactive elements; the hybrid extractor augments the a11y
//! tree with vision-region leaves for canvas areas; the vision extractor
//! wraps a full-page screenshot. Every tree is rooted at a synthetic
//! `document` node and all names are whitespace-collapsed and length-capped
//! before they reach the matcher.

pub mod a11y;
pub mod dom;
pub mod errors;
pub mod hybrid;
pub mod normalize;
pub mod vision;

pub use errors::{ExtractError, Result};

use lens_types::{RepresentationKind, Signals, StateTree};
use page_port::PageDriver;

/// Caps applied while normalizing extracted content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractOptions {
    /// Truncation for accessible names (also bounds fingerprints).
    pub name_cap: usize,
    /// Truncation for textual leaf content.
    pub text_cap: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            name_cap: 200,
            text_cap: 240,
        }
    }
}

/// Run the extractor for `kind`. The signals record feeds the hybrid
/// extractor its canvas regions; the others ignore it.
pub async fn extract(
    kind: RepresentationKind,
    page: &dyn PageDriver,
    signals: &Signals,
    options: &ExtractOptions,
) -> Result<StateTree> {
    match kind {
        RepresentationKind::A11y => a11y::extract(page, options).await,
        RepresentationKind::DistilledDom => dom::extract(page, options).await,
        RepresentationKind::Hybrid => hybrid::extract(page, signals, options).await,
        RepresentationKind::Vision => vision::extract(page).await,
    }
}
