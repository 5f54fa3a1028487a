//! TOC alignment.
//!
//! The outline extracted from a filing's table-of-contents pages is parsed
//! into a [`TocForest`](crate::model::TocForest), heading-like lines are
//! collected from the body pages, and the two ordered lists are aligned.
//! Matched entries become [`HierarchyMarker`]s that split the body stream
//! into sections.

mod align;
mod candidates;
mod options;
mod parse;

pub use align::{align, score, Alignment, HierarchyMarker, TocMatch};
pub use candidates::{scan_candidates, BodyPosition, HeadingCandidate};
pub use options::AlignOptions;
pub use parse::{depth_from_label, parse_toc};
