//! Chunking of a classified document.
//!
//! Pages are prepared (footnotes relocated, block quotes tagged), stitched
//! into a body stream, cut into regions at structural boundaries, and
//! packed into token-bounded chunks on sentence boundaries.
//!
//! [`chunk_document`] picks the chunker: when the document has a TOC that
//! aligns to its headings the [`StructuralChunker`] is used, otherwise the
//! [`FallbackChunker`].

mod fallback;
mod options;
mod pack;
mod stream;
mod structural;
mod tokens;

pub use fallback::FallbackChunker;
pub use options::ChunkOptions;
pub use stream::{prepare_pages, BodyStream, Outline, PageSpan, PreparedPage, Region};
pub use structural::StructuralChunker;
pub use tokens::{ApproxTokenCounter, TokenCounter, WordCounter};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{detect_exhibits, Document, DraftChunk};
use crate::toc::{align, scan_candidates, AlignOptions, Alignment};

/// Which chunker produced a document's chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    /// Sections from an aligned TOC
    Structural,
    /// Pages and sentences only
    Fallback,
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkMode::Structural => f.write_str("structural"),
            ChunkMode::Fallback => f.write_str("fallback"),
        }
    }
}

/// Draft chunks of one document and how they were made.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    /// Chunks in reading order, not yet numbered
    pub drafts: Vec<DraftChunk>,
    /// Chunker used
    pub mode: ChunkMode,
    /// TOC alignment, when one succeeded
    pub alignment: Option<Alignment>,
    /// Why the structural chunker was not used
    pub fallback_reason: Option<String>,
}

/// Chunk a classified document.
///
/// An alignment failure is recovered by falling back; it is logged and
/// recorded in [`ChunkOutcome::fallback_reason`].
pub fn chunk_document(
    doc: &Document,
    align_options: &AlignOptions,
    chunk_options: &ChunkOptions,
) -> Result<ChunkOutcome> {
    let pages = prepare_pages(doc);
    let detected;
    let exhibits = if doc.exhibits.is_empty() {
        detected = detect_exhibits(&doc.pages);
        &detected
    } else {
        &doc.exhibits
    };

    let fallback_reason = match doc.toc.as_ref().filter(|f| !f.is_empty()) {
        None => "no table of contents".to_string(),
        Some(forest) => {
            let candidates = scan_candidates(&pages, align_options);
            match align(forest, &candidates, align_options) {
                Ok(alignment) => {
                    let markers = alignment.markers(forest);
                    let drafts = StructuralChunker::new(chunk_options.clone())
                        .chunk(&pages, exhibits, forest, &markers);
                    return Ok(ChunkOutcome {
                        drafts,
                        mode: ChunkMode::Structural,
                        alignment: Some(alignment),
                        fallback_reason: None,
                    });
                }
                Err(e @ Error::AlignmentFailed { .. }) => {
                    log::warn!("{}: {}; using fallback chunker", doc.name, e);
                    e.to_string()
                }
                Err(e) => return Err(e),
            }
        }
    };

    let drafts = FallbackChunker::new(chunk_options.clone()).chunk(&pages, exhibits);
    Ok(ChunkOutcome {
        drafts,
        mode: ChunkMode::Fallback,
        alignment: None,
        fallback_reason: Some(fallback_reason),
    })
}
