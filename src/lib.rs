//! # filingchunk
//!
//! Structure-aware chunking of litigation filings for retrieval-augmented QA.
//!
//! Classified OCR pages are turned into token-bounded chunks that follow
//! the filing's own outline: the table of contents is aligned to body
//! headings, the body is cut at each matched heading and exhibit boundary,
//! and each region is packed on sentence boundaries. Chunks carry stable
//! ids, page provenance and caption metadata, and are mirrored to CSV
//! files that reviewers may edit; edits flow back on the next sync.
//!
//! ## Quick Start
//!
//! ```no_run
//! use filingchunk::{discover_documents, OutputLayout, Pipeline, PipelineConfig};
//!
//! fn main() -> filingchunk::Result<()> {
//!     let sources = discover_documents("filings/")?;
//!     let pipeline = Pipeline::new(OutputLayout::new("out/"), PipelineConfig::default());
//!     let report = pipeline.run_batch(&sources)?;
//!     println!("{} chunks", report.chunk_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **TOC alignment**: order-preserving alignment of outline entries to headings
//! - **Structural chunking**: regions never cross a section or exhibit boundary
//! - **Fallback chunking**: page-aware packing when no outline aligns
//! - **Stable identity**: document ids survive renames, chunk ids are reproducible
//! - **Bidirectional sync**: three-way merge of reviewer edits with conflict reporting
//! - **Parallel batches**: documents run on the rayon pool

pub mod caption;
pub mod chunk;
pub mod classify;
pub mod error;
pub mod identity;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod sync;
pub mod text;
pub mod toc;

// Re-export commonly used types
pub use caption::parse_caption;
pub use chunk::{chunk_document, ChunkMode, ChunkOptions, ChunkOutcome, FallbackChunker, StructuralChunker};
pub use classify::{ClassifyError, HeuristicClassifier, PageClassifier, RetryPolicy, RetryingClassifier};
pub use error::{DocumentFailure, Error, Result};
pub use identity::{ChunkId, ChunkIdAllocator, DocumentId, IdRegistry, IdentityChange, KeyedLocks};
pub use model::{
    CaptionMetadata, Chunk, Classification, Document, DraftChunk, Exhibit, Footnote, Page,
    PageCategory, SectionPath, TocEntry, TocForest,
};
pub use pipeline::{BatchReport, CancellationToken, DocumentReport, Pipeline, PipelineConfig, Stage};
pub use source::{discover_documents, SourceLoader};
pub use store::{DocumentRecord, OutputLayout};
pub use sync::{SyncOptions, SyncReport, Synchronizer};
pub use toc::{align, parse_toc, AlignOptions, Alignment};

use std::path::Path;

/// Load one classified document directory with default cleanup.
///
/// Pages without a classification row stay unclassified.
pub fn load_document(dir: impl AsRef<Path>) -> Result<Document> {
    SourceLoader::default().load(dir)
}

/// Chunk a classified document with default options.
pub fn chunk_with_defaults(doc: &Document) -> Result<ChunkOutcome> {
    chunk_document(doc, &AlignOptions::default(), &ChunkOptions::default())
}
