//! Document model types for classified filings.
//!
//! A [`Document`] owns its pages, the outline parsed from its table of
//! contents, and its exhibit runs. Chunks refer back to a document by
//! identifier only, so a chunk store can be deleted and rebuilt without
//! touching the document or its classification.

mod chunk;
mod document;
mod exhibit;
mod page;
mod toc;

pub use chunk::{chunk_key, text_hash, Chunk, DraftChunk};
pub use document::{CaptionMetadata, Document};
pub use exhibit::{detect_exhibits, label_in_text, normalize_label, Exhibit};
pub use page::{Classification, Footnote, Page, PageCategory};
pub use toc::{SectionPath, TocEntry, TocForest};
