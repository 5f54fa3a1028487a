//! Chunking without an outline.

use std::sync::Arc;

use super::pack::{CloseRule, Packer};
use super::stream::{BodyStream, PreparedPage};
use super::{ApproxTokenCounter, ChunkOptions, TokenCounter};
use crate::model::{DraftChunk, Exhibit};

/// Chunks a document by pages and sentences when no TOC could be aligned.
///
/// Chunks never carry a section path. Exhibit boundaries and excluded
/// proof-of-service pages still force a break, and a chunk that already
/// meets `min_tokens` prefers to close where a page ends.
pub struct FallbackChunker {
    options: ChunkOptions,
    counter: Arc<dyn TokenCounter>,
}

impl FallbackChunker {
    /// Create a chunker with the approximate token counter.
    pub fn new(options: ChunkOptions) -> Self {
        let counter = Arc::new(ApproxTokenCounter::new(options.chars_per_token));
        Self { options, counter }
    }

    /// Use a custom token counter.
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Chunk prepared pages.
    pub fn chunk(&self, pages: &[PreparedPage], exhibits: &[Exhibit]) -> Vec<DraftChunk> {
        let stream = BodyStream::build(pages, exhibits, None, &self.options);
        let rule = CloseRule::PageEnd {
            min_tokens: self.options.min_tokens,
        };
        let packer = Packer::new(self.counter.as_ref(), self.options.max_tokens, rule);

        let drafts: Vec<DraftChunk> = stream.regions.iter().flat_map(|r| packer.pack(r)).collect();
        log::info!("Fallback chunking: {} chunks", drafts.len());
        drafts
    }
}
