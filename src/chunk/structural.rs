//! Section-aware chunking driven by an aligned TOC.

use std::sync::Arc;

use super::pack::{CloseRule, Packer};
use super::stream::{BodyStream, Outline, PreparedPage};
use super::{ApproxTokenCounter, ChunkOptions, TokenCounter};
use crate::model::{DraftChunk, Exhibit, TocForest};
use crate::toc::HierarchyMarker;

/// Chunks a document along its matched TOC headings.
///
/// Every chunk lies inside one section or one exhibit and carries the path
/// of the nearest matched heading.
pub struct StructuralChunker {
    options: ChunkOptions,
    counter: Arc<dyn TokenCounter>,
}

impl StructuralChunker {
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
    pub fn chunk(
        &self,
        pages: &[PreparedPage],
        exhibits: &[Exhibit],
        forest: &TocForest,
        markers: &[HierarchyMarker],
    ) -> Vec<DraftChunk> {
        let outline = Outline { forest, markers };
        let stream = BodyStream::build(pages, exhibits, Some(outline), &self.options);
        let packer = Packer::new(self.counter.as_ref(), self.options.max_tokens, CloseRule::Sentence);

        let drafts: Vec<DraftChunk> = stream.regions.iter().flat_map(|r| packer.pack(r)).collect();
        log::info!(
            "Structural chunking: {} regions, {} chunks",
            stream.regions.len(),
            drafts.len()
        );
        drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::WordCounter;
    use crate::model::{PageCategory, TocEntry};
    use crate::toc::BodyPosition;

    fn page(number: u32, category: PageCategory, text: &str) -> PreparedPage {
        PreparedPage {
            number,
            category,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_small_sections_are_not_merged() {
        let forest = TocForest::new(vec![
            TocEntry::new("I. INTRODUCTION", 1),
            TocEntry::new("II. ARGUMENT", 1),
        ]);
        let markers = vec![
            HierarchyMarker {
                position: BodyPosition { page: 1, line: 0, offset: 0 },
                entry: 0,
                depth: 1,
            },
            HierarchyMarker {
                position: BodyPosition { page: 1, line: 2, offset: 28 },
                entry: 1,
                depth: 1,
            },
        ];
        let pages = vec![page(
            1,
            PageCategory::PleadingBody,
            "I. INTRODUCTION\nShort intro.\nII. ARGUMENT\nShort argument.",
        )];
        let chunker = StructuralChunker::new(ChunkOptions::default()).with_counter(Arc::new(WordCounter));
        let drafts = chunker.chunk(&pages, &[], &forest, &markers);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "I. INTRODUCTION\nShort intro.");
        assert_eq!(
            drafts[1].section_path.as_ref().map(|s| s.to_string()).as_deref(),
            Some("II. ARGUMENT")
        );
    }
}
