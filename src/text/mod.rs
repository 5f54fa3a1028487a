//! Text utilities: page cleanup, heading normalization, sentence splitting
//! and inline tags.

mod cleanup;
mod normalize;
mod sentence;
mod tags;

pub use cleanup::{strip_line_numbers, CleanupOptions, CleanupPipeline};
pub use normalize::{
    body_key, has_heading_shape, is_heading_like, is_top_title, match_key, normalize_for_match,
    split_label, uppercase_ratio, HEAD_PREFIX, TOP_TITLES,
};
pub use sentence::{sentence_ranges, split_sentences};
pub use tags::{
    footnote_close, footnote_open, insert_footnotes, strip_tags, tag_block_quotes, tag_footnote,
    tagged_spans, TagKind, TaggedSpan, BLOCK_QUOTE_CLOSE, BLOCK_QUOTE_OPEN,
};

/// Prepare a page's text for chunking: relocate footnotes, then tag block quotes.
pub fn prepare_page(text: &str, footnotes: &[crate::model::Footnote]) -> String {
    let with_notes = if footnotes.is_empty() {
        text.to_string()
    } else {
        insert_footnotes(text, footnotes)
    };
    tag_block_quotes(&with_notes)
}
