//! Heading candidates found in body text.

use serde::{Deserialize, Serialize};

use super::AlignOptions;
use crate::chunk::PreparedPage;
use crate::model::PageCategory;
use crate::text::{
    body_key, is_heading_like, split_label, tagged_spans, TagKind, BLOCK_QUOTE_CLOSE,
    BLOCK_QUOTE_OPEN,
};

/// A position in the prepared body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyPosition {
    /// Page number (1-indexed)
    pub page: u32,
    /// Line index within the page
    pub line: usize,
    /// Byte offset of the line within the page text
    pub offset: usize,
}

/// A heading-like line in a body or caption page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCandidate {
    /// Position in reading order among all candidates
    pub seq: usize,

    /// Where the line starts
    pub position: BodyPosition,

    /// Line text, trimmed
    pub text: String,

    /// Normalized text without numbering prefix
    pub body_norm: String,

    /// Canonical numbering label, if any
    pub label: Option<String>,

    /// Line joined with the following heading-like line, for wrapped headings
    pub extended: Option<String>,
}

/// A line with its footnote spans cut out, for heading tests.
fn without_footnotes(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pos = 0;
    for span in tagged_spans(line) {
        if span.kind == TagKind::Footnote {
            out.push_str(&line[pos..span.range.start]);
            pos = span.range.end;
        }
    }
    out.push_str(&line[pos..]);
    out.trim().to_string()
}

/// Scan pages for heading-like lines, in reading order.
///
/// Only body and caption pages are scanned; when the document has neither,
/// every page is. Lines inside block quotes are never candidates.
pub fn scan_candidates(pages: &[PreparedPage], options: &AlignOptions) -> Vec<HeadingCandidate> {
    let any_heading_pages = pages.iter().any(|p| p.category.carries_headings());
    let mut out = Vec::new();

    for page in pages {
        if any_heading_pages && !page.category.carries_headings() {
            continue;
        }
        if !any_heading_pages && page.category == PageCategory::TableOfContents {
            continue;
        }

        // (line index, byte offset, cleaned text) of lines outside block quotes
        let mut lines: Vec<(usize, usize, String)> = Vec::new();
        let mut in_quote = false;
        let mut offset = 0;
        for (idx, raw) in page.text.split('\n').enumerate() {
            let opens = raw.contains(BLOCK_QUOTE_OPEN);
            let closes = raw.contains(BLOCK_QUOTE_CLOSE);
            if !(in_quote || opens) {
                lines.push((idx, offset, without_footnotes(raw)));
            }
            if opens && !closes {
                in_quote = true;
            } else if closes {
                in_quote = false;
            }
            offset += raw.len() + 1;
        }

        for (k, (line_idx, line_offset, text)) in lines.iter().enumerate() {
            if !is_heading_like(text, options.max_heading_len) {
                continue;
            }
            let extended = lines
                .get(k + 1)
                .filter(|(next_idx, _, next)| {
                    *next_idx == line_idx + 1 && is_heading_like(next, options.max_heading_len)
                })
                .map(|(_, _, next)| format!("{} {}", text, next));

            out.push(HeadingCandidate {
                seq: out.len(),
                position: BodyPosition {
                    page: page.number,
                    line: *line_idx,
                    offset: *line_offset,
                },
                text: text.clone(),
                body_norm: body_key(text),
                label: split_label(text).0,
                extended,
            });
        }
    }

    log::debug!("Found {} heading candidates", out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, category: PageCategory, text: &str) -> PreparedPage {
        PreparedPage {
            number,
            category,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_scan_body_pages_only() {
        let pages = vec![
            page(1, PageCategory::TableOfContents, "I. INTRODUCTION ..... 1"),
            page(
                2,
                PageCategory::PleadingBody,
                "I. INTRODUCTION\nPlaintiff brings this motion because the\ndefendant failed to act.",
            ),
        ];
        let cands = scan_candidates(&pages, &AlignOptions::default());
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].position, BodyPosition { page: 2, line: 0, offset: 0 });
        assert_eq!(cands[0].label.as_deref(), Some("I."));
        assert_eq!(cands[0].body_norm, "introduction");
    }

    #[test]
    fn test_wrapped_heading_has_extended_text() {
        let pages = vec![page(
            1,
            PageCategory::PleadingBody,
            "intro text here.\nA. THE STATUTE OF LIMITATIONS\nBARS THE CLAIM\nbody text continues here.",
        )];
        let cands = scan_candidates(&pages, &AlignOptions::default());
        assert_eq!(cands[0].position.offset, 17);
        assert_eq!(
            cands[0].extended.as_deref(),
            Some("A. THE STATUTE OF LIMITATIONS BARS THE CLAIM")
        );
        assert_eq!(cands[1].text, "BARS THE CLAIM");
        assert_eq!(cands[1].extended, None);
    }

    #[test]
    fn test_block_quote_lines_are_skipped() {
        let pages = vec![page(
            1,
            PageCategory::PleadingBody,
            "[Block_quote] THE COURT SHALL\nAWARD COSTS. [Block_quote_end]\nII. ARGUMENT",
        )];
        let cands = scan_candidates(&pages, &AlignOptions::default());
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].text, "II. ARGUMENT");
        assert_eq!(cands[0].position.line, 2);
    }

    #[test]
    fn test_all_pages_scanned_without_body_categories() {
        let pages = vec![page(1, PageCategory::Unknown, "ARGUMENT")];
        assert_eq!(scan_candidates(&pages, &AlignOptions::default()).len(), 1);
    }
}
