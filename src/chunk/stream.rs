//! The body stream: prepared page text stitched into regions.
//!
//! A region is a run of text that no chunk may cross. Regions are cut at
//! every hierarchy marker, at every exhibit boundary, and at excluded
//! proof-of-service pages. Page breaks are kept as provenance only.

use rayon::prelude::*;
use std::ops::Range;

use super::ChunkOptions;
use crate::model::{Document, Exhibit, PageCategory, SectionPath, TocForest};
use crate::text::{
    prepare_page, uppercase_ratio, BLOCK_QUOTE_CLOSE, BLOCK_QUOTE_OPEN, HEAD_PREFIX,
};
use crate::toc::HierarchyMarker;

/// Longest line that is kept on its own line as a heading.
const MAX_STANDALONE_LEN: usize = 200;

/// A page with footnotes relocated and block quotes tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPage {
    /// Page number (1-indexed)
    pub number: u32,
    /// Page category
    pub category: PageCategory,
    /// Prepared text
    pub text: String,
}

/// Prepare every page of a document.
pub fn prepare_pages(doc: &Document) -> Vec<PreparedPage> {
    doc.pages
        .par_iter()
        .map(|page| PreparedPage {
            number: page.number,
            category: page.category(),
            text: prepare_page(&page.text, &page.footnotes),
        })
        .collect()
}

/// Where a page's text starts inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Byte offset in the region text
    pub start: usize,
    /// Page number
    pub page: u32,
    /// Page category
    pub category: PageCategory,
}

/// Text between two structural boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    /// Governing section
    pub section: Option<SectionPath>,
    /// Exhibit label when inside an exhibit
    pub exhibit_label: Option<String>,
    /// Exhibit title
    pub exhibit_title: Option<String>,
    /// Stitched text
    pub text: String,
    /// Page provenance, ascending by offset
    pub pages: Vec<PageSpan>,
}

impl Region {
    /// Non-whitespace bytes each page contributes to `range`, in page order.
    pub fn contributions(&self, range: Range<usize>) -> Vec<(u32, PageCategory, usize)> {
        let mut out = Vec::new();
        for (k, span) in self.pages.iter().enumerate() {
            let end = self
                .pages
                .get(k + 1)
                .map(|next| next.start)
                .unwrap_or(self.text.len());
            let lo = range.start.max(span.start);
            let hi = range.end.min(end);
            if lo >= hi {
                continue;
            }
            let bytes = self.text[lo..hi]
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .count();
            if bytes > 0 {
                out.push((span.page, span.category, bytes));
            }
        }
        out
    }

    /// Page holding the byte at `offset`.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        self.pages
            .iter()
            .take_while(|span| span.start <= offset)
            .last()
            .map(|span| span.page)
    }
}

/// Whether a line keeps its own line in the stream.
fn stands_alone(line: &str) -> bool {
    if line.contains("[FN(") || line.contains(BLOCK_QUOTE_OPEN) {
        return false;
    }
    let len = line.chars().count();
    if !(4..=MAX_STANDALONE_LEN).contains(&len) {
        return false;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    if letters >= 3 && uppercase_ratio(line) >= 0.6 {
        return true;
    }
    if HEAD_PREFIX.is_match(line) && len <= 120 && !line.ends_with([',', ';']) {
        // numbered title-case heading, not a numbered paragraph wrapping on
        return line
            .split_whitespace()
            .last()
            .and_then(|w| w.chars().next())
            .map(|c| c.is_uppercase() || c.is_ascii_digit())
            .unwrap_or(false);
    }
    false
}

#[derive(Debug, Clone, Default)]
struct Context {
    section: Option<SectionPath>,
    exhibit_label: Option<String>,
    exhibit_title: Option<String>,
}

struct RegionBuilder {
    region: Region,
    pending_paragraph: bool,
    ends_line: bool,
}

impl RegionBuilder {
    fn new(ctx: &Context) -> Self {
        Self {
            region: Region {
                section: ctx.section.clone(),
                exhibit_label: ctx.exhibit_label.clone(),
                exhibit_title: ctx.exhibit_title.clone(),
                ..Default::default()
            },
            pending_paragraph: false,
            ends_line: false,
        }
    }

    fn push_line(&mut self, page: &PreparedPage, raw: &str, heading: bool) {
        let line = raw.trim();
        if line.is_empty() {
            if !self.region.text.is_empty() {
                self.pending_paragraph = true;
            }
            return;
        }

        let alone = heading || stands_alone(line);
        let text = &mut self.region.text;
        if !text.is_empty() {
            if self.pending_paragraph {
                text.push_str("\n\n");
            } else if alone || self.ends_line || line.starts_with(BLOCK_QUOTE_OPEN) {
                text.push('\n');
            } else {
                let hyphenated = {
                    let mut tail = text.chars().rev();
                    matches!((tail.next(), tail.next()), (Some('-'), Some(c)) if c.is_alphabetic())
                };
                let continues = line.chars().next().map(char::is_lowercase).unwrap_or(false);
                if hyphenated && continues {
                    text.pop();
                } else {
                    text.push(' ');
                }
            }
        }

        if self.region.pages.last().map(|s| s.page) != Some(page.number) {
            self.region.pages.push(PageSpan {
                start: text.len(),
                page: page.number,
                category: page.category,
            });
        }
        text.push_str(line);
        self.pending_paragraph = false;
        self.ends_line = alone || line.ends_with(BLOCK_QUOTE_CLOSE);
    }
}

impl Region {
    fn only_service(&self) -> bool {
        !self.pages.is_empty()
            && self
                .pages
                .iter()
                .all(|span| span.category == PageCategory::ProofOfService)
    }

    /// Append `other` after a paragraph break.
    fn append(&mut self, other: Region) {
        let shift = self.text.len() + 2;
        self.text.push_str("\n\n");
        self.text.push_str(&other.text);
        self.pages.extend(other.pages.into_iter().map(|span| PageSpan {
            start: span.start + shift,
            ..span
        }));
    }
}

/// Fold regions made only of proof-of-service pages into the previous
/// region, or into the next one at the start of the body.
fn fold_service_regions(regions: &mut Vec<Region>) {
    let mut k = 0;
    while k < regions.len() && regions.len() > 1 {
        if !regions[k].only_service() {
            k += 1;
            continue;
        }
        let service = regions.remove(k);
        if k > 0 {
            regions[k - 1].append(service);
        } else {
            let next = regions.remove(0);
            let mut merged = Region {
                section: next.section.clone(),
                exhibit_label: next.exhibit_label.clone(),
                exhibit_title: next.exhibit_title.clone(),
                ..service
            };
            merged.append(next);
            regions.insert(0, merged);
        }
    }
}

/// Aligned outline used to cut the stream into sections.
#[derive(Debug, Clone, Copy)]
pub struct Outline<'a> {
    /// Parsed TOC
    pub forest: &'a TocForest,
    /// Matched headings, in body order
    pub markers: &'a [HierarchyMarker],
}

/// Ordered regions of a document's body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyStream {
    /// Regions in reading order
    pub regions: Vec<Region>,
}

impl BodyStream {
    /// Build the stream from prepared pages.
    ///
    /// Table-of-contents and table-of-authorities pages never contribute.
    /// Proof-of-service pages are dropped when `exclude_proof_of_service`
    /// is set; otherwise they join the surrounding region.
    pub fn build(
        pages: &[PreparedPage],
        exhibits: &[Exhibit],
        outline: Option<Outline<'_>>,
        options: &ChunkOptions,
    ) -> Self {
        let mut markers: Vec<HierarchyMarker> =
            outline.map(|o| o.markers.to_vec()).unwrap_or_default();
        markers.sort_by_key(|m| m.position);
        let mut next_marker = 0;

        let mut regions: Vec<Region> = Vec::new();
        let mut cur: Option<RegionBuilder> = None;
        let mut section: Option<SectionPath> = None;
        let mut ctx = Context::default();
        let mut prev_exhibit: Option<usize> = None;
        let mut started = false;
        let mut force_cut = false;

        fn close(cur: &mut Option<RegionBuilder>, regions: &mut Vec<Region>) {
            if let Some(builder) = cur.take() {
                if !builder.region.text.trim().is_empty() {
                    regions.push(builder.region);
                }
            }
        }

        for page in pages {
            let is_pos = page.category == PageCategory::ProofOfService;
            let skipped = page.category.is_front_matter() || (is_pos && options.exclude_proof_of_service);

            if skipped {
                // markers on skipped pages still move the section forward
                while let Some(m) = markers.get(next_marker).filter(|m| m.position.page <= page.number) {
                    if let Some(o) = outline {
                        section = Some(o.forest.path(m.entry));
                    }
                    next_marker += 1;
                }
                if is_pos {
                    force_cut = true;
                }
                continue;
            }

            let exhibit = if is_pos {
                prev_exhibit
            } else {
                exhibits.iter().position(|e| e.contains(page.number))
            };
            if !started || exhibit != prev_exhibit || force_cut {
                close(&mut cur, &mut regions);
                ctx = match exhibit.and_then(|i| exhibits.get(i)) {
                    Some(e) => Context {
                        section: outline.map(|_| SectionPath::single(e.label.clone())),
                        exhibit_label: Some(e.label.clone()),
                        exhibit_title: e.title.clone(),
                    },
                    None => Context {
                        section: section.clone(),
                        ..Default::default()
                    },
                };
                started = true;
                force_cut = false;
            }
            prev_exhibit = exhibit;

            for (idx, line) in page.text.split('\n').enumerate() {
                let mut heading = false;
                while let Some(m) = markers.get(next_marker).filter(|m| {
                    (m.position.page, m.position.line) <= (page.number, idx)
                }) {
                    if let Some(o) = outline {
                        section = Some(o.forest.path(m.entry));
                    }
                    next_marker += 1;
                    if exhibit.is_none() {
                        close(&mut cur, &mut regions);
                        ctx.section = section.clone();
                        heading = true;
                    }
                }

                cur.get_or_insert_with(|| RegionBuilder::new(&ctx))
                    .push_line(page, line, heading);
            }
        }
        close(&mut cur, &mut regions);
        fold_service_regions(&mut regions);

        log::debug!("Body stream has {} regions", regions.len());
        Self { regions }
    }

    /// Whole stream text, regions separated by blank lines.
    pub fn text(&self) -> String {
        self.regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
