//! Sentence-level packing of regions into draft chunks.

use std::ops::Range;

use super::stream::Region;
use super::TokenCounter;
use crate::model::{DraftChunk, PageCategory};
use crate::text::{sentence_ranges, tagged_spans};

/// Where a chunk may close when the budget is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseRule {
    /// At the last sentence that fits
    Sentence,
    /// At the last page end that leaves at least `min_tokens`, else at the last sentence
    PageEnd { min_tokens: usize },
}

/// Packs a region's sentences into chunks under a token budget.
pub(crate) struct Packer<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
    rule: CloseRule,
}

impl<'a> Packer<'a> {
    pub(crate) fn new(counter: &'a dyn TokenCounter, max_tokens: usize, rule: CloseRule) -> Self {
        Self {
            counter,
            max_tokens: max_tokens.max(1),
            rule,
        }
    }

    fn tokens(&self, text: &str, range: Range<usize>) -> usize {
        self.counter.count(text[range].trim())
    }

    /// Sentence units of a region: contiguous, never empty, oversized
    /// untagged sentences cut at word boundaries.
    fn units(&self, text: &str) -> Vec<Range<usize>> {
        let mut units: Vec<Range<usize>> = Vec::new();
        let mut carry: Option<usize> = None;
        for r in sentence_ranges(text) {
            if text[r.clone()].trim().is_empty() {
                match units.last_mut() {
                    Some(last) => last.end = r.end,
                    None => carry = Some(carry.unwrap_or(r.start)),
                }
                continue;
            }
            let start = carry.take().unwrap_or(r.start);
            units.push(start..r.end);
        }

        let mut out = Vec::with_capacity(units.len());
        for unit in units {
            if self.tokens(text, unit.clone()) > self.max_tokens
                && tagged_spans(&text[unit.clone()]).is_empty()
            {
                out.extend(self.split_words(text, unit));
            } else {
                out.push(unit);
            }
        }
        out
    }

    /// Cut an oversized sentence into word runs that fit the budget.
    fn split_words(&self, text: &str, unit: Range<usize>) -> Vec<Range<usize>> {
        let mut pieces = Vec::new();
        let mut piece_start = unit.start;
        let mut words_in_piece = 0;

        for (idx, word) in word_starts(&text[unit.clone()]) {
            let word_start = unit.start + idx;
            let word_end = word_start + word.len();
            if words_in_piece > 0 && self.tokens(text, piece_start..word_end) > self.max_tokens {
                pieces.push(piece_start..word_start);
                piece_start = word_start;
                words_in_piece = 0;
            }
            words_in_piece += 1;
        }
        pieces.push(piece_start..unit.end);
        pieces
    }

    /// Pack one region into draft chunks.
    pub(crate) fn pack(&self, region: &Region) -> Vec<DraftChunk> {
        let text = &region.text;
        let units = self.units(text);
        let n = units.len();

        // a unit ends a page when the next unit starts on another page
        let ends_page: Vec<bool> = (0..n)
            .map(|k| match units.get(k + 1) {
                Some(next) => {
                    let last = last_content_byte(text, &units[k]);
                    let first = first_content_byte(text, next);
                    region.page_at(last) != region.page_at(first)
                }
                None => true,
            })
            .collect();

        let mut ranges: Vec<Range<usize>> = Vec::new();
        let mut i = 0;
        while i < n {
            let start = i;
            let mut end = i + 1;
            let mut last_page_end = if ends_page[i] { Some(end) } else { None };
            while end < n {
                if self.tokens(text, units[start].start..units[end].end) > self.max_tokens {
                    break;
                }
                end += 1;
                if ends_page[end - 1] {
                    last_page_end = Some(end);
                }
            }

            let mut cut = end;
            if let CloseRule::PageEnd { min_tokens } = self.rule {
                if end < n {
                    if let Some(pe) = last_page_end.filter(|&pe| pe < end) {
                        if self.tokens(text, units[start].start..units[pe - 1].end) >= min_tokens {
                            cut = pe;
                        }
                    }
                }
            }

            ranges.push(units[start].start..units[cut - 1].end);
            i = cut;
        }

        merge_service_only(region, &mut ranges);

        ranges
            .into_iter()
            .filter_map(|range| self.draft(region, range))
            .collect()
    }

    fn draft(&self, region: &Region, range: Range<usize>) -> Option<DraftChunk> {
        let raw = &region.text[range.clone()];
        let body = raw.trim();
        if body.is_empty() {
            return None;
        }
        let contributions = region.contributions(range);

        let mut page_type: Option<(PageCategory, usize)> = None;
        for (_, category, bytes) in &contributions {
            if page_type.map(|(_, best)| *bytes > best).unwrap_or(true) {
                page_type = Some((*category, *bytes));
            }
        }

        Some(DraftChunk {
            page_numbers: contributions.iter().map(|c| c.0).collect(),
            section_path: region.section.clone(),
            exhibit_label: region.exhibit_label.clone(),
            exhibit_title: region.exhibit_title.clone(),
            page_type: page_type.map(|(c, _)| c).unwrap_or_default(),
            text: body.to_string(),
            token_count: self.counter.count(body),
        })
    }
}

/// Fold chunks whose text comes only from proof-of-service pages into a neighbor.
fn merge_service_only(region: &Region, ranges: &mut Vec<Range<usize>>) {
    if ranges.len() < 2 {
        return;
    }
    let mut k = 0;
    while k < ranges.len() && ranges.len() > 1 {
        let only_service = {
            let c = region.contributions(ranges[k].clone());
            !c.is_empty() && c.iter().all(|(_, cat, _)| *cat == PageCategory::ProofOfService)
        };
        if only_service {
            let removed = ranges.remove(k);
            if k > 0 {
                ranges[k - 1].end = removed.end;
            } else {
                ranges[0].start = removed.start;
            }
        } else {
            k += 1;
        }
    }
}

fn first_content_byte(text: &str, range: &Range<usize>) -> usize {
    let slice = &text[range.clone()];
    range.start + (slice.len() - slice.trim_start().len())
}

fn last_content_byte(text: &str, range: &Range<usize>) -> usize {
    let trimmed = text[range.clone()].trim_end();
    (range.start + trimmed.len()).saturating_sub(1).max(range.start)
}

/// Words with their byte offsets; each word keeps its trailing whitespace.
fn word_starts(text: &str) -> Vec<(usize, &str)> {
    let mut out: Vec<(usize, &str)> = Vec::new();
    let mut start: Option<usize> = None;
    let mut prev_ws = true;
    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if !ws && prev_ws {
            if let Some(s) = start {
                out.push((s, &text[s..i]));
            }
            start = Some(i);
        }
        prev_ws = ws;
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}
