//! Inline tags for footnotes and block quotes.
//!
//! Footnotes are relocated next to their first in-body reference and
//! wrapped as `[FN(n)] text [FN(n)_end]`; runs of indented lines are wrapped
//! as `[Block_quote] ... [Block_quote_end]`. Tagged spans are atomic for the
//! chunkers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use super::normalize::has_heading_shape;
use crate::model::Footnote;

/// Opening block-quote tag.
pub const BLOCK_QUOTE_OPEN: &str = "[Block_quote]";

/// Closing block-quote tag.
pub const BLOCK_QUOTE_CLOSE: &str = "[Block_quote_end]";

static FOOTNOTE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[FN\(([^)\]]+)\)\]").expect("valid footnote tag regex"));

static ANY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]*\[(?:FN\([^)\]]+\)(?:_end)?|Block_quote(?:_end)?)\][ \t]*")
        .expect("valid tag regex")
});

/// Kind of a tagged span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `[FN(n)] ... [FN(n)_end]`
    Footnote,
    /// `[Block_quote] ... [Block_quote_end]`
    BlockQuote,
}

/// A tagged span, tags included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSpan {
    /// Byte range within the text
    pub range: Range<usize>,
    /// Tag kind
    pub kind: TagKind,
}

/// Opening tag for footnote `n`.
pub fn footnote_open(number: &str) -> String {
    format!("[FN({})]", number)
}

/// Closing tag for footnote `n`.
pub fn footnote_close(number: &str) -> String {
    format!("[FN({})_end]", number)
}

/// Render a tagged footnote on a single line.
pub fn tag_footnote(footnote: &Footnote) -> String {
    let body = footnote.text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "{} {} {}",
        footnote_open(&footnote.number),
        body,
        footnote_close(&footnote.number)
    )
}

/// Find all tagged spans, in text order. An unclosed tag runs to the end of the text.
pub fn tagged_spans(text: &str) -> Vec<TaggedSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let next_fn = FOOTNOTE_OPEN.captures_at(text, pos);
        let next_bq = text[pos..].find(BLOCK_QUOTE_OPEN).map(|i| i + pos);

        let fn_start = next_fn.as_ref().and_then(|c| c.get(0)).map(|m| m.start());
        let take_footnote = match (fn_start, next_bq) {
            (Some(f), Some(b)) => f < b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let (start, close, kind, open_len) = if take_footnote {
            let caps = match next_fn {
                Some(c) => c,
                None => break,
            };
            let whole = match caps.get(0) {
                Some(m) => m,
                None => break,
            };
            (
                whole.start(),
                footnote_close(&caps[1]),
                TagKind::Footnote,
                whole.len(),
            )
        } else {
            let start = match next_bq {
                Some(b) => b,
                None => break,
            };
            (
                start,
                BLOCK_QUOTE_CLOSE.to_string(),
                TagKind::BlockQuote,
                BLOCK_QUOTE_OPEN.len(),
            )
        };

        let search_from = start + open_len;
        let end = text[search_from..]
            .find(&close)
            .map(|i| search_from + i + close.len())
            .unwrap_or(text.len());
        spans.push(TaggedSpan {
            range: start..end,
            kind,
        });
        pos = end;
    }

    spans
}

/// Remove all inline tags, keeping the tagged content.
pub fn strip_tags(text: &str) -> String {
    let replaced = ANY_TAG.replace_all(text, " ");
    replaced
        .split('\n')
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Wrap runs of two or more indented lines in block-quote tags.
///
/// A line is indented when it starts with four spaces or a tab. Numbered or
/// upper-case lines (centered headings) never join a run.
pub fn tag_block_quotes(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let is_quote_line = |line: &str| {
        (line.starts_with("    ") || line.starts_with('\t'))
            && !line.trim().is_empty()
            && !has_heading_shape(line)
            && !line.contains(BLOCK_QUOTE_OPEN)
    };

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if !is_quote_line(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let start = i;
        while i < lines.len() && is_quote_line(lines[i]) {
            i += 1;
        }
        if i - start < 2 {
            out.push(lines[start].to_string());
            continue;
        }

        let last = i - 1;
        for (j, line) in lines.iter().enumerate().take(i).skip(start) {
            let body = line.trim();
            let mut tagged = String::new();
            if j == start {
                tagged.push_str(BLOCK_QUOTE_OPEN);
                tagged.push(' ');
            }
            tagged.push_str(body);
            if j == last {
                tagged.push(' ');
                tagged.push_str(BLOCK_QUOTE_CLOSE);
            }
            out.push(tagged);
        }
    }

    out.join("\n")
}

/// Regex matching a phrase with flexible whitespace.
fn flexible(phrase: &str) -> Option<Regex> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    Regex::new(&words.join(r"\s+")).ok()
}

/// Remove a footnote's own text (and its leading marker) from the page.
fn remove_footnote_body(text: &str, footnote: &Footnote) -> Option<String> {
    let words: Vec<String> = footnote.text.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(?:[ \t]*{}[ \t.)]*)?{}",
        regex::escape(footnote.number.trim()),
        words.join(r"\s+")
    );
    let re = Regex::new(&pattern).ok()?;
    let found = re.find_iter(text).last()?;
    let mut out = String::with_capacity(text.len());
    out.push_str(text[..found.start()].trim_end_matches([' ', '\t']));
    out.push_str(&text[found.end()..]);
    Some(out)
}

/// Locate the in-body reference: returns (insert_at, marker range to delete).
fn find_reference(text: &str, footnote: &Footnote) -> Option<(usize, Option<Range<usize>>)> {
    let marker = regex::escape(footnote.number.trim());
    let trailing = Regex::new(&format!(
        r#"^([.,;:)"”’]*)\^?({})(?:[\s.,;:]|$)"#,
        marker
    ))
    .ok()?;

    if let Some(context) = footnote.context.as_deref() {
        if let Some(found) = flexible(context).and_then(|re| re.find(text)) {
            let rest = &text[found.end()..];
            if let Some(caps) = trailing.captures(rest) {
                let punct_end = caps.get(1).map(|m| m.end()).unwrap_or(0);
                if let Some(m) = caps.get(2) {
                    return Some((
                        found.end() + punct_end,
                        Some(found.end() + m.start()..found.end() + m.end()),
                    ));
                }
            }
            return Some((found.end(), None));
        }
    }

    let bare = Regex::new(&format!(
        r#"[A-Za-z)\].,;:"”’]\^?({})(?:[\s.,;:]|$)"#,
        marker
    ))
    .ok()?;
    let caps = bare.captures(text)?;
    let m = caps.get(1)?;
    Some((m.start(), Some(m.start()..m.end())))
}

/// Relocate footnotes next to their first in-body reference.
///
/// The footnote's own text is removed from the page bottom when it can be
/// found. A footnote whose reference cannot be located is appended to the
/// end of the page.
pub fn insert_footnotes(text: &str, footnotes: &[Footnote]) -> String {
    let mut page = text.to_string();

    for footnote in footnotes {
        if footnote.text.trim().is_empty() {
            continue;
        }
        if let Some(without) = remove_footnote_body(&page, footnote) {
            page = without;
        } else {
            log::debug!(
                "Footnote {} text not found on page; inserting without removal",
                footnote.number
            );
        }

        let tagged = tag_footnote(footnote);
        match find_reference(&page, footnote) {
            Some((insert_at, marker)) => {
                let mut out = String::with_capacity(page.len() + tagged.len() + 2);
                let tail_start = marker.map(|range| range.end).unwrap_or(insert_at);
                out.push_str(&page[..insert_at]);
                out.push(' ');
                out.push_str(&tagged);
                let tail = &page[tail_start..];
                if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(tail);
                page = out;
            }
            None => {
                log::debug!(
                    "No in-body reference for footnote {}; appending to page",
                    footnote.number
                );
                page = page.trim_end().to_string();
                page.push('\n');
                page.push_str(&tagged);
            }
        }
    }

    page.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footnote_moves_after_context_phrase() {
        let text = "Plaintiff relies on the statute.1 The court disagreed.\n\n1 See Cal. Civ. Code § 1542.";
        let fnote = Footnote::new("1", "See Cal. Civ. Code § 1542.").with_context("relies on the statute");
        let out = insert_footnotes(text, &[fnote]);
        assert_eq!(
            out,
            "Plaintiff relies on the statute. [FN(1)] See Cal. Civ. Code § 1542. [FN(1)_end] The court disagreed."
        );
    }

    #[test]
    fn test_footnote_found_by_marker() {
        let text = "The motion fails.2 Next sentence.\n2 Defendant waived\nthis argument.";
        let fnote = Footnote::new("2", "Defendant waived this argument.");
        let out = insert_footnotes(text, &[fnote]);
        assert_eq!(
            out,
            "The motion fails. [FN(2)] Defendant waived this argument. [FN(2)_end] Next sentence."
        );
    }

    #[test]
    fn test_unreferenced_footnote_is_appended() {
        let fnote = Footnote::new("3", "Unmatched note.");
        let out = insert_footnotes("Body text without markers.", &[fnote]);
        assert_eq!(out, "Body text without markers.\n[FN(3)] Unmatched note. [FN(3)_end]");
    }

    #[test]
    fn test_block_quotes_tagged() {
        let text = "The court held:\n    A party may not\n    recover twice.\nThus the claim fails.\n    single indented line";
        let out = tag_block_quotes(text);
        assert_eq!(
            out,
            "The court held:\n[Block_quote] A party may not\nrecover twice. [Block_quote_end]\nThus the claim fails.\n    single indented line"
        );
    }

    #[test]
    fn test_centered_headings_are_not_quotes() {
        let text = "        ARGUMENT\n        I. THE CLAIM FAILS";
        assert_eq!(tag_block_quotes(text), text);
    }

    #[test]
    fn test_tagged_spans() {
        let text = "a [FN(1)] x [FN(1)_end] b [Block_quote] q\nr [Block_quote_end] c [FN(2)] open";
        let spans = tagged_spans(text);
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[0].range.clone()], "[FN(1)] x [FN(1)_end]");
        assert_eq!(spans[1].kind, TagKind::BlockQuote);
        assert_eq!(&text[spans[1].range.clone()], "[Block_quote] q\nr [Block_quote_end]");
        assert_eq!(spans[2].range.end, text.len());
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("[Block_quote] A party\nmay not. [Block_quote_end]\nThen [FN(1)] note [FN(1)_end] more."),
            "A party\nmay not.\nThen note more."
        );
    }
}
