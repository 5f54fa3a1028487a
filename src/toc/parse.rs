//! Parsing of extracted table-of-contents text into an outline.
//!
//! Two input shapes are accepted: markdown headings (`#`, `##`, ...) as
//! produced by the vision extraction, and plain OCR lines with dot leaders.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::{TocEntry, TocForest};
use crate::text::{is_top_title, normalize_for_match, split_label, HEAD_PREFIX};

static MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(#+)\s+(\S.*)$").expect("valid markdown heading regex"));

static DOT_LEADER_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:\.[\s.]*\.|…+|_{2,})\s*(\d{1,4})\s*$").expect("valid dot leader regex")
});

static SPACED_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}(\d{1,4})\s*$").expect("valid page number regex"));

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s*$").expect("valid trailing number regex"));

static ROMAN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[IVXLCDM]+\.$").expect("valid roman label regex"));

static COMPOUND_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[IVXLCDM]+\.[A-Z0-9]+\.$").expect("valid compound label regex"));

static LETTER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\.$").expect("valid letter label regex"));

/// Split a trailing printed page number off a TOC line.
fn strip_page_hint(line: &str) -> (String, Option<u32>) {
    for re in [&*DOT_LEADER_PAGE, &*SPACED_PAGE] {
        if let Some(caps) = re.captures(line) {
            let page = caps[1].parse().ok();
            let end = caps.get(0).map(|m| m.start()).unwrap_or(line.len());
            return (line[..end].trim().to_string(), page);
        }
    }
    (line.trim().to_string(), None)
}

/// Depth implied by a heading's numbering.
///
/// Well-known top titles are level 1, roman numerals 2, compound and
/// letter labels 3, digits and parenthesized labels 4.
pub fn depth_from_label(heading: &str) -> u8 {
    if is_top_title(heading) {
        return 1;
    }
    let (label, title) = split_label(heading);
    match label.as_deref() {
        Some(l) if ROMAN_LABEL.is_match(l) => 2,
        Some(l) if COMPOUND_LABEL.is_match(l) || LETTER_LABEL.is_match(l) => 3,
        Some(_) => 4,
        None => {
            let is_upper = title.chars().any(|c| c.is_alphabetic())
                && !title.chars().any(|c| c.is_lowercase());
            if is_upper && title.split_whitespace().count() <= 3 {
                1
            } else {
                3
            }
        }
    }
}

/// TOC page furniture: the title and the "Page" column caption.
fn is_header_line(line: &str) -> bool {
    matches!(
        normalize_for_match(line).as_str(),
        "table of contents" | "page" | "table of contents page"
    )
}

/// Group raw lines into one string per entry, with the markdown level if any.
fn entry_lines(text: &str) -> Vec<(Option<u8>, String)> {
    let lines: Vec<&str> = text.lines().collect();

    if lines.iter().any(|l| MARKDOWN_HEADING.is_match(l)) {
        return lines
            .iter()
            .filter_map(|l| MARKDOWN_HEADING.captures(l))
            .map(|caps| {
                let level = caps[1].len().min(u8::MAX as usize) as u8;
                (Some(level), caps[2].trim().to_string())
            })
            .collect();
    }

    // OCR mode: wrapped entries are joined until a page number, a blank
    // line, or the next numbered line
    let mut out = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        let starts_entry = HEAD_PREFIX.is_match(trimmed) || is_top_title(trimmed);
        if trimmed.is_empty() || is_header_line(trimmed) || starts_entry {
            if !buf.is_empty() {
                out.push((None, buf.join(" ")));
                buf.clear();
            }
            if !starts_entry {
                continue;
            }
        }
        buf.push(trimmed);
        if TRAILING_NUMBER.is_match(trimmed) {
            out.push((None, buf.join(" ")));
            buf.clear();
        }
    }
    if !buf.is_empty() {
        out.push((None, buf.join(" ")));
    }
    out
}

/// Parse extracted TOC text into a validated outline.
///
/// The "TABLE OF CONTENTS" header and column captions are dropped, and the
/// levels in use are renumbered densely from 1 so a document whose first
/// level is `##` or roman numerals still forms a proper forest.
pub fn parse_toc(text: &str) -> Result<TocForest> {
    let mut entries: Vec<TocEntry> = Vec::new();

    for (level, line) in entry_lines(text) {
        let (heading, page_hint) = strip_page_hint(&line);
        if normalize_for_match(&heading).is_empty() || is_header_line(&heading) {
            continue;
        }

        let depth = level.unwrap_or_else(|| depth_from_label(&heading)).max(1);
        let mut entry = TocEntry::new(heading, depth);
        entry.page_hint = page_hint;
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(Error::TocParse("no TOC entries found".to_string()));
    }

    let levels: BTreeSet<u8> = entries.iter().map(|e| e.depth).collect();
    let ranks: Vec<u8> = levels.into_iter().collect();
    for entry in &mut entries {
        let rank = ranks.iter().position(|&l| l == entry.depth).unwrap_or(0);
        entry.depth = rank as u8 + 1;
    }

    log::debug!("Parsed {} TOC entries", entries.len());
    Ok(TocForest::new(entries))
}
