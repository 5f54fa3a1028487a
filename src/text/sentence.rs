//! Sentence splitting aware of legal citations and inline tags.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

use super::tags::{tagged_spans, TagKind};

/// Abbreviations that end with a period but rarely end a sentence in filings.
const ABBREVIATIONS: [&str; 44] = [
    "v.", "vs.", "No.", "Nos.", "Inc.", "Corp.", "Co.", "Ltd.", "Cal.", "App.", "Rptr.", "Civ.",
    "Proc.", "Pen.", "Evid.", "Gov.", "Bus.", "Prof.", "Fam.", "Fed.", "Supp.", "Cir.", "Ct.",
    "Dist.", "Stat.", "Ann.", "Reg.", "U.S.", "U.S.C.", "Id.", "id.", "e.g.", "i.e.", "al.",
    "Mr.", "Ms.", "Mrs.", "Dr.", "St.", "Sec.", "art.", "fn.", "p.", "pp.",
];

/// Whether a sentence's final word is an abbreviation or an initial.
fn ends_with_abbreviation(sentence: &str) -> bool {
    let last = match sentence.split_whitespace().last() {
        Some(w) => w.trim_start_matches(['(', '[', '"', '“']),
        None => return false,
    };
    if ABBREVIATIONS.contains(&last) {
        return true;
    }
    // single initial ("J.") or chained reporter abbreviation ("Cal.App.")
    let bytes = last.as_bytes();
    (bytes.len() == 2 && bytes[0].is_ascii_uppercase() && bytes[1] == b'.')
        || (last.ends_with('.') && last[..last.len() - 1].contains('.') && last.len() <= 12)
}

/// Split text into sentence ranges covering the whole input.
///
/// Tagged spans are never split. A footnote that opens a sentence is moved
/// back onto the sentence holding its reference. Breaks after legal
/// abbreviations ("Cal.", "v.", "Id.") or before a lower-case continuation
/// are removed, except across line breaks.
pub fn sentence_ranges(text: &str) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    let spans = tagged_spans(text);
    let mut masked = text.as_bytes().to_vec();
    for span in &spans {
        for b in &mut masked[span.range.clone()] {
            *b = b'X';
        }
        // a tagged span reads as one word closing its sentence
        if span.range.end > span.range.start {
            masked[span.range.end - 1] = b'.';
        }
    }
    // only ASCII bytes were written over whole UTF-8 sequences
    let masked = String::from_utf8(masked).unwrap_or_else(|_| text.to_string());

    let mut starts: Vec<usize> = masked
        .split_sentence_bound_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .filter(|&i| !spans.iter().any(|s| s.range.start < i && i < s.range.end))
        .collect();

    // a footnote opening a sentence belongs to the previous one
    for start in starts.iter_mut() {
        let lead = text[*start..].len() - text[*start..].trim_start().len();
        let begins_at = *start + lead;
        if let Some(span) = spans
            .iter()
            .find(|s| s.kind == TagKind::Footnote && s.range.start == begins_at)
        {
            let after = &text[span.range.end..];
            let ws = after.len() - after.trim_start().len();
            *start = span.range.end + ws;
        }
    }
    starts.retain(|&i| i < text.len());
    starts.dedup();

    let mut boundaries: Vec<usize> = Vec::with_capacity(starts.len() + 2);
    boundaries.push(0);
    for start in starts {
        let prev = boundaries.last().copied().unwrap_or(0);
        if start <= prev {
            continue;
        }
        let before = &text[prev..start];
        let after = text[start..].trim_start();
        let crosses_line = before.trim_end_matches([' ', '\t']).ends_with('\n');
        let continues = after
            .chars()
            .next()
            .map(|c| c.is_lowercase() || c.is_ascii_digit())
            .unwrap_or(false);
        if !crosses_line && (ends_with_abbreviation(before) || continues) {
            continue;
        }
        boundaries.push(start);
    }
    boundaries.push(text.len());

    boundaries.windows(2).map(|w| w[0]..w[1]).collect()
}

/// Split text into sentences (each keeps its trailing whitespace).
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_ranges(text)
        .into_iter()
        .map(|r| &text[r])
        .collect()
}
