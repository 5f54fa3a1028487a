//! Page text cleanup applied when OCR text is loaded.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// A line holding nothing but a pleading-paper line number.
static LINE_NUMBER_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d{1,2}\s*$").expect("valid line-number regex"));

/// A pleading-paper line number in front of the line content.
static LEADING_LINE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*\d{1,2}(?:[ \t]|$)").expect("valid line-number regex"));

const LIGATURES: [(&str, &str); 7] = [
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
    ("\u{FB05}", "st"),
    ("\u{FB06}", "st"),
];

/// Options for page text cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Normalize Unicode to NFC form
    pub normalize_unicode: bool,

    /// Fix ligatures (fi, fl, etc.)
    pub fix_ligatures: bool,

    /// Remove Unicode replacement character (U+FFFD)
    pub remove_replacement_char: bool,

    /// Remove pleading-paper line numbers (1..28 down the left margin)
    pub strip_line_numbers: bool,

    /// Expand tabs to four spaces and trim trailing whitespace
    pub normalize_whitespace: bool,
}

impl CleanupOptions {
    /// Only Unicode normalization.
    pub fn minimal() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: false,
            remove_replacement_char: false,
            strip_line_numbers: false,
            normalize_whitespace: false,
        }
    }

    /// Every stage enabled.
    pub fn standard() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: true,
            remove_replacement_char: true,
            strip_line_numbers: true,
            normalize_whitespace: true,
        }
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::standard()
    }
}

/// Page text cleanup.
///
/// Line structure and indentation survive cleanup: block-quote detection and
/// heading scans both work on lines.
#[derive(Debug, Clone, Default)]
pub struct CleanupPipeline {
    options: CleanupOptions,
}

impl CleanupPipeline {
    /// Create a new cleanup pipeline with the given options.
    pub fn new(options: CleanupOptions) -> Self {
        Self { options }
    }

    /// Process one page of text.
    pub fn process(&self, text: &str) -> String {
        let mut result = if self.options.normalize_unicode {
            text.nfc().collect::<String>()
        } else {
            text.to_string()
        };

        if self.options.fix_ligatures {
            for (ligature, replacement) in LIGATURES {
                result = result.replace(ligature, replacement);
            }
        }

        if self.options.remove_replacement_char {
            result = result.replace('\u{FFFD}', "");
        }

        if self.options.strip_line_numbers {
            result = strip_line_numbers(&result);
        }

        if self.options.normalize_whitespace {
            result = result
                .lines()
                .map(|line| line.replace('\t', "    ").trim_end().to_string())
                .collect::<Vec<_>>()
                .join("\n");
        }

        result
    }
}

/// Fewest numbered lines that make a page pleading paper.
const MIN_NUMBERED_LINES: usize = 3;

/// Whether most non-blank lines open with an ascending line number.
fn has_pleading_numbers(text: &str) -> bool {
    let mut lines = 0;
    let mut numbers: Vec<u32> = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        lines += 1;
        if let Some(m) = LEADING_LINE_NUMBER.find(line) {
            if let Ok(n) = m.as_str().trim().parse::<u32>() {
                numbers.push(n);
            }
        }
    }
    let ascending = numbers.windows(2).filter(|w| w[1] > w[0]).count();
    numbers.len() >= MIN_NUMBERED_LINES
        && numbers.len() * 2 > lines
        && ascending * 2 >= numbers.len()
}

/// Remove pleading-paper line numbers.
///
/// Only pages where most lines carry ascending numbers are touched. On
/// those, lines consisting only of a one- or two-digit number are dropped
/// and a leading number followed by a separator is removed, keeping any
/// further indentation.
pub fn strip_line_numbers(text: &str) -> String {
    if !has_pleading_numbers(text) {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !LINE_NUMBER_ONLY.is_match(line))
        .map(|line| LEADING_LINE_NUMBER.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
