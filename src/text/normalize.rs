//! Text normalization for heading comparison.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Numbering prefix of a heading: `I.`, `II.A`, `1.`, `1.2`, `A.`, `(1)`, `(A)`.
///
/// Roman numerals need their trailing dot so that "I think" or "CIVIL" are
/// not read as numbered.
pub static HEAD_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((?:[IVXLCDM]+\.[A-Z0-9]{1,3}\.?)|(?:[IVXLCDM]+\.)|(?:\d+(?:\.\d+)*\.?)|(?:[A-Z]\.)|(?:\(?\d+\))|(?:\(?[A-Za-z]\)))\s+",
    )
    .expect("valid heading prefix regex")
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Headings that are top-level regardless of numbering.
pub const TOP_TITLES: [&str; 6] = [
    "introduction",
    "background",
    "argument",
    "conclusion",
    "table of contents",
    "table of authorities",
];

const STRUCTURAL_KEYWORDS: [&str; 7] = [
    "introduction",
    "background",
    "argument",
    "conclusion",
    "standard",
    "facts",
    "procedural history",
];

/// Normalize text for similarity comparison.
///
/// NFKC, dashes unified, lower-cased, punctuation replaced by spaces and
/// whitespace collapsed.
pub fn normalize_for_match(s: &str) -> String {
    let s: String = s
        .nfkc()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            c => c,
        })
        .collect();
    let s = s.to_lowercase();
    let s = NON_WORD.replace_all(&s, " ");
    WHITESPACE.replace_all(&s, " ").trim().to_string()
}

/// Normalized form of a full heading, label included.
pub fn match_key(heading: &str) -> String {
    normalize_for_match(heading)
}

/// Normalized form of a heading with its numbering prefix removed.
pub fn body_key(heading: &str) -> String {
    let trimmed = heading.trim();
    normalize_for_match(&HEAD_PREFIX.replace(trimmed, ""))
}

/// Split a heading into its canonical numbering label and the remaining title.
///
/// Labels are canonicalized so both sides of a comparison agree:
/// "II" and "II." become "II.", "(1)" stays "(1)".
pub fn split_label(heading: &str) -> (Option<String>, String) {
    let trimmed = heading.trim();
    match HEAD_PREFIX.captures(trimmed) {
        Some(caps) => {
            let raw = caps[1].trim();
            let label = if raw.ends_with(')') {
                raw.to_string()
            } else {
                format!("{}.", raw.trim_end_matches('.'))
            };
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            (Some(label), trimmed[end..].trim().to_string())
        }
        None => (None, trimmed.to_string()),
    }
}

/// Whether the normalized text is one of the well-known top-level titles.
pub fn is_top_title(s: &str) -> bool {
    let norm = normalize_for_match(s);
    TOP_TITLES.contains(&norm.as_str())
}

/// Share of upper-case letters among all letters.
pub fn uppercase_ratio(s: &str) -> f64 {
    let (upper, alpha) = s.chars().filter(|c| c.is_alphabetic()).fold((0usize, 0usize), |(u, a), c| {
        (u + c.is_uppercase() as usize, a + 1)
    });
    if alpha == 0 {
        0.0
    } else {
        upper as f64 / alpha as f64
    }
}

/// Whether a line is numbered or mostly upper case.
pub fn has_heading_shape(line: &str) -> bool {
    let s = line.trim();
    HEAD_PREFIX.is_match(s) || uppercase_ratio(s) >= 0.6
}

/// Whether a line looks like a heading.
///
/// Its trimmed length is 4..=`max_len`, it does not end with a colon, and it
/// has a numbering prefix, is mostly upper case, or names a structural
/// section (introduction, argument, ...).
pub fn is_heading_like(line: &str, max_len: usize) -> bool {
    let s = line.trim();
    let len = s.chars().count();
    if len < 4 || len > max_len || s.ends_with(':') {
        return false;
    }
    if has_heading_shape(s) {
        return true;
    }
    let norm = normalize_for_match(s);
    STRUCTURAL_KEYWORDS.iter().any(|k| norm.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(
            normalize_for_match("  II.  ARGUMENT — Liability’s   Scope "),
            "ii argument liability s scope"
        );
        assert_eq!(normalize_for_match("ﬁnding"), "finding");
    }

    #[test]
    fn test_split_label() {
        assert_eq!(
            split_label("II. ARGUMENT"),
            (Some("II.".to_string()), "ARGUMENT".to_string())
        );
        assert_eq!(
            split_label("II.A Liability Standards"),
            (Some("II.A.".to_string()), "Liability Standards".to_string())
        );
        assert_eq!(
            split_label("(1) Notice"),
            (Some("(1)".to_string()), "Notice".to_string())
        );
        assert_eq!(split_label("1.2 Scope").0.as_deref(), Some("1.2."));
        assert_eq!(split_label("INTRODUCTION"), (None, "INTRODUCTION".to_string()));
    }

    #[test]
    fn test_body_key_drops_prefix() {
        assert_eq!(body_key("A. Liability Standards"), "liability standards");
        assert_eq!(body_key("ARGUMENT"), "argument");
    }

    #[test]
    fn test_heading_predicate() {
        assert!(is_heading_like("I. INTRODUCTION", 200));
        assert!(is_heading_like("STATEMENT OF FACTS", 200));
        assert!(is_heading_like("Procedural History", 200));
        assert!(is_heading_like("A. The Contract Was Breached", 200));
        assert!(!is_heading_like("The parties agree as follows:", 200));
        assert!(!is_heading_like("Id.", 200));
        assert!(!is_heading_like("the court held that the statute applies here", 200));
        assert!(!is_heading_like(&"A".repeat(201), 200));
    }

    #[test]
    fn test_top_titles() {
        assert!(is_top_title("INTRODUCTION"));
        assert!(is_top_title("Table of Contents"));
        assert!(!is_top_title("Statement of Facts"));
    }
}
