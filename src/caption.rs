//! Caption metadata extraction.
//!
//! Caption payloads arrive as JSON, as JSON inside a ```json fence, or as
//! free text. Free text is searched with patterns for the usual caption
//! fields; anything not found stays `None`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::model::CaptionMetadata;

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"```json\s*(.*?)\s*```")
        .dot_matches_new_line(true)
        .build()
        .expect("valid regex")
});

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("valid regex")
}

static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:MEMORANDUM|OPPOSITION|REPLY|COMPLAINT|ANSWER|DEMURRER|NOTICE OF MOTION)[^\n]*",
        r"(?:FIRST AMENDED COMPLAINT|SECOND AMENDED COMPLAINT)[^\n]*",
        r"(?:MOTION|BRIEF|DECLARATION)[^\n]*",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4}",
        r"\d{1,2}/\d{1,2}/\d{4}",
        r"\d{4}-\d{2}-\d{2}",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

static PARTY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"Attorneys?\s+for\s+([^\n]+)", r"By:\s+([^\n]+?)(?:\s+Attorney|$)"]
        .iter()
        .map(|p| ci(p))
        .collect()
});

static CASE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Civil\s+Case\s+No\.?\s*:?\s*([A-Z0-9][A-Z0-9-]*)",
        r"Case\s+No\.?\s*:?\s*([A-Z0-9][A-Z0-9-]*)",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

static COURT_PATTERN: Lazy<Regex> =
    Lazy::new(|| ci(r"^\s*((?:SUPERIOR|DISTRICT|SUPREME|BANKRUPTCY)\s+COURT[^\n]*)"));

/// JSON shape written by the caption extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCaption {
    document_title: Option<String>,
    filing_party: Option<String>,
    filing_date: Option<String>,
    case_number: Option<String>,
    court: Option<String>,
    #[serde(alias = "attorney(s)")]
    attorneys: Vec<String>,
    #[serde(alias = "named_plaintiff(s)", alias = "named_plaintiffs")]
    plaintiffs: Vec<String>,
    #[serde(alias = "named_defendant(s)", alias = "named_defendants")]
    defendants: Vec<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("n/a"))
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

impl From<RawCaption> for CaptionMetadata {
    fn from(raw: RawCaption) -> Self {
        Self {
            document_title: clean(raw.document_title),
            filing_party: clean(raw.filing_party),
            filing_date: clean(raw.filing_date),
            case_number: clean(raw.case_number),
            court: clean(raw.court),
            attorneys: clean_list(raw.attorneys),
            plaintiffs: clean_list(raw.plaintiffs),
            defendants: clean_list(raw.defendants),
        }
    }
}

fn first_match(patterns: &[Regex], text: &str, group: usize) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(group))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Extract caption fields from free text.
pub fn parse_caption_text(text: &str) -> CaptionMetadata {
    CaptionMetadata {
        document_title: first_match(&TITLE_PATTERNS, text, 0),
        filing_party: first_match(&PARTY_PATTERNS, text, 1)
            .map(|p| p.trim_end_matches('.').trim().to_string()),
        filing_date: first_match(&DATE_PATTERNS, text, 0),
        case_number: first_match(&CASE_PATTERNS, text, 1),
        court: COURT_PATTERN
            .captures(text)
            .map(|c| c[1].trim().to_string()),
        ..Default::default()
    }
}

/// Extract caption metadata from a caption payload.
///
/// Never fails: malformed JSON falls through to the text patterns.
pub fn parse_caption(payload: &str) -> CaptionMetadata {
    if let Some(caps) = JSON_FENCE.captures(payload) {
        match serde_json::from_str::<RawCaption>(&caps[1]) {
            Ok(raw) => return raw.into(),
            Err(e) => log::debug!("Fenced caption JSON did not parse: {}", e),
        }
    }
    let trimmed = payload.trim();
    if trimmed.starts_with('{') {
        match serde_json::from_str::<RawCaption>(trimmed) {
            Ok(raw) => return raw.into(),
            Err(e) => log::debug!("Caption JSON did not parse: {}", e),
        }
    }
    parse_caption_text(payload)
}
