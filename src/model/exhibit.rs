//! Exhibit runs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Page, PageCategory};

static EXHIBIT_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bEXHIBIT\s+([A-Z]{1,2}|\d{1,3})\b").expect("valid exhibit regex")
});

static EXHIBIT_AT_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bEXHIBIT\s+([A-Z]{1,2}|\d{1,3})\s*$").expect("valid exhibit regex")
});

/// An exhibit: a contiguous run of pages introduced by a cover page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exhibit {
    /// Normalized label ("Exhibit A")
    pub label: String,

    /// Title, when the classifier provided one
    pub title: Option<String>,

    /// First page (the cover page)
    pub first_page: u32,

    /// Last page (inclusive)
    pub last_page: u32,
}

impl Exhibit {
    /// Create an exhibit run.
    pub fn new(label: impl AsRef<str>, title: Option<String>, first_page: u32, last_page: u32) -> Self {
        Self {
            label: normalize_label(label.as_ref()),
            title,
            first_page,
            last_page,
        }
    }

    /// Whether the page belongs to this exhibit.
    pub fn contains(&self, page: u32) -> bool {
        (self.first_page..=self.last_page).contains(&page)
    }

    /// Number of pages in the run.
    pub fn page_count(&self) -> u32 {
        self.last_page + 1 - self.first_page
    }
}

/// Normalize an exhibit label: bare "A" or "12" becomes "Exhibit A" / "Exhibit 12".
pub fn normalize_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return collapsed;
    }
    if let Some(caps) = EXHIBIT_IN_TEXT.captures(&collapsed) {
        return format!("Exhibit {}", caps[1].to_uppercase());
    }
    let bare = collapsed.trim_end_matches(['.', ':']);
    if bare.len() <= 3 && bare.chars().all(|c| c.is_ascii_alphanumeric()) {
        return format!("Exhibit {}", bare.to_uppercase());
    }
    collapsed
}

/// Find the exhibit label printed on a cover page.
pub fn label_in_text(text: &str) -> Option<String> {
    EXHIBIT_IN_TEXT
        .captures(text)
        .map(|caps| format!("Exhibit {}", caps[1].to_uppercase()))
}

/// Group exhibit pages into runs.
///
/// A run starts at an exhibit-cover page (or at exhibit content with no
/// open run) and ends before the next cover page, the next
/// proof-of-service page, or at the end of the document.
pub fn detect_exhibits(pages: &[Page]) -> Vec<Exhibit> {
    let mut exhibits: Vec<Exhibit> = Vec::new();
    let mut open = false;

    for (idx, page) in pages.iter().enumerate() {
        let category = page.category();
        let starts = category == PageCategory::ExhibitCover
            || (category == PageCategory::ExhibitContent && !open);

        if starts {
            let label = page
                .exhibit_label()
                .map(normalize_label)
                .or_else(|| label_in_text(&page.text))
                .unwrap_or_else(|| format!("Exhibit {}", exhibits.len() + 1));
            let title = page
                .classification
                .as_ref()
                .and_then(|c| c.exhibit_title.clone())
                .filter(|t| !t.trim().is_empty());
            exhibits.push(Exhibit::new(label, title, page.number, page.number));
            open = true;
        } else if category == PageCategory::ProofOfService {
            open = false;
        } else if open {
            if let Some(current) = exhibits.last_mut() {
                current.last_page = page.number;
                if current.title.is_none() {
                    current.title = page
                        .classification
                        .as_ref()
                        .and_then(|c| c.exhibit_title.clone())
                        .filter(|t| !t.trim().is_empty());
                }
            }
        }

        if category == PageCategory::PleadingBody {
            if let Some(caps) = EXHIBIT_AT_END.captures(page.text.trim_end()) {
                let next_is_cover = pages
                    .get(idx + 1)
                    .map(|p| p.category() == PageCategory::ExhibitCover)
                    .unwrap_or(false);
                if !next_is_cover {
                    log::warn!(
                        "Page {} ends with 'EXHIBIT {}' but the next page is not an exhibit cover",
                        page.number,
                        &caps[1]
                    );
                }
            }
        }
    }

    exhibits
}
