//! Per-page classification rows.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Classification, Page, PageCategory};

static PAGE_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\.[A-Za-z]+)?$").expect("valid regex"));

/// One row of a classification table.
///
/// The classifier writes `filename, category, subtype, exhibit_label,
/// exhibit_title, notes`; the remaining columns are optional on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRow {
    /// Page image or text file name (`page_0003.png`)
    pub filename: String,

    /// Page number, derived from the file name when absent
    #[serde(default)]
    pub page_number: Option<u32>,

    /// Category label as written by the classifier
    pub category: String,

    /// Finer label
    #[serde(default)]
    pub subtype: String,

    /// Exhibit label
    #[serde(default)]
    pub exhibit_label: String,

    /// Exhibit title
    #[serde(default)]
    pub exhibit_title: String,

    /// Notes
    #[serde(default)]
    pub notes: String,

    /// Caption side file
    #[serde(default)]
    pub caption_file: String,

    /// TOC side file
    #[serde(default)]
    pub toc_file: String,
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(t.to_string())
    }
}

impl ClassificationRow {
    /// Page number from the column, else from the digits ending the file name.
    pub fn page(&self) -> Option<u32> {
        self.page_number.or_else(|| {
            PAGE_DIGITS
                .captures(self.filename.trim())
                .and_then(|c| c[1].parse().ok())
        })
    }

    /// Parsed category.
    pub fn category(&self) -> PageCategory {
        PageCategory::from_label(&self.category)
    }

    /// Classification carried by this row (no caption or TOC payload).
    pub fn to_classification(&self) -> Classification {
        Classification {
            category: self.category(),
            subtype: non_empty(&self.subtype),
            exhibit_label: non_empty(&self.exhibit_label),
            exhibit_title: non_empty(&self.exhibit_title),
            notes: non_empty(&self.notes),
            caption: None,
            toc: None,
        }
    }

    /// Row describing a classified page.
    pub fn from_page(page: &Page) -> Self {
        let c = page.classification.clone().unwrap_or_default();
        Self {
            filename: page.image_filename(),
            page_number: Some(page.number),
            category: c.category.label().to_string(),
            subtype: c.subtype.unwrap_or_default(),
            exhibit_label: c.exhibit_label.unwrap_or_default(),
            exhibit_title: c.exhibit_title.unwrap_or_default(),
            notes: c.notes.unwrap_or_default(),
            caption_file: if c.caption.is_some() {
                format!("page_{:04}_caption.txt", page.number)
            } else {
                String::new()
            },
            toc_file: if c.toc.is_some() {
                format!("page_{:04}_TOC.txt", page.number)
            } else {
                String::new()
            },
        }
    }
}
