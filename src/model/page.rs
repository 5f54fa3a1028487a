//! Page-level types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::CaptionMetadata;

/// Page type assigned by the classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCategory {
    /// First page of a pleading, carrying case/party/attorney metadata
    Caption,
    /// Table of contents
    TableOfContents,
    /// Table of authorities
    TableOfAuthorities,
    /// Argument text
    PleadingBody,
    /// Cover sheet introducing an exhibit
    ExhibitCover,
    /// Content of an exhibit
    ExhibitContent,
    /// Court form (SUM-100, POS-010, ...)
    CourtForm,
    /// Proof of service
    ProofOfService,
    /// Classification failed or was not recognized
    #[default]
    Unknown,
}

impl PageCategory {
    /// All categories, in canonical order.
    pub const ALL: [PageCategory; 9] = [
        PageCategory::Caption,
        PageCategory::TableOfContents,
        PageCategory::TableOfAuthorities,
        PageCategory::PleadingBody,
        PageCategory::ExhibitCover,
        PageCategory::ExhibitContent,
        PageCategory::CourtForm,
        PageCategory::ProofOfService,
        PageCategory::Unknown,
    ];

    /// Parse a category label.
    ///
    /// Accepts the snake_case names used in chunk records as well as the
    /// human labels written by the classifier ("Pleading first page",
    /// "Exhibit cover page", "Proof of service page", "Form", ...).
    /// Anything unrecognized maps to [`PageCategory::Unknown`].
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_lowercase().replace(['_', '-'], " ");
        if lower.is_empty() {
            return PageCategory::Unknown;
        }

        if lower.contains("table of contents") || lower == "toc" {
            PageCategory::TableOfContents
        } else if lower.contains("table of authorities") || lower == "toa" {
            PageCategory::TableOfAuthorities
        } else if lower.contains("proof of service") {
            PageCategory::ProofOfService
        } else if lower.contains("exhibit") {
            if lower.contains("cover") {
                PageCategory::ExhibitCover
            } else {
                PageCategory::ExhibitContent
            }
        } else if lower.contains("caption") || lower.contains("first page") {
            PageCategory::Caption
        } else if lower.contains("pleading") || lower == "body" {
            PageCategory::PleadingBody
        } else if lower.contains("form") {
            PageCategory::CourtForm
        } else {
            PageCategory::Unknown
        }
    }

    /// Canonical human label, as written to classification CSVs.
    pub fn label(&self) -> &'static str {
        match self {
            PageCategory::Caption => "Pleading first page",
            PageCategory::TableOfContents => "Pleading table of contents",
            PageCategory::TableOfAuthorities => "Pleading table of authorities",
            PageCategory::PleadingBody => "Pleading body",
            PageCategory::ExhibitCover => "Exhibit cover page",
            PageCategory::ExhibitContent => "Exhibit content",
            PageCategory::CourtForm => "Form",
            PageCategory::ProofOfService => "Proof of service page",
            PageCategory::Unknown => "Unknown",
        }
    }

    /// snake_case name, as written to chunk records.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageCategory::Caption => "caption",
            PageCategory::TableOfContents => "table_of_contents",
            PageCategory::TableOfAuthorities => "table_of_authorities",
            PageCategory::PleadingBody => "pleading_body",
            PageCategory::ExhibitCover => "exhibit_cover",
            PageCategory::ExhibitContent => "exhibit_content",
            PageCategory::CourtForm => "court_form",
            PageCategory::ProofOfService => "proof_of_service",
            PageCategory::Unknown => "unknown",
        }
    }

    /// Whether pages of this category can hold argument headings.
    pub fn carries_headings(&self) -> bool {
        matches!(self, PageCategory::PleadingBody | PageCategory::Caption)
    }

    /// Whether pages of this category are outline/index material rather than content.
    pub fn is_front_matter(&self) -> bool {
        matches!(
            self,
            PageCategory::TableOfContents | PageCategory::TableOfAuthorities
        )
    }

    /// Whether this category starts or continues an exhibit.
    pub fn is_exhibit(&self) -> bool {
        matches!(self, PageCategory::ExhibitCover | PageCategory::ExhibitContent)
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A footnote delivered by the classification step for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footnote {
    /// Footnote marker as printed ("1", "12", "*")
    #[serde(rename = "footnote_number", alias = "number")]
    pub number: String,

    /// Phrase immediately preceding the in-body reference marker
    #[serde(
        rename = "context_phrase",
        alias = "context",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<String>,

    /// Footnote body
    #[serde(rename = "footnote_text", alias = "text")]
    pub text: String,
}

impl Footnote {
    /// Create a footnote without a context phrase.
    pub fn new(number: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            context: None,
            text: text.into(),
        }
    }

    /// Set the context phrase used to find the in-body reference.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Result of classifying one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Page type
    pub category: PageCategory,

    /// Finer label (form number, etc.)
    pub subtype: Option<String>,

    /// Exhibit label when the page belongs to an exhibit
    pub exhibit_label: Option<String>,

    /// Exhibit title when known
    pub exhibit_title: Option<String>,

    /// Free-form notes (classification failures, human remarks)
    pub notes: Option<String>,

    /// Caption fields, only for caption pages
    pub caption: Option<CaptionMetadata>,

    /// Raw TOC text extracted from a table-of-contents page
    pub toc: Option<String>,
}

impl Classification {
    /// Create a classification with just a category.
    pub fn new(category: PageCategory) -> Self {
        Self {
            category,
            ..Default::default()
        }
    }

    /// Set the exhibit label.
    pub fn with_exhibit(mut self, label: impl Into<String>, title: Option<String>) -> Self {
        self.exhibit_label = Some(label.into());
        self.exhibit_title = title;
        self
    }

    /// Set the caption metadata.
    pub fn with_caption(mut self, caption: CaptionMetadata) -> Self {
        self.caption = Some(caption);
        self
    }

    /// Set the TOC payload.
    pub fn with_toc(mut self, toc: impl Into<String>) -> Self {
        self.toc = Some(toc.into());
        self
    }

    /// Set the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A single page of a filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Raw OCR text with line-number artifacts stripped
    pub text: String,

    /// Footnotes extracted for this page
    #[serde(default)]
    pub footnotes: Vec<Footnote>,

    /// Classification, `None` until the page was classified
    #[serde(default)]
    pub classification: Option<Classification>,
}

impl Page {
    /// Create an unclassified page.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            footnotes: Vec::new(),
            classification: None,
        }
    }

    /// Create a page with a known category.
    pub fn classified(number: u32, category: PageCategory, text: impl Into<String>) -> Self {
        Self::new(number, text).with_classification(Classification::new(category))
    }

    /// Attach a classification.
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Attach footnotes.
    pub fn with_footnotes(mut self, footnotes: Vec<Footnote>) -> Self {
        self.footnotes = footnotes;
        self
    }

    /// Page category, [`PageCategory::Unknown`] when unclassified.
    pub fn category(&self) -> PageCategory {
        self.classification
            .as_ref()
            .map(|c| c.category)
            .unwrap_or_default()
    }

    /// Whether the classification stage already ran for this page.
    pub fn is_classified(&self) -> bool {
        self.classification.is_some()
    }

    /// Exhibit label from the classification, if any.
    pub fn exhibit_label(&self) -> Option<&str> {
        self.classification
            .as_ref()
            .and_then(|c| c.exhibit_label.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Conventional text file name for this page (`page_0003.txt`).
    pub fn text_filename(&self) -> String {
        format!("page_{:04}.txt", self.number)
    }

    /// Conventional image file name for this page (`page_0003.png`).
    pub fn image_filename(&self) -> String {
        format!("page_{:04}.png", self.number)
    }

    /// Check if the page has no text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
