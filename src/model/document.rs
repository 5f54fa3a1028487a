//! Document-level types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Classification, Exhibit, Page, PageCategory, TocForest};
use crate::error::{Error, Result};

/// A filing: its pages plus the structure derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable name (input folder or PDF file name)
    pub name: String,

    /// Pages in reading order
    pub pages: Vec<Page>,

    /// Outline parsed from the table-of-contents pages
    pub toc: Option<TocForest>,

    /// Exhibit runs
    pub exhibits: Vec<Exhibit>,
}

impl Document {
    /// Create a document, validating that page numbers are 1..=n without gaps.
    pub fn new(name: impl Into<String>, mut pages: Vec<Page>) -> Result<Self> {
        let name = name.into();
        pages.sort_by_key(|p| p.number);
        for (idx, page) in pages.iter().enumerate() {
            let expected = idx as u32 + 1;
            if page.number != expected {
                return Err(Error::InvalidInput(format!(
                    "{}: expected page {} but found page {}",
                    name, expected, page.number
                )));
            }
        }

        Ok(Self {
            name,
            pages,
            toc: None,
            exhibits: Vec::new(),
        })
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        if page_num == 0 {
            return None;
        }
        self.pages.get((page_num - 1) as usize)
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether every page has been classified.
    pub fn is_fully_classified(&self) -> bool {
        self.pages.iter().all(Page::is_classified)
    }

    /// Pages of the given category.
    pub fn pages_of(&self, category: PageCategory) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(move |p| p.category() == category)
    }

    /// Caption metadata from the first caption page that carries any.
    pub fn caption(&self) -> Option<&CaptionMetadata> {
        self.pages_of(PageCategory::Caption)
            .filter_map(|p| p.classification.as_ref()?.caption.as_ref())
            .next()
    }

    /// Concatenated TOC payload of all table-of-contents pages, in page order.
    pub fn toc_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .pages_of(PageCategory::TableOfContents)
            .filter_map(|p| p.classification.as_ref()?.toc.as_deref())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Replace a page's classification.
    ///
    /// Derived structure (outline, exhibits) is dropped and must be rebuilt.
    pub fn reclassify(&mut self, page_num: u32, classification: Classification) -> Result<()> {
        let count = self.page_count();
        let page = page_num
            .checked_sub(1)
            .and_then(|idx| self.pages.get_mut(idx as usize))
            .ok_or_else(|| {
                Error::InvalidInput(format!("page {} out of range (1..={})", page_num, count))
            })?;
        page.classification = Some(classification);
        self.toc = None;
        self.exhibits.clear();
        Ok(())
    }

    /// Content fingerprint: SHA-256 over page numbers and texts.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for page in &self.pages {
            hasher.update(page.number.to_le_bytes());
            hasher.update(page.text.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Exhibit containing the given page, if any.
    pub fn exhibit_for_page(&self, page_num: u32) -> Option<&Exhibit> {
        self.exhibits.iter().find(|e| e.contains(page_num))
    }
}

/// Document metadata extracted from the caption page.
///
/// Every field is optional: a malformed or missing caption still yields chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionMetadata {
    /// Document title ("PLAINTIFF'S OPPOSITION TO ...")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,

    /// Party on whose behalf the document was filed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_party: Option<String>,

    /// Filing date as printed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<String>,

    /// Case number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,

    /// Court name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,

    /// Attorneys listed on the caption
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attorneys: Vec<String>,

    /// Named plaintiffs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plaintiffs: Vec<String>,

    /// Named defendants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defendants: Vec<String>,
}

impl CaptionMetadata {
    /// Whether no field was extracted.
    pub fn is_empty(&self) -> bool {
        self.document_title.is_none()
            && self.filing_party.is_none()
            && self.filing_date.is_none()
            && self.case_number.is_none()
            && self.court.is_none()
            && self.attorneys.is_empty()
            && self.plaintiffs.is_empty()
            && self.defendants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, category: PageCategory) -> Page {
        Page::classified(n, category, format!("text of page {}", n))
    }

    #[test]
    fn test_document_requires_contiguous_pages() {
        let doc = Document::new("d", vec![page(2, PageCategory::PleadingBody), page(1, PageCategory::Caption)]).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.get_page(1).unwrap().category(), PageCategory::Caption);
        assert!(doc.get_page(0).is_none());

        let err = Document::new("d", vec![page(1, PageCategory::Caption), page(3, PageCategory::PleadingBody)]);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_caption_and_toc_text() {
        let caption = CaptionMetadata {
            filing_party: Some("Defendant Acme Corp.".into()),
            ..Default::default()
        };
        let pages = vec![
            Page::new(1, "caption").with_classification(
                Classification::new(PageCategory::Caption).with_caption(caption.clone()),
            ),
            Page::new(2, "toc").with_classification(
                Classification::new(PageCategory::TableOfContents).with_toc("# I. INTRODUCTION"),
            ),
            page(3, PageCategory::PleadingBody),
        ];
        let doc = Document::new("d", pages).unwrap();
        assert_eq!(doc.caption(), Some(&caption));
        assert_eq!(doc.toc_text().as_deref(), Some("# I. INTRODUCTION"));
        assert!(doc.is_fully_classified());
    }

    #[test]
    fn test_reclassify_drops_derived_structure() {
        let mut doc = Document::new("d", vec![page(1, PageCategory::PleadingBody)]).unwrap();
        doc.exhibits.push(Exhibit::new("Exhibit A", None, 1, 1));
        doc.reclassify(1, Classification::new(PageCategory::ExhibitCover)).unwrap();
        assert!(doc.exhibits.is_empty());
        assert_eq!(doc.get_page(1).unwrap().category(), PageCategory::ExhibitCover);
        assert!(doc.reclassify(5, Classification::default()).is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = Document::new("a", vec![page(1, PageCategory::PleadingBody)]).unwrap();
        let b = Document::new("b", vec![page(1, PageCategory::Caption)]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = Document::new("c", vec![Page::new(1, "other")]).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
