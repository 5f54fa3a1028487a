//! Chunk records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CaptionMetadata, PageCategory, SectionPath};
use crate::identity::{ChunkId, DocumentId};

/// A chunk as produced by a chunker, before identifiers are stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftChunk {
    /// Pages that contributed text, ascending and without gaps
    pub page_numbers: Vec<u32>,

    /// Governing section, `None` without a usable outline
    pub section_path: Option<SectionPath>,

    /// Exhibit label when the chunk lies inside an exhibit
    pub exhibit_label: Option<String>,

    /// Exhibit title
    pub exhibit_title: Option<String>,

    /// Category of the page contributing the most text
    pub page_type: PageCategory,

    /// Tagged chunk text
    pub text: String,

    /// Token count of `text`
    pub token_count: usize,
}

/// One record of the chunk store.
///
/// Field order is the serialization order of the JSONL store and the CSV mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document
    pub document_id: DocumentId,

    /// Position within the document (1-based)
    pub chunk_id: ChunkId,

    /// Pages that contributed text
    pub page_numbers: Vec<u32>,

    /// Governing section
    pub section_path: Option<SectionPath>,

    /// Exhibit label
    pub exhibit_label: Option<String>,

    /// Exhibit title
    pub exhibit_title: Option<String>,

    /// Category of the dominant source page
    pub page_type: PageCategory,

    /// Document title from the caption
    pub document_title: Option<String>,

    /// Filing party from the caption
    pub filing_party: Option<String>,

    /// Filing date from the caption
    pub filing_date: Option<String>,

    /// Tagged chunk text
    pub text: String,

    /// Token count of `text`
    pub token_count: usize,

    /// Hex SHA-256 of `text`
    pub text_hash: String,
}

impl Chunk {
    /// Stamp a draft with identifiers and document metadata.
    pub fn from_draft(
        document_id: DocumentId,
        chunk_id: ChunkId,
        draft: DraftChunk,
        caption: Option<&CaptionMetadata>,
    ) -> Self {
        let text_hash = text_hash(&draft.text);
        Self {
            document_id,
            chunk_id,
            page_numbers: draft.page_numbers,
            section_path: draft.section_path,
            exhibit_label: draft.exhibit_label,
            exhibit_title: draft.exhibit_title,
            page_type: draft.page_type,
            document_title: caption.and_then(|c| c.document_title.clone()),
            filing_party: caption.and_then(|c| c.filing_party.clone()),
            filing_date: caption.and_then(|c| c.filing_date.clone()),
            text: draft.text,
            token_count: draft.token_count,
            text_hash,
        }
    }

    /// Store key (`0007:012`).
    pub fn key(&self) -> String {
        chunk_key(self.document_id, self.chunk_id)
    }

    /// First contributing page.
    pub fn first_page(&self) -> Option<u32> {
        self.page_numbers.first().copied()
    }

    /// Chunk text with inline tags removed.
    pub fn plain_text(&self) -> String {
        crate::text::strip_tags(&self.text)
    }

    /// Whether `text_hash` matches `text`.
    pub fn hash_is_current(&self) -> bool {
        self.text_hash == text_hash(&self.text)
    }
}

/// Store key for a chunk.
pub fn chunk_key(document_id: DocumentId, chunk_id: ChunkId) -> String {
    format!("{}:{}", document_id, chunk_id)
}

/// Hex SHA-256 of a chunk text.
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str) -> DraftChunk {
        DraftChunk {
            page_numbers: vec![3, 4],
            section_path: Some(SectionPath::single("I. INTRODUCTION")),
            exhibit_label: None,
            exhibit_title: None,
            page_type: PageCategory::PleadingBody,
            text: text.to_string(),
            token_count: 3,
        }
    }

    #[test]
    fn test_from_draft_copies_caption_fields() {
        let caption = CaptionMetadata {
            document_title: Some("MOTION TO DISMISS".into()),
            filing_party: Some("Defendant".into()),
            ..Default::default()
        };
        let chunk = Chunk::from_draft(DocumentId(7), ChunkId(12), draft("Some text."), Some(&caption));
        assert_eq!(chunk.key(), "0007:012");
        assert_eq!(chunk.document_title.as_deref(), Some("MOTION TO DISMISS"));
        assert_eq!(chunk.filing_date, None);
        assert_eq!(chunk.first_page(), Some(3));
        assert!(chunk.hash_is_current());
    }

    #[test]
    fn test_text_hash_is_sha256_hex() {
        assert_eq!(
            text_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_plain_text_strips_tags() {
        let chunk = Chunk::from_draft(
            DocumentId(1),
            ChunkId(1),
            draft("The rule applies. [FN(1)] See Code. [FN(1)_end] Next."),
            None,
        );
        assert_eq!(chunk.plain_text(), "The rule applies. See Code. Next.");
    }

    #[test]
    fn test_json_field_order() {
        let chunk = Chunk::from_draft(DocumentId(1), ChunkId(1), draft("x"), None);
        let json = serde_json::to_string(&chunk).unwrap();
        let doc_pos = json.find("\"document_id\"").unwrap();
        let text_pos = json.find("\"text\"").unwrap();
        let hash_pos = json.find("\"text_hash\"").unwrap();
        assert!(doc_pos < text_pos && text_pos < hash_pos);
        assert!(json.contains("\"section_path\":[\"I. INTRODUCTION\"]"));
        assert!(json.contains("\"page_type\":\"pleading_body\""));
    }
}
