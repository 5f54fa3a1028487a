//! Canonical records seen as flat table rows.

use crate::error::{Error, Result};
use crate::identity::{ChunkId, DocumentId};
use crate::model::{chunk_key, CaptionMetadata, Chunk, PageCategory, SectionPath};
use crate::store::{ClassificationRow, DocumentRecord, Row};

/// Table name of chunk rows.
pub const CHUNK_TABLE: &str = "chunks";
/// Table name of document rows.
pub const DOCUMENT_TABLE: &str = "documents";
/// Table name of classification rows.
pub const CLASSIFICATION_TABLE: &str = "classification";

/// A canonical record with a flat, human-editable form.
pub trait Tabular {
    /// Columns of the tabular file, in order.
    const COLUMNS: &'static [&'static str];

    /// Columns that identify the row.
    const KEY_COLUMNS: &'static [&'static str];

    /// Columns a human may edit.
    const EDITABLE: &'static [&'static str];

    /// Row key.
    fn key(&self) -> String;

    /// Row key of a tabular row, `None` when the key columns are unusable.
    fn key_of(row: &Row) -> Option<String>;

    /// Flat form of every column.
    fn to_row(&self) -> Row;

    /// Set an editable field from its flat form.
    fn apply(&mut self, field: &str, value: &str) -> Result<()>;

    /// Content fingerprint, for edits pinned to content.
    fn fingerprint(&self) -> Option<String> {
        None
    }

    /// Columns neither editable nor part of the key.
    fn read_only() -> Vec<&'static str> {
        Self::COLUMNS
            .iter()
            .copied()
            .filter(|c| !Self::EDITABLE.contains(c) && !Self::KEY_COLUMNS.contains(c))
            .collect()
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> Error {
    Error::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Parse a category given as snake_case name or classifier label.
fn parse_category(field: &str, value: &str) -> Result<PageCategory> {
    let t = value.trim();
    if let Some(c) = PageCategory::ALL.iter().find(|c| c.as_str() == t) {
        return Ok(*c);
    }
    match PageCategory::from_label(t) {
        PageCategory::Unknown if !t.eq_ignore_ascii_case("unknown") => {
            Err(invalid(field, format!("unknown page category '{}'", t)))
        }
        c => Ok(c),
    }
}

/// Flat form of page numbers (`3,4,5`).
pub fn format_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Tabular for Chunk {
    const COLUMNS: &'static [&'static str] = &[
        "document_id",
        "chunk_id",
        "page_numbers",
        "section_path",
        "exhibit_label",
        "exhibit_title",
        "page_type",
        "document_title",
        "filing_party",
        "filing_date",
        "text",
        "token_count",
        "text_hash",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["document_id", "chunk_id"];
    const EDITABLE: &'static [&'static str] =
        &["section_path", "exhibit_label", "exhibit_title", "page_type"];

    fn key(&self) -> String {
        Chunk::key(self)
    }

    fn key_of(row: &Row) -> Option<String> {
        let doc: DocumentId = row.get("document_id")?.parse().ok()?;
        let chunk: ChunkId = row.get("chunk_id")?.parse().ok()?;
        Some(chunk_key(doc, chunk))
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("document_id".into(), self.document_id.to_string());
        row.insert("chunk_id".into(), self.chunk_id.to_string());
        row.insert("page_numbers".into(), format_pages(&self.page_numbers));
        row.insert(
            "section_path".into(),
            self.section_path.as_ref().map(|p| p.to_string()).unwrap_or_default(),
        );
        row.insert("exhibit_label".into(), opt(&self.exhibit_label));
        row.insert("exhibit_title".into(), opt(&self.exhibit_title));
        row.insert("page_type".into(), self.page_type.as_str().to_string());
        row.insert("document_title".into(), opt(&self.document_title));
        row.insert("filing_party".into(), opt(&self.filing_party));
        row.insert("filing_date".into(), opt(&self.filing_date));
        row.insert("text".into(), self.text.clone());
        row.insert("token_count".into(), self.token_count.to_string());
        row.insert("text_hash".into(), self.text_hash.clone());
        row
    }

    fn apply(&mut self, field: &str, value: &str) -> Result<()> {
        match field {
            "section_path" => self.section_path = SectionPath::parse(value),
            "exhibit_label" => self.exhibit_label = non_empty(value),
            "exhibit_title" => self.exhibit_title = non_empty(value),
            "page_type" => self.page_type = parse_category(field, value)?,
            _ => return Err(invalid(field, "not editable")),
        }
        Ok(())
    }

    fn fingerprint(&self) -> Option<String> {
        Some(self.text_hash.clone())
    }
}

impl Tabular for DocumentRecord {
    const COLUMNS: &'static [&'static str] = &[
        "document_id",
        "name",
        "document_title",
        "filing_party",
        "filing_date",
        "case_number",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["document_id"];
    const EDITABLE: &'static [&'static str] =
        &["document_title", "filing_party", "filing_date", "case_number"];

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn key_of(row: &Row) -> Option<String> {
        row.get("document_id")?
            .parse::<DocumentId>()
            .ok()
            .map(|id| id.to_string())
    }

    fn to_row(&self) -> Row {
        let caption = self.caption.clone().unwrap_or_default();
        let mut row = Row::new();
        row.insert("document_id".into(), self.id.to_string());
        row.insert("name".into(), self.name.clone());
        row.insert("document_title".into(), opt(&caption.document_title));
        row.insert("filing_party".into(), opt(&caption.filing_party));
        row.insert("filing_date".into(), opt(&caption.filing_date));
        row.insert("case_number".into(), opt(&caption.case_number));
        row
    }

    fn apply(&mut self, field: &str, value: &str) -> Result<()> {
        let caption = self.caption.get_or_insert_with(CaptionMetadata::default);
        match field {
            "document_title" => caption.document_title = non_empty(value),
            "filing_party" => caption.filing_party = non_empty(value),
            "filing_date" => caption.filing_date = non_empty(value),
            "case_number" => caption.case_number = non_empty(value),
            _ => return Err(invalid(field, "not editable")),
        }
        if caption.is_empty() {
            self.caption = None;
        }
        Ok(())
    }
}

impl Tabular for ClassificationRow {
    const COLUMNS: &'static [&'static str] = &[
        "filename",
        "page_number",
        "category",
        "subtype",
        "exhibit_label",
        "exhibit_title",
        "notes",
        "caption_file",
        "toc_file",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["filename"];
    const EDITABLE: &'static [&'static str] =
        &["category", "subtype", "exhibit_label", "exhibit_title", "notes"];

    fn key(&self) -> String {
        self.filename.trim().to_string()
    }

    fn key_of(row: &Row) -> Option<String> {
        non_empty(row.get("filename")?)
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("filename".into(), self.filename.clone());
        row.insert(
            "page_number".into(),
            self.page().map(|p| p.to_string()).unwrap_or_default(),
        );
        row.insert("category".into(), self.category.clone());
        row.insert("subtype".into(), self.subtype.clone());
        row.insert("exhibit_label".into(), self.exhibit_label.clone());
        row.insert("exhibit_title".into(), self.exhibit_title.clone());
        row.insert("notes".into(), self.notes.clone());
        row.insert("caption_file".into(), self.caption_file.clone());
        row.insert("toc_file".into(), self.toc_file.clone());
        row
    }

    fn apply(&mut self, field: &str, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match field {
            "category" => self.category = parse_category(field, &value)?.label().to_string(),
            "subtype" => self.subtype = value,
            "exhibit_label" => self.exhibit_label = value,
            "exhibit_title" => self.exhibit_title = value,
            "notes" => self.notes = value,
            _ => return Err(invalid(field, "not editable")),
        }
        Ok(())
    }
}
