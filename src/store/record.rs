//! Persisted document records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{write_atomic, ClassificationRow};
use crate::chunk::ChunkMode;
use crate::error::Result;
use crate::identity::{DocumentId, IdentityChange};
use crate::model::{CaptionMetadata, Document, PageCategory};
use crate::pipeline::Stage;

/// What the pipeline knows about one document, kept across runs.
///
/// Re-chunking rewrites the chunk store but never removes this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Issued id
    pub id: DocumentId,

    /// Document name
    pub name: String,

    /// Content fingerprint
    pub fingerprint: String,

    /// Caption metadata (canonical after human edits)
    #[serde(default)]
    pub caption: Option<CaptionMetadata>,

    /// Last completed stage
    pub stage: Stage,

    /// Chunker used by the last run
    #[serde(default)]
    pub mode: Option<ChunkMode>,

    /// Why the structural chunker was not used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,

    /// Number of chunks written by the last run
    #[serde(default)]
    pub chunk_count: usize,

    /// One row per page
    #[serde(default)]
    pub classification: Vec<ClassificationRow>,

    /// Chunk ids whose content changed in the last run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_changes: Vec<IdentityChange>,

    /// First processed
    pub created_at: DateTime<Utc>,

    /// Last updated
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Fresh record for a document.
    pub fn new(id: DocumentId, doc: &Document) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: doc.name.clone(),
            fingerprint: doc.fingerprint(),
            caption: doc.caption().cloned(),
            stage: Stage::Load,
            mode: None,
            fallback_reason: None,
            chunk_count: 0,
            classification: doc.pages.iter().map(ClassificationRow::from_page).collect(),
            identity_changes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Category of every page, in page order.
    pub fn page_categories(&self) -> Vec<PageCategory> {
        self.classification.iter().map(|r| r.category()).collect()
    }

    /// Mark a stage as completed.
    pub fn advance(&mut self, stage: Stage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    /// Load a record. A missing file gives `None`.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save the record as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic(path.as_ref(), serde_json::to_string_pretty(self)?.as_bytes())
    }
}
