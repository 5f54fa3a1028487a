//! Per-document and per-batch run reports.

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkMode;
use crate::error::DocumentFailure;
use crate::identity::{DocumentId, IdentityChange};
use crate::sync::SyncReport;

/// Outcome of one processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Issued id
    pub document_id: DocumentId,

    /// Document name
    pub name: String,

    /// Pages in the document
    pub page_count: u32,

    /// Pages classified in this run (zero when classification was resumed)
    pub classified_pages: usize,

    /// Classification was reloaded from a previous run
    pub resumed: bool,

    /// Chunker used
    pub mode: ChunkMode,

    /// Why the structural chunker was not used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,

    /// Matched and total TOC entries, when alignment succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<(usize, usize)>,

    /// Chunks written
    pub chunk_count: usize,

    /// Human edits re-applied to regenerated chunks
    pub reapplied_edits: usize,

    /// Chunk ids whose content changed since the previous run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_changes: Vec<IdentityChange>,

    /// Mirror synchronization, including edits absorbed before chunking
    pub sync: SyncReport,
}

impl DocumentReport {
    /// Whether categories changed during sync and the document must be rerun.
    pub fn needs_rerun(&self) -> bool {
        !self.sync.invalidated_pages.is_empty()
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Documents that completed, in input order
    pub documents: Vec<DocumentReport>,

    /// Documents that failed, in input order
    pub failures: Vec<DocumentFailure>,

    /// Documents table sync, when it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_sync: Option<SyncReport>,
}

impl BatchReport {
    /// Whether every document completed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total chunks written.
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunk_count).sum()
    }
}
