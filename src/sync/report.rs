//! Sync reports.

use serde::{Deserialize, Serialize};

use crate::identity::DocumentId;

/// A row of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRef {
    /// Table name
    pub table: String,
    /// Row key
    pub key: String,
}

/// A field of a row, with the value that was applied or kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Table name
    pub table: String,
    /// Row key
    pub key: String,
    /// Column
    pub field: String,
    /// Value
    pub value: String,
}

/// Both sides changed a field to different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Table name
    pub table: String,
    /// Row key
    pub key: String,
    /// Column
    pub field: String,
    /// Value at the last sync
    pub base: Option<String>,
    /// Canonical value (kept)
    pub canonical: String,
    /// Human value (kept in the tabular file)
    pub edited: String,
}

/// What a sync run found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Document synced, `None` for the documents table
    pub document_id: Option<DocumentId>,

    /// Edits written to the canonical store
    pub applied_edits: Vec<FieldRef>,

    /// Canonical changes written to the tabular file
    pub refreshed: Vec<FieldRef>,

    /// Divergent edits, canonical untouched
    pub conflicts: Vec<Conflict>,

    /// Edits to read-only columns, overwritten
    pub ignored_edits: Vec<FieldRef>,

    /// Edits that could not be applied
    pub rejected_edits: Vec<FieldRef>,

    /// Rows removed from the tabular file, awaiting confirmation
    pub pending_deletions: Vec<RowRef>,

    /// Rows deleted from the canonical store
    pub deleted: Vec<RowRef>,

    /// Rows of the tabular file unknown to the canonical store
    pub unknown_rows: Vec<RowRef>,

    /// Pages whose category changed; their derived structure must be rebuilt
    pub invalidated_pages: Vec<u32>,

    /// Nothing was written
    pub dry_run: bool,
}

impl SyncReport {
    /// Empty report for a document.
    pub fn new(document_id: Option<DocumentId>) -> Self {
        Self {
            document_id,
            ..Default::default()
        }
    }

    /// Append another report's findings.
    pub fn merge(&mut self, other: SyncReport) {
        self.applied_edits.extend(other.applied_edits);
        self.refreshed.extend(other.refreshed);
        self.conflicts.extend(other.conflicts);
        self.ignored_edits.extend(other.ignored_edits);
        self.rejected_edits.extend(other.rejected_edits);
        self.pending_deletions.extend(other.pending_deletions);
        self.deleted.extend(other.deleted);
        self.unknown_rows.extend(other.unknown_rows);
        self.invalidated_pages.extend(other.invalidated_pages);
        self.dry_run |= other.dry_run;
    }

    /// Whether a human needs to look at something.
    pub fn needs_attention(&self) -> bool {
        !self.conflicts.is_empty()
            || !self.rejected_edits.is_empty()
            || !self.pending_deletions.is_empty()
            || !self.unknown_rows.is_empty()
    }

    /// Whether the run changed nothing on either side.
    pub fn is_noop(&self) -> bool {
        self.applied_edits.is_empty()
            && self.refreshed.is_empty()
            && self.ignored_edits.is_empty()
            && self.deleted.is_empty()
    }
}
