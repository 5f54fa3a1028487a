//! On-disk layout of processed documents.
//!
//! ```text
//! <out>/
//!   document_id_mapping.json
//!   document_registry.csv
//!   documents.csv
//!   sync_state.json
//!   .locks/
//!   0007/
//!     chunks.jsonl        canonical chunk store
//!     chunks.csv          human-editable mirror
//!     document.json       canonical document record
//!     classification.csv  human-editable classification table
//!     sync_state.json     field values at the last sync
//! ```

mod classification;
mod jsonl;
mod record;
mod table;

pub use classification::ClassificationRow;
pub use jsonl::{read_chunks, write_chunks};
pub use record::DocumentRecord;
pub use table::{read_rows, write_rows, Row, TableFile};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::identity::{DocumentId, MAPPING_FILE, REGISTRY_CSV};

/// Canonical chunk store of a document.
pub const CHUNKS_JSONL: &str = "chunks.jsonl";
/// Chunk mirror of a document.
pub const CHUNKS_CSV: &str = "chunks.csv";
/// Document record.
pub const DOCUMENT_JSON: &str = "document.json";
/// Classification table of a document.
pub const CLASSIFICATION_CSV: &str = "classification.csv";
/// Sync snapshot.
pub const SYNC_STATE: &str = "sync_state.json";
/// Documents table at the output root.
pub const DOCUMENTS_CSV: &str = "documents.csv";
/// Lock directory at the output root.
pub const LOCKS_DIR: &str = ".locks";

/// Paths of an output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Directory of one document (`<out>/0007`).
    pub fn document_dir(&self, id: DocumentId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create a document's directory.
    pub fn ensure_document(&self, id: DocumentId) -> Result<PathBuf> {
        let dir = self.document_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `chunks.jsonl` of a document.
    pub fn chunks_jsonl(&self, id: DocumentId) -> PathBuf {
        self.document_dir(id).join(CHUNKS_JSONL)
    }

    /// `chunks.csv` of a document.
    pub fn chunks_csv(&self, id: DocumentId) -> PathBuf {
        self.document_dir(id).join(CHUNKS_CSV)
    }

    /// `document.json` of a document.
    pub fn document_json(&self, id: DocumentId) -> PathBuf {
        self.document_dir(id).join(DOCUMENT_JSON)
    }

    /// `classification.csv` of a document.
    pub fn classification_csv(&self, id: DocumentId) -> PathBuf {
        self.document_dir(id).join(CLASSIFICATION_CSV)
    }

    /// `sync_state.json` of a document.
    pub fn sync_state(&self, id: DocumentId) -> PathBuf {
        self.document_dir(id).join(SYNC_STATE)
    }

    /// Root-level sync snapshot (documents table).
    pub fn root_sync_state(&self) -> PathBuf {
        self.root.join(SYNC_STATE)
    }

    /// `documents.csv` at the root.
    pub fn documents_csv(&self) -> PathBuf {
        self.root.join(DOCUMENTS_CSV)
    }

    /// Id registry file.
    pub fn mapping(&self) -> PathBuf {
        self.root.join(MAPPING_FILE)
    }

    /// Registry CSV export.
    pub fn registry_csv(&self) -> PathBuf {
        self.root.join(REGISTRY_CSV)
    }

    /// Lock directory.
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// Ids of all documents with a directory under the root, ascending.
    pub fn document_ids(&self) -> Result<Vec<DocumentId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(id) = name.parse::<DocumentId>() {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load all document records, ascending by id.
    pub fn load_records(&self) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        for id in self.document_ids()? {
            if let Some(record) = DocumentRecord::load(self.document_json(id))? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Write a file through a temporary sibling and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
