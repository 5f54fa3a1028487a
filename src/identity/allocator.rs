//! Chunk id allocation and change detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{ChunkId, DocumentId};
use crate::model::{CaptionMetadata, Chunk, DraftChunk};

/// An id whose content differs from the previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum IdentityChange {
    /// The id now names different text
    Reassigned {
        /// Chunk id
        chunk_id: ChunkId,
        /// Hash in the previous run
        previous_hash: String,
        /// Hash in this run
        current_hash: String,
    },
    /// The id no longer exists
    Retired {
        /// Chunk id
        chunk_id: ChunkId,
        /// Hash in the previous run
        previous_hash: String,
    },
    /// The id is new in this run
    Added {
        /// Chunk id
        chunk_id: ChunkId,
        /// Hash in this run
        current_hash: String,
    },
}

impl IdentityChange {
    /// Chunk id concerned.
    pub fn chunk_id(&self) -> ChunkId {
        match self {
            IdentityChange::Reassigned { chunk_id, .. }
            | IdentityChange::Retired { chunk_id, .. }
            | IdentityChange::Added { chunk_id, .. } => *chunk_id,
        }
    }
}

impl fmt::Display for IdentityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityChange::Reassigned { chunk_id, .. } => {
                write!(f, "chunk {} now holds different text", chunk_id)
            }
            IdentityChange::Retired { chunk_id, .. } => write!(f, "chunk {} retired", chunk_id),
            IdentityChange::Added { chunk_id, .. } => write!(f, "chunk {} added", chunk_id),
        }
    }
}

/// Numbers a document's chunks 1..=n in reading order.
#[derive(Debug, Clone, Copy)]
pub struct ChunkIdAllocator {
    document_id: DocumentId,
}

impl ChunkIdAllocator {
    /// Create an allocator for one document.
    pub fn new(document_id: DocumentId) -> Self {
        Self { document_id }
    }

    /// Owning document.
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Turn drafts into chunk records, copying caption fields onto each.
    pub fn allocate(&self, drafts: Vec<DraftChunk>, caption: Option<&CaptionMetadata>) -> Vec<Chunk> {
        drafts
            .into_iter()
            .enumerate()
            .map(|(idx, draft)| Chunk::from_draft(self.document_id, ChunkId(idx as u32 + 1), draft, caption))
            .collect()
    }

    /// Compare this run's chunks with the previous run's, by id.
    ///
    /// Nothing is reported when there is no previous run. Every change is
    /// logged at warn level.
    pub fn stamp(&self, current: &[Chunk], previous: &[Chunk]) -> Vec<IdentityChange> {
        if previous.is_empty() {
            return Vec::new();
        }
        let before: BTreeMap<ChunkId, &str> = previous
            .iter()
            .map(|c| (c.chunk_id, c.text_hash.as_str()))
            .collect();
        let after: BTreeMap<ChunkId, &str> = current
            .iter()
            .map(|c| (c.chunk_id, c.text_hash.as_str()))
            .collect();

        let mut changes = Vec::new();
        for (id, hash) in &after {
            match before.get(id) {
                Some(prev) if prev == hash => {}
                Some(prev) => changes.push(IdentityChange::Reassigned {
                    chunk_id: *id,
                    previous_hash: prev.to_string(),
                    current_hash: hash.to_string(),
                }),
                None => changes.push(IdentityChange::Added {
                    chunk_id: *id,
                    current_hash: hash.to_string(),
                }),
            }
        }
        for (id, hash) in &before {
            if !after.contains_key(id) {
                changes.push(IdentityChange::Retired {
                    chunk_id: *id,
                    previous_hash: hash.to_string(),
                });
            }
        }

        for change in &changes {
            log::warn!("Document {}: {}", self.document_id, change);
        }
        changes
    }
}
