//! Stable identifiers for documents and chunks.
//!
//! Document ids are issued once per normalized document name and survive
//! renames through the content fingerprint. Chunk ids are positions within
//! a document; re-running on unchanged input yields the same ids, and any
//! id whose content changed between runs is reported.

mod allocator;
mod locks;
mod registry;

pub use allocator::{ChunkIdAllocator, IdentityChange};
pub use locks::KeyedLocks;
pub use registry::{normalize_name, IdRegistry, RegistryEntry, MAPPING_FILE, REGISTRY_CSV};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Identifier of a document, displayed as four digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DocumentId)
            .map_err(|_| Error::InvalidInput(format!("not a document id: '{}'", s)))
    }
}

/// Identifier of a chunk within its document, displayed as three digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl FromStr for ChunkId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ChunkId)
            .map_err(|_| Error::InvalidInput(format!("not a chunk id: '{}'", s)))
    }
}
