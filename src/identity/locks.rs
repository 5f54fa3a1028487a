//! In-process per-document locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::DocumentId;

/// Hands out one mutex per document.
///
/// Chunk stamping and store writes for a document happen while its lock
/// is held, so two workers never interleave writes to the same store.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex for a document, created on first use.
    pub fn lock_for(&self, id: DocumentId) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        table.entry(id).or_default().clone()
    }

    /// Run `f` while holding the document's lock.
    pub fn with_lock<T>(&self, id: DocumentId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }
}
