//! JSON-lines chunk store.

use std::fs;
use std::path::Path;

use super::write_atomic;
use crate::error::{Error, Result};
use crate::model::Chunk;

/// Read a chunk store. A missing file is an empty store.
pub fn read_chunks(path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let mut chunks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line).map_err(|e| {
            Error::InvalidInput(format!("{} line {}: {}", path.display(), idx + 1, e))
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Write a chunk store, one record per line.
pub fn write_chunks(path: impl AsRef<Path>, chunks: &[Chunk]) -> Result<()> {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&serde_json::to_string(chunk)?);
        out.push('\n');
    }
    write_atomic(path.as_ref(), out.as_bytes())?;
    log::debug!("Wrote {} chunks to {}", chunks.len(), path.as_ref().display());
    Ok(())
}
