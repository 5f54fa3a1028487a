//! Field values recorded at the last sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::Tabular;
use crate::error::Result;
use crate::store::Row;

/// Human edits pinned to a row's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// Content fingerprint of the row when the edit was applied
    pub fingerprint: String,
    /// Edited fields
    pub fields: Row,
}

/// Base values of every synced table, persisted as `sync_state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// When the snapshot was last written
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,

    /// Table name -> row key -> editable field values
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, Row>>,

    /// Table name -> row key -> edits to re-apply after regeneration
    #[serde(default)]
    pub overrides: BTreeMap<String, BTreeMap<String, Override>>,
}

impl SyncSnapshot {
    /// Load a snapshot. A missing file gives an empty snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot, stamping `synced_at`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.synced_at = Some(Utc::now());
        crate::store::write_atomic(path.as_ref(), serde_json::to_string_pretty(self)?.as_bytes())
    }

    /// Base value of a field.
    pub fn base(&self, table: &str, key: &str, field: &str) -> Option<&str> {
        self.tables
            .get(table)?
            .get(key)?
            .get(field)
            .map(String::as_str)
    }

    /// Whether a row was ever synced.
    pub fn has_row(&self, table: &str, key: &str) -> bool {
        self.tables.get(table).map(|t| t.contains_key(key)).unwrap_or(false)
    }

    /// Set the base value of a field.
    pub fn set_base(&mut self, table: &str, key: &str, field: &str, value: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.trim().to_string());
    }

    /// Forget a row.
    pub fn remove_row(&mut self, table: &str, key: &str) {
        if let Some(t) = self.tables.get_mut(table) {
            t.remove(key);
        }
        if let Some(t) = self.overrides.get_mut(table) {
            t.remove(key);
        }
    }

    /// Remember an applied edit so it survives regeneration of unchanged content.
    pub fn record_override(&mut self, table: &str, key: &str, fingerprint: &str, field: &str, value: &str) {
        let entry = self
            .overrides
            .entry(table.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();
        if entry.fingerprint != fingerprint {
            entry.fields.clear();
            entry.fingerprint = fingerprint.to_string();
        }
        entry.fields.insert(field.to_string(), value.to_string());
    }

    /// Re-apply recorded edits to regenerated rows whose content is unchanged.
    ///
    /// Overrides whose row content changed are dropped. Returns the number
    /// of fields applied.
    pub fn apply_overrides<T: Tabular>(&mut self, table: &str, rows: &mut [T]) -> usize {
        let overrides = match self.overrides.get_mut(table) {
            Some(o) => o,
            None => return 0,
        };
        let mut applied = 0;
        let mut stale = Vec::new();
        for row in rows.iter_mut() {
            let key = row.key();
            let Some(ov) = overrides.get(&key) else {
                continue;
            };
            if row.fingerprint().as_deref() != Some(ov.fingerprint.as_str()) {
                stale.push(key);
                continue;
            }
            for (field, value) in &ov.fields {
                match row.apply(field, value) {
                    Ok(()) => applied += 1,
                    Err(e) => log::warn!("Dropping override {} {}: {}", key, field, e),
                }
            }
        }
        for key in stale {
            log::info!("Row {} changed; its edits no longer apply", key);
            overrides.remove(&key);
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_base_values() {
        let mut snap = SyncSnapshot::default();
        assert!(!snap.has_row("chunks", "0001:001"));
        snap.set_base("chunks", "0001:001", "exhibit_label", " Exhibit A ");
        assert_eq!(snap.base("chunks", "0001:001", "exhibit_label"), Some("Exhibit A"));
        snap.remove_row("chunks", "0001:001");
        assert_eq!(snap.base("chunks", "0001:001", "exhibit_label"), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync_state.json");
        let mut snap = SyncSnapshot::default();
        snap.set_base("documents", "0001", "document_title", "MOTION");
        snap.record_override("chunks", "0001:001", "abc", "section_path", "I. INTRO");
        snap.save(&path).unwrap();

        let loaded = SyncSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);
        assert!(loaded.synced_at.is_some());
    }
}
