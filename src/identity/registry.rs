//! Persistent document id registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use super::DocumentId;
use crate::error::Result;

/// File name of the persisted registry.
pub const MAPPING_FILE: &str = "document_id_mapping.json";

/// File name of the registry CSV export.
pub const REGISTRY_CSV: &str = "document_registry.csv";

/// Normalize a document name for lookup.
///
/// NFKC, a trailing `.pdf` removed, whitespace trimmed and collapsed,
/// lower-cased.
pub fn normalize_name(name: &str) -> String {
    let nfkc: String = name.nfkc().collect();
    let trimmed = nfkc.trim();
    let cut = trimmed.len().saturating_sub(4);
    let stem = match trimmed.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &trimmed[..cut],
        _ => trimmed,
    };
    stem.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One registered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Issued id
    pub id: DocumentId,

    /// Name as first seen
    pub name: String,

    /// Content fingerprint, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// When the id was issued
    pub registered_at: DateTime<Utc>,
}

/// Row of the registry CSV export.
#[derive(Debug, Serialize)]
struct RegistryRow<'a> {
    id: u32,
    name: &'a str,
    formatted_id: String,
    status: &'a str,
}

/// Maps normalized document names to ids.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    path: Option<PathBuf>,
    entries: BTreeMap<String, RegistryEntry>,
}

impl IdRegistry {
    /// Create an empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry file. A missing file gives an empty registry bound to `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        log::debug!("Loaded {} registry entries from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Load the registry kept in an output root.
    pub fn open_in(root: impl AsRef<Path>) -> Result<Self> {
        Self::load(root.as_ref().join(MAPPING_FILE))
    }

    /// Write the registry back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Write the registry to `path` (via a temporary file and rename).
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entries, by normalized name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Id registered for a name.
    pub fn lookup(&self, name: &str) -> Option<DocumentId> {
        self.entries.get(&normalize_name(name)).map(|e| e.id)
    }

    /// Name first registered for an id.
    pub fn name_of(&self, id: DocumentId) -> Option<&str> {
        self.entries
            .values()
            .filter(|e| e.id == id)
            .min_by_key(|e| e.registered_at)
            .map(|e| e.name.as_str())
    }

    fn next_id(&self) -> DocumentId {
        DocumentId(self.entries.values().map(|e| e.id.0).max().unwrap_or(0) + 1)
    }

    /// Id for a document, issuing one when needed.
    ///
    /// Lookup order: exact normalized name, then same fingerprint (a renamed
    /// file keeps its id), then a new id one above the current maximum.
    pub fn register(&mut self, name: &str, fingerprint: Option<&str>) -> DocumentId {
        let key = normalize_name(name);

        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.fingerprint.is_none() {
                entry.fingerprint = fingerprint.map(str::to_string);
            }
            return entry.id;
        }

        let renamed = fingerprint.and_then(|fp| {
            self.entries
                .values()
                .find(|e| e.fingerprint.as_deref() == Some(fp))
                .map(|e| (e.id, e.name.clone()))
        });
        let id = match renamed {
            Some((id, old)) => {
                log::info!("'{}' has the content of '{}', keeping id {}", name, old, id);
                id
            }
            None => {
                let id = self.next_id();
                log::info!("Registered '{}' as document {}", name, id);
                id
            }
        };

        self.entries.insert(
            key,
            RegistryEntry {
                id,
                name: name.to_string(),
                fingerprint: fingerprint.map(str::to_string),
                registered_at: Utc::now(),
            },
        );
        id
    }

    /// Register a batch, in sorted name order, so ids never depend on
    /// scheduling. Returns ids in input order.
    pub fn register_all(&mut self, documents: &[(String, Option<String>)]) -> Vec<DocumentId> {
        let mut order: Vec<usize> = (0..documents.len()).collect();
        order.sort_by_key(|&i| normalize_name(&documents[i].0));

        let mut ids = vec![DocumentId(0); documents.len()];
        for i in order {
            let (name, fingerprint) = &documents[i];
            ids[i] = self.register(name, fingerprint.as_deref());
        }
        ids
    }

    /// Export the registry as CSV: id, name, formatted id, status.
    ///
    /// Documents without an entry in `statuses` are reported as `registered`.
    pub fn export_csv(
        &self,
        path: impl AsRef<Path>,
        statuses: &HashMap<DocumentId, String>,
    ) -> Result<()> {
        let mut rows: Vec<&RegistryEntry> = self.entries.values().collect();
        rows.sort_by_key(|e| (e.id, e.registered_at));
        rows.dedup_by_key(|e| e.id);

        let mut writer = csv::Writer::from_path(path)?;
        for entry in rows {
            writer.serialize(RegistryRow {
                id: entry.id.0,
                name: &entry.name,
                formatted_id: entry.id.to_string(),
                status: statuses
                    .get(&entry.id)
                    .map(String::as_str)
                    .unwrap_or("registered"),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
