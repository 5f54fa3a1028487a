//! Bidirectional metadata synchronization.
//!
//! Each canonical store (chunk JSONL, document records, classification) has
//! a CSV mirror that humans edit. A sync run compares, field by field, the
//! canonical value, the mirror value and the value recorded at the last
//! sync, and moves each change to the side that has not seen it. Divergent
//! changes are conflicts: the canonical value stays, the human value stays
//! in the CSV, and the row's `sync_status` says so.

mod lock;
mod options;
mod report;
mod resolve;
mod snapshot;
mod tabular;

pub use lock::SyncLock;
pub use options::SyncOptions;
pub use report::{Conflict, FieldRef, RowRef, SyncReport};
pub use resolve::{FieldVersions, Resolution};
pub use snapshot::{Override, SyncSnapshot};
pub use tabular::{format_pages, Tabular, CHUNK_TABLE, CLASSIFICATION_TABLE, DOCUMENT_TABLE};

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::identity::DocumentId;
use crate::model::{CaptionMetadata, Chunk};
use crate::pipeline::Stage;
use crate::store::{read_chunks, read_rows, write_chunks, write_rows, DocumentRecord, OutputLayout, Row};

/// Status column appended to every mirror.
pub const SYNC_STATUS: &str = "sync_status";

/// Snapshot slot holding the digest of a row's read-only cells.
const READ_ONLY_DIGEST: &str = "@read_only";

fn cell(value: &str) -> String {
    value.replace("\r\n", "\n").trim().to_string()
}

fn read_only_digest(row: &Row, columns: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for c in columns {
        hasher.update(c.as_bytes());
        hasher.update([0u8]);
        hasher.update(cell(row.get(*c).map(String::as_str).unwrap_or("")).as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Copy the document's caption fields onto its chunks.
pub fn refresh_caption_fields(chunks: &mut [Chunk], caption: Option<&CaptionMetadata>) {
    for chunk in chunks {
        chunk.document_title = caption.and_then(|c| c.document_title.clone());
        chunk.filing_party = caption.and_then(|c| c.filing_party.clone());
        chunk.filing_date = caption.and_then(|c| c.filing_date.clone());
    }
}

/// Runs sync passes over canonical stores and their mirrors.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    options: SyncOptions,
}

impl Synchronizer {
    /// Create a synchronizer.
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync one table.
    ///
    /// `canonical` is updated in place (applied edits, confirmed deletions);
    /// persisting it is the caller's job. The mirror and `snapshot` are
    /// rewritten unless this is a dry run.
    pub fn sync_table<T: Tabular>(
        &self,
        table: &str,
        canonical: &mut Vec<T>,
        mirror: &Path,
        snapshot: &mut SyncSnapshot,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::new(None);
        report.dry_run = self.options.dry_run;

        let file = read_rows(mirror)?;
        let mirror_exists = file.is_some();
        let file = file.unwrap_or_default();
        let read_only = T::read_only();

        let canonical_keys: HashSet<String> = canonical.iter().map(|r| r.key()).collect();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut unknown: Vec<(usize, String)> = Vec::new();
        let mut retired: Vec<String> = Vec::new();
        for (i, row) in file.rows.iter().enumerate() {
            match T::key_of(row) {
                Some(k) if canonical_keys.contains(&k) && !by_key.contains_key(&k) => {
                    by_key.insert(k, i);
                }
                // synced before, gone from canonical: retired by a rebuild
                Some(k) if !canonical_keys.contains(&k) && snapshot.has_row(table, &k) => {
                    log::info!("{} row {} no longer exists; dropped from {}", table, k, mirror.display());
                    retired.push(k);
                }
                Some(k) => unknown.push((i, k)),
                // header is line 1
                None => unknown.push((i, format!("line {}", i + 2))),
            }
        }

        let mut out_rows: Vec<Row> = Vec::with_capacity(canonical.len() + unknown.len());
        let mut keep = vec![true; canonical.len()];

        for (idx, record) in canonical.iter_mut().enumerate() {
            let key = record.key();
            let canon_row = record.to_row();

            let Some(&ti) = by_key.get(&key) else {
                if mirror_exists && snapshot.has_row(table, &key) {
                    log::warn!("{} row {} was removed from {}", table, key, mirror.display());
                    let row_ref = RowRef {
                        table: table.to_string(),
                        key: key.clone(),
                    };
                    if self.options.confirm_deletions {
                        keep[idx] = false;
                        snapshot.remove_row(table, &key);
                        report.deleted.push(row_ref);
                    } else {
                        report.pending_deletions.push(row_ref);
                    }
                    continue;
                }
                for f in T::EDITABLE {
                    snapshot.set_base(table, &key, f, canon_row.get(*f).map(String::as_str).unwrap_or(""));
                }
                snapshot.set_base(table, &key, READ_ONLY_DIGEST, &read_only_digest(&canon_row, &read_only));
                let mut row = canon_row;
                row.insert(SYNC_STATUS.to_string(), String::new());
                out_rows.push(row);
                continue;
            };

            let tab = &file.rows[ti];
            let mut display = canon_row.clone();
            let mut conflicted: Vec<&str> = Vec::new();

            for &f in T::EDITABLE {
                let canon_v = canon_row.get(f).map(String::as_str).unwrap_or("");
                let edited_v = if file.has_column(f) {
                    tab.get(f).map(String::as_str).unwrap_or("")
                } else {
                    canon_v
                };
                let base = snapshot.base(table, &key, f).map(str::to_string);
                let versions = FieldVersions {
                    base: base.as_deref(),
                    canonical: canon_v,
                    edited: edited_v,
                };
                let field_ref = |value: &str| FieldRef {
                    table: table.to_string(),
                    key: key.clone(),
                    field: f.to_string(),
                    value: value.to_string(),
                };

                match versions.resolve() {
                    Resolution::Unchanged => {}
                    Resolution::EditWins(v) => match record.apply(f, &v) {
                        Ok(()) => {
                            let applied = record.to_row().get(f).cloned().unwrap_or(v);
                            log::info!("{} {}: {} <- '{}'", table, key, f, applied);
                            snapshot.set_base(table, &key, f, &applied);
                            if let Some(fp) = record.fingerprint() {
                                snapshot.record_override(table, &key, &fp, f, &applied);
                            }
                            report.applied_edits.push(field_ref(&applied));
                            display.insert(f.to_string(), applied);
                        }
                        Err(e) => {
                            log::warn!("{} {}: rejected edit of {}: {}", table, key, f, e);
                            report.rejected_edits.push(field_ref(edited_v));
                        }
                    },
                    Resolution::CanonicalWins(v) => {
                        snapshot.set_base(table, &key, f, &v);
                        report.refreshed.push(field_ref(&v));
                    }
                    Resolution::Converged(v) => snapshot.set_base(table, &key, f, &v),
                    Resolution::Conflict => {
                        log::warn!(
                            "{} {}: conflict on {} (canonical '{}', edited '{}')",
                            table,
                            key,
                            f,
                            canon_v,
                            edited_v
                        );
                        report.conflicts.push(Conflict {
                            table: table.to_string(),
                            key: key.clone(),
                            field: f.to_string(),
                            base: base.clone(),
                            canonical: canon_v.to_string(),
                            edited: edited_v.to_string(),
                        });
                        display.insert(f.to_string(), edited_v.to_string());
                        conflicted.push(f);
                    }
                }
            }

            // read-only cells are always rewritten; only report cells a human touched
            let stored = snapshot.base(table, &key, READ_ONLY_DIGEST).map(str::to_string);
            let tab_digest = read_only_digest(tab, &read_only);
            if stored.as_deref() != Some(tab_digest.as_str()) {
                for &f in &read_only {
                    if !file.has_column(f) {
                        continue;
                    }
                    let tab_v = tab.get(f).map(String::as_str).unwrap_or("");
                    let canon_v = canon_row.get(f).map(String::as_str).unwrap_or("");
                    if cell(tab_v) != cell(canon_v) {
                        report.ignored_edits.push(FieldRef {
                            table: table.to_string(),
                            key: key.clone(),
                            field: f.to_string(),
                            value: tab_v.to_string(),
                        });
                    }
                }
            }
            snapshot.set_base(table, &key, READ_ONLY_DIGEST, &read_only_digest(&canon_row, &read_only));

            let status = if conflicted.is_empty() {
                String::new()
            } else {
                format!("conflict: {}", conflicted.join(","))
            };
            display.insert(SYNC_STATUS.to_string(), status);
            out_rows.push(display);
        }

        let mut flags = keep.into_iter();
        canonical.retain(|_| flags.next().unwrap_or(true));
        for key in &retired {
            snapshot.remove_row(table, key);
        }

        unknown.sort_by_key(|(i, _)| *i);
        for (i, key) in unknown {
            report.unknown_rows.push(RowRef {
                table: table.to_string(),
                key,
            });
            out_rows.push(file.rows[i].clone());
        }

        if !self.options.dry_run {
            let mut columns: Vec<&str> = T::COLUMNS.to_vec();
            columns.push(SYNC_STATUS);
            write_rows(mirror, &columns, &out_rows)?;
        }

        log::info!(
            "Synced {} ({}): {} applied, {} refreshed, {} conflicts, {} ignored",
            table,
            mirror.display(),
            report.applied_edits.len(),
            report.refreshed.len(),
            report.conflicts.len(),
            report.ignored_edits.len()
        );
        Ok(report)
    }

    /// Sync one document's classification and chunk tables.
    ///
    /// Holds the document's lock file for the whole run; a concurrent sync of
    /// the same document fails with [`Error::Locked`].
    pub fn sync_document(&self, layout: &OutputLayout, id: DocumentId) -> Result<SyncReport> {
        let _lock = SyncLock::for_document(layout.locks_dir(), id)?;

        let record_path = layout.document_json(id);
        let mut record = DocumentRecord::load(&record_path)?
            .ok_or_else(|| Error::MissingInput(record_path.clone()))?;
        let state_path = layout.sync_state(id);
        let mut snapshot = SyncSnapshot::load(&state_path)?;
        let mut report = SyncReport::new(Some(id));

        let before = record.page_categories();
        report.merge(self.sync_table(
            CLASSIFICATION_TABLE,
            &mut record.classification,
            &layout.classification_csv(id),
            &mut snapshot,
        )?);
        let invalidated: Vec<u32> = record
            .classification
            .iter()
            .enumerate()
            .filter(|(i, row)| before.get(*i) != Some(&row.category()))
            .map(|(i, row)| row.page().unwrap_or(i as u32 + 1))
            .collect();
        if !invalidated.is_empty() {
            log::warn!(
                "Document {}: categories changed on pages {:?}; rerun chunking",
                id,
                invalidated
            );
            if record.stage > Stage::Classify {
                record.advance(Stage::Classify);
            }
        }
        report.invalidated_pages.extend(invalidated);

        let chunks_path = layout.chunks_jsonl(id);
        let mut chunks = read_chunks(&chunks_path)?;
        refresh_caption_fields(&mut chunks, record.caption.as_ref());
        report.merge(self.sync_table(CHUNK_TABLE, &mut chunks, &layout.chunks_csv(id), &mut snapshot)?);

        if !self.options.dry_run {
            write_chunks(&chunks_path, &chunks)?;
            record.chunk_count = chunks.len();
            record.save(&record_path)?;
            snapshot.save(&state_path)?;
        }
        Ok(report)
    }

    /// Sync the root documents table against every document record.
    pub fn sync_documents(&self, layout: &OutputLayout) -> Result<SyncReport> {
        let lock_path = layout.locks_dir().join("documents.lock");
        let _lock = SyncLock::try_acquire(&lock_path)?
            .ok_or_else(|| Error::Other("documents table is locked by another sync run".into()))?;

        let mut records = layout.load_records()?;
        let before: Vec<(DocumentId, Option<CaptionMetadata>)> =
            records.iter().map(|r| (r.id, r.caption.clone())).collect();
        let state_path = layout.root_sync_state();
        let mut snapshot = SyncSnapshot::load(&state_path)?;

        let report = self.sync_table(DOCUMENT_TABLE, &mut records, &layout.documents_csv(), &mut snapshot)?;

        if !self.options.dry_run {
            // confirmed deletions drop the row only; records stay on disk
            for record in &mut records {
                let changed = before
                    .iter()
                    .any(|(id, caption)| *id == record.id && *caption != record.caption);
                if changed {
                    record.updated_at = Utc::now();
                    record.save(layout.document_json(record.id))?;
                }
            }
            snapshot.save(&state_path)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ChunkId;
    use crate::model::{DraftChunk, PageCategory, SectionPath};
    use crate::store::read_rows;
    use tempfile::TempDir;

    fn chunk(id: u32, label: Option<&str>) -> Chunk {
        Chunk::from_draft(
            DocumentId(1),
            ChunkId(id),
            DraftChunk {
                page_numbers: vec![id],
                section_path: Some(SectionPath::single("I. INTRODUCTION")),
                exhibit_label: label.map(str::to_string),
                exhibit_title: None,
                page_type: PageCategory::PleadingBody,
                text: format!("Chunk {} text.", id),
                token_count: 3,
            },
            None,
        )
    }

    fn edit_cell(path: &Path, key_col: &str, key: &str, field: &str, value: &str) {
        let table = read_rows(path).unwrap().unwrap();
        let rows: Vec<Row> = table
            .rows
            .into_iter()
            .map(|mut r| {
                if r.get(key_col).map(String::as_str) == Some(key) {
                    r.insert(field.to_string(), value.to_string());
                }
                r
            })
            .collect();
        let cols: Vec<&str> = table.columns.iter().map(String::as_str).collect();
        write_rows(path, &cols, &rows).unwrap();
    }

    #[test]
    fn test_edit_flows_to_canonical() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, Some("Exhibit A")), chunk(2, None)];

        let first = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert!(first.is_noop());

        edit_cell(&mirror, "chunk_id", "001", "exhibit_label", "Exhibit B");
        let report = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert_eq!(report.applied_edits.len(), 1);
        assert_eq!(chunks[0].exhibit_label.as_deref(), Some("Exhibit B"));

        let again = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn test_canonical_change_flows_to_mirror() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, Some("Exhibit A"))];
        sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        chunks[0].exhibit_label = Some("Exhibit C".into());
        let report = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert_eq!(report.refreshed.len(), 1);
        let table = read_rows(&mirror).unwrap().unwrap();
        assert_eq!(table.rows[0]["exhibit_label"], "Exhibit C");
    }

    #[test]
    fn test_conflict_keeps_both_sides() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, Some("Exhibit A"))];
        sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        edit_cell(&mirror, "chunk_id", "001", "exhibit_label", "Exhibit Y");
        chunks[0].exhibit_label = Some("Exhibit Z".into());
        let report = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(chunks[0].exhibit_label.as_deref(), Some("Exhibit Z"));
        let table = read_rows(&mirror).unwrap().unwrap();
        assert_eq!(table.rows[0]["exhibit_label"], "Exhibit Y");
        assert_eq!(table.rows[0][SYNC_STATUS], "conflict: exhibit_label");
        assert_eq!(snap.base(CHUNK_TABLE, "0001:001", "exhibit_label"), Some("Exhibit A"));
    }

    #[test]
    fn test_read_only_edit_ignored_and_refreshed() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, None)];
        sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        edit_cell(&mirror, "chunk_id", "001", "text", "Rewritten.");
        let report = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert_eq!(report.ignored_edits.len(), 1);
        assert_eq!(report.ignored_edits[0].field, "text");
        let table = read_rows(&mirror).unwrap().unwrap();
        assert_eq!(table.rows[0]["text"], "Chunk 1 text.");
    }

    #[test]
    fn test_deletions_need_confirmation() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, None), chunk(2, None)];
        Synchronizer::default()
            .sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap)
            .unwrap();

        let table = read_rows(&mirror).unwrap().unwrap();
        let cols: Vec<&str> = table.columns.iter().map(String::as_str).collect();
        write_rows(&mirror, &cols, &table.rows[..1]).unwrap();

        let report = Synchronizer::default()
            .sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap)
            .unwrap();
        assert_eq!(report.pending_deletions.len(), 1);
        assert_eq!(chunks.len(), 2);

        let confirm = Synchronizer::new(SyncOptions::new().with_confirm_deletions(true));
        let report = confirm.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_unknown_rows_left_alone() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, None)];
        sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        let mut table = read_rows(&mirror).unwrap().unwrap();
        let mut extra = table.rows[0].clone();
        extra.insert("chunk_id".into(), "099".into());
        table.rows.push(extra);
        let cols: Vec<&str> = table.columns.iter().map(String::as_str).collect();
        write_rows(&mirror, &cols, &table.rows).unwrap();

        let report = sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert_eq!(report.unknown_rows.len(), 1);
        assert_eq!(report.unknown_rows[0].key, "0001:099");
        assert_eq!(read_rows(&mirror).unwrap().unwrap().rows.len(), 2);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_rows_retired_by_rebuild_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let sync = Synchronizer::default();
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, None), chunk(2, None)];
        sync.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();

        let mut rebuilt = vec![chunk(1, None)];
        let report = sync.sync_table(CHUNK_TABLE, &mut rebuilt, &mirror, &mut snap).unwrap();
        assert!(report.unknown_rows.is_empty());
        assert!(report.pending_deletions.is_empty());
        assert_eq!(read_rows(&mirror).unwrap().unwrap().rows.len(), 1);
        assert!(!snap.has_row(CHUNK_TABLE, "0001:002"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("chunks.csv");
        let mut snap = SyncSnapshot::default();
        let mut chunks = vec![chunk(1, None)];
        let dry = Synchronizer::new(SyncOptions::new().with_dry_run(true));
        let report = dry.sync_table(CHUNK_TABLE, &mut chunks, &mirror, &mut snap).unwrap();
        assert!(report.dry_run);
        assert!(!mirror.exists());
    }
}
