//! Integration tests for CSV mirror synchronization.

use std::path::{Path, PathBuf};

use filingchunk::store::{read_chunks, read_rows, write_rows, Row};
use filingchunk::sync::SyncLock;
use filingchunk::{
    CaptionMetadata, Classification, Document, DocumentId, DocumentRecord, Error, OutputLayout,
    Page, PageCategory, Pipeline, PipelineConfig, SectionPath, Stage, SyncOptions, Synchronizer,
};
use tempfile::TempDir;

const ID: DocumentId = DocumentId(1);

fn opposition() -> Document {
    let caption = CaptionMetadata {
        document_title: Some("OPPOSITION TO DEMURRER".to_string()),
        filing_party: Some("Plaintiff".to_string()),
        ..Default::default()
    };
    let pages = vec![
        Page::new(1, "SUPERIOR COURT OF CALIFORNIA\nOPPOSITION TO DEMURRER")
            .with_classification(Classification::new(PageCategory::Caption).with_caption(caption)),
        Page::classified(
            2,
            PageCategory::PleadingBody,
            "The complaint pleads each element of negligence. The demurrer should be overruled.",
        ),
        Page::classified(
            3,
            PageCategory::PleadingBody,
            "Defendant relies on cases that predate the statute. None of them applies here.",
        ),
        Page::classified(
            4,
            PageCategory::PleadingBody,
            "Leave to amend should be granted if any defect is found.",
        ),
    ];
    Document::new("Opposition to Demurrer", pages).unwrap()
}

fn run(root: &Path) -> filingchunk::DocumentReport {
    Pipeline::new(OutputLayout::new(root), PipelineConfig::new().sequential())
        .process_document(opposition(), ID)
        .unwrap()
}

/// Set one cell of the rows whose `key_col` equals `key`.
fn edit_cell(path: &PathBuf, key_col: &str, key: &str, field: &str, value: &str) {
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
    let columns: Vec<&str> = table.columns.iter().map(String::as_str).collect();
    write_rows(path, &columns, &rows).unwrap();
}

#[test]
fn test_chunk_edit_survives_regeneration() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());

    edit_cell(&layout.chunks_csv(ID), "chunk_id", "001", "section_path", "Opposition / Negligence");
    let report = Synchronizer::default().sync_document(&layout, ID).unwrap();
    assert_eq!(report.applied_edits.len(), 1);

    let expected = SectionPath(vec!["Opposition".to_string(), "Negligence".to_string()]);
    let chunks = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert_eq!(chunks[0].section_path.as_ref(), Some(&expected));

    let rerun = run(dir.path());
    assert!(rerun.resumed);
    assert_eq!(rerun.reapplied_edits, 1);
    let chunks = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert_eq!(chunks[0].section_path.as_ref(), Some(&expected));
}

#[test]
fn test_category_edit_invalidates_and_rerun_rebuilds() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());
    let before = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert!(before.iter().any(|c| c.page_numbers.contains(&3)));

    edit_cell(
        &layout.classification_csv(ID),
        "page_number",
        "3",
        "category",
        "Table of authorities",
    );
    let report = Synchronizer::default().sync_document(&layout, ID).unwrap();
    assert_eq!(report.invalidated_pages, vec![3]);

    let record = DocumentRecord::load(layout.document_json(ID)).unwrap().unwrap();
    assert_eq!(record.stage, Stage::Classify);
    assert_eq!(record.page_categories()[2], PageCategory::TableOfAuthorities);

    let rerun = run(dir.path());
    assert!(rerun.resumed);
    assert!(!rerun.needs_rerun());
    let after = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert!(after.iter().all(|c| !c.page_numbers.contains(&3)));

    let record = DocumentRecord::load(layout.document_json(ID)).unwrap().unwrap();
    assert_eq!(record.stage, Stage::Sync);
}

#[test]
fn test_read_only_edit_is_reported_and_reverted() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());
    let original = read_chunks(layout.chunks_jsonl(ID)).unwrap();

    edit_cell(&layout.chunks_csv(ID), "chunk_id", "001", "text", "Rewritten by hand.");
    let report = Synchronizer::default().sync_document(&layout, ID).unwrap();
    assert!(!report.ignored_edits.is_empty());

    let chunks = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert_eq!(chunks, original);
    let mirror = read_rows(layout.chunks_csv(ID)).unwrap().unwrap();
    assert_eq!(mirror.rows[0].get("text"), Some(&original[0].text));
}

#[test]
fn test_documents_table_edit_reaches_chunks() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());
    let sync = Synchronizer::default();
    sync.sync_documents(&layout).unwrap();

    edit_cell(
        &layout.documents_csv(),
        "document_id",
        "0001",
        "document_title",
        "PLAINTIFF'S OPPOSITION TO DEMURRER",
    );
    let report = sync.sync_documents(&layout).unwrap();
    assert_eq!(report.applied_edits.len(), 1);

    let record = DocumentRecord::load(layout.document_json(ID)).unwrap().unwrap();
    assert_eq!(
        record.caption.as_ref().and_then(|c| c.document_title.as_deref()),
        Some("PLAINTIFF'S OPPOSITION TO DEMURRER")
    );

    sync.sync_document(&layout, ID).unwrap();
    let chunks = read_chunks(layout.chunks_jsonl(ID)).unwrap();
    assert!(chunks
        .iter()
        .all(|c| c.document_title.as_deref() == Some("PLAINTIFF'S OPPOSITION TO DEMURRER")));
}

#[test]
fn test_dry_run_leaves_canonical_store() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());
    let original = read_chunks(layout.chunks_jsonl(ID)).unwrap();

    edit_cell(&layout.chunks_csv(ID), "chunk_id", "001", "exhibit_label", "Exhibit 9");
    let dry = Synchronizer::new(SyncOptions::new().with_dry_run(true));
    let report = dry.sync_document(&layout, ID).unwrap();
    assert_eq!(report.applied_edits.len(), 1);
    assert_eq!(read_chunks(layout.chunks_jsonl(ID)).unwrap(), original);
}

#[test]
fn test_concurrent_sync_is_refused() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());

    let held = SyncLock::for_document(layout.locks_dir(), ID).unwrap();
    let err = Synchronizer::default().sync_document(&layout, ID).unwrap_err();
    assert!(matches!(err, Error::Locked(id) if id == ID));

    drop(held);
    assert!(Synchronizer::default().sync_document(&layout, ID).is_ok());
}

#[test]
fn test_lock_left_by_crashed_run_is_taken_over() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    run(dir.path());

    let leftover = layout.locks_dir().join(format!("{}.lock", ID));
    std::fs::write(&leftover, format!("pid={} at=2020-06-01T09:30:00+00:00\n", u32::MAX - 1)).unwrap();

    let report = run(dir.path());
    assert!(report.resumed);
    assert!(!leftover.exists());
}
