//! Integration tests for the document pipeline.

use std::fs;
use std::path::Path;

use filingchunk::chunk::{prepare_pages, BodyStream, Outline};
use filingchunk::store::read_chunks;
use filingchunk::text::{strip_tags, BLOCK_QUOTE_CLOSE, BLOCK_QUOTE_OPEN};
use filingchunk::toc::scan_candidates;
use filingchunk::{
    align, chunk_document, parse_toc, AlignOptions, CaptionMetadata, Chunk, ChunkMode,
    ChunkOptions, Classification, Document, DocumentId, Footnote, OutputLayout, Page,
    PageCategory, Pipeline, PipelineConfig, Stage,
};
use tempfile::TempDir;

const TOC: &str = "TABLE OF CONTENTS\n\
                   I. INTRODUCTION ..... 3\n\
                   II. ARGUMENT ..... 5\n\
                   II.A Liability Standards ..... 6";

/// Ten-page motion whose TOC has three entries; the body never prints
/// the "II.A" heading.
fn motion() -> Document {
    let caption = CaptionMetadata {
        document_title: Some("PLAINTIFF'S MOTION FOR SUMMARY JUDGMENT".to_string()),
        filing_party: Some("Plaintiff".to_string()),
        case_number: Some("22-1".to_string()),
        ..Default::default()
    };
    let body = |n: u32, text: &str| Page::classified(n, PageCategory::PleadingBody, text);

    let pages = vec![
        Page::new(1, "SUPERIOR COURT OF CALIFORNIA\nCase No. 22-1\nPLAINTIFF'S MOTION FOR SUMMARY JUDGMENT")
            .with_classification(Classification::new(PageCategory::Caption).with_caption(caption)),
        Page::new(2, TOC).with_classification(Classification::new(PageCategory::TableOfContents).with_toc(TOC)),
        body(
            3,
            "I. INTRODUCTION\nPlaintiff moves for summary judgment on every claim. Discovery closed in March and the record is complete.",
        ),
        body(
            4,
            "Defendant has identified no witness who saw the spill before the fall. Nothing in the record is disputed.",
        ),
        body(
            5,
            "II. ARGUMENT\nThe court should grant the motion because each element is established.",
        ),
        body(
            6,
            "The duty of care is measured by what a reasonable owner would do. Defendant breached that duty by leaving the spill in place.",
        ),
        body(
            7,
            "Causation follows from the same record. The injury occurred within minutes of the spill.",
        ),
        body(
            8,
            "Damages are documented by the treating physician. Her report is uncontested.",
        ),
        body(9, "For these reasons the motion should be granted."),
        Page::classified(
            10,
            PageCategory::ProofOfService,
            "PROOF OF SERVICE\nI served the foregoing document on all counsel of record.",
        ),
    ];
    let mut doc = Document::new("Motion for Summary Judgment", pages).unwrap();
    doc.toc = Some(parse_toc(TOC).unwrap());
    doc
}

fn section(chunk_path: &Option<filingchunk::SectionPath>) -> Option<String> {
    chunk_path.as_ref().map(|p| p.to_string())
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn process(root: &Path, doc: Document) -> filingchunk::DocumentReport {
    let pipeline = Pipeline::new(OutputLayout::new(root), PipelineConfig::new().sequential());
    pipeline.process_document(doc, DocumentId(1)).unwrap()
}

#[test]
fn test_unmatched_entry_content_belongs_to_parent_section() {
    let doc = motion();
    let outcome = chunk_document(&doc, &AlignOptions::default(), &ChunkOptions::default()).unwrap();

    assert_eq!(outcome.mode, ChunkMode::Structural);
    assert_eq!(outcome.alignment.as_ref().map(|a| a.matched_count()), Some(2));

    let duty = outcome
        .drafts
        .iter()
        .find(|d| d.text.contains("reasonable owner"))
        .expect("duty text is chunked");
    assert_eq!(section(&duty.section_path).as_deref(), Some("II. ARGUMENT"));

    for draft in &outcome.drafts {
        let first = draft.page_numbers[0];
        let expected = match first {
            3 | 4 => Some("I. INTRODUCTION"),
            5..=9 => Some("II. ARGUMENT"),
            _ => continue,
        };
        assert_eq!(section(&draft.section_path).as_deref(), expected, "chunk on page {}", first);
    }
}

#[test]
fn test_chunks_never_cross_a_section_boundary() {
    let doc = motion();
    let options = ChunkOptions::default().with_max_tokens(20).with_min_tokens(5);
    let outcome = chunk_document(&doc, &AlignOptions::default(), &options).unwrap();

    assert!(outcome.drafts.len() > 3);
    for draft in &outcome.drafts {
        let intro = draft.page_numbers.iter().any(|p| (3..=4).contains(p));
        let argument = draft.page_numbers.iter().any(|p| (5..=9).contains(p));
        assert!(!(intro && argument), "chunk spans sections: {:?}", draft.page_numbers);
    }
}

#[test]
fn test_chunks_reconstruct_the_body_stream() {
    let doc = motion();
    let options = ChunkOptions::default().with_max_tokens(20).with_min_tokens(5);
    let outcome = chunk_document(&doc, &AlignOptions::default(), &options).unwrap();

    let forest = doc.toc.as_ref().unwrap();
    let pages = prepare_pages(&doc);
    let candidates = scan_candidates(&pages, &AlignOptions::default());
    let alignment = align(forest, &candidates, &AlignOptions::default()).unwrap();
    let markers = alignment.markers(forest);
    let stream = BodyStream::build(
        &pages,
        &[],
        Some(Outline {
            forest,
            markers: &markers,
        }),
        &options,
    );

    let joined = outcome
        .drafts
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let expected = stream.text();
    assert_eq!(words(&joined), words(&expected));
    assert!(!joined.contains("TABLE OF CONTENTS"));
}

/// Four-page brief with a footnote on page 1 and an indented quote on page 2.
fn annotated_brief() -> Document {
    let note = Footnote::new("1", "See Cal. Civ. Code section 1542.").with_context("relies on the statute");
    let pages = vec![
        Page::classified(
            1,
            PageCategory::PleadingBody,
            "I. INTRODUCTION\nPlaintiff relies on the statute.1 The court should deny the motion.\n\n\
             1 See Cal. Civ. Code section 1542.",
        )
        .with_footnotes(vec![note]),
        Page::classified(
            2,
            PageCategory::PleadingBody,
            "The governing rule is stated plainly:\n    \
             Every person is responsible, not only for the result\n    \
             of his or her willful acts, but also for an injury.\n\
             That rule controls here.",
        ),
        Page::classified(
            3,
            PageCategory::PleadingBody,
            "II. ARGUMENT\nThe defendant owed a duty of care. The duty was breached.",
        ),
        Page::classified(4, PageCategory::PleadingBody, "Causation is shown by the record. Damages follow."),
    ];
    let mut doc = Document::new("Opposition Brief", pages).unwrap();
    doc.toc = Some(parse_toc("I. INTRODUCTION ..... 1\nII. ARGUMENT ..... 3").unwrap());
    doc
}

#[test]
fn test_stripping_tags_reconstructs_the_pages() {
    let doc = annotated_brief();
    let max_tokens = 12;
    let options = ChunkOptions::default().with_max_tokens(max_tokens).with_min_tokens(3);
    let outcome = chunk_document(&doc, &AlignOptions::default(), &options).unwrap();
    assert_eq!(outcome.mode, ChunkMode::Structural);
    assert!(outcome.drafts.len() > 4);

    let joined = outcome
        .drafts
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert!(joined.contains("[FN(1)] See Cal. Civ. Code section 1542. [FN(1)_end]"));
    assert!(joined.contains(BLOCK_QUOTE_OPEN));

    let expected = "I. INTRODUCTION Plaintiff relies on the statute. See Cal. Civ. Code section 1542. \
                    The court should deny the motion. The governing rule is stated plainly: \
                    Every person is responsible, not only for the result of his or her willful acts, \
                    but also for an injury. That rule controls here. II. ARGUMENT The defendant owed \
                    a duty of care. The duty was breached. Causation is shown by the record. Damages follow.";
    assert_eq!(words(&strip_tags(&joined)), words(expected));

    for draft in &outcome.drafts {
        let text = &draft.text;
        let atomic = text.contains("[FN(") || text.contains(BLOCK_QUOTE_OPEN);
        assert!(
            draft.token_count <= max_tokens || atomic,
            "over budget without a tagged span: {:?}",
            text
        );
        assert_eq!(text.matches("[FN(1)]").count(), text.matches("[FN(1)_end]").count());
        assert_eq!(text.matches(BLOCK_QUOTE_OPEN).count(), text.matches(BLOCK_QUOTE_CLOSE).count());

        let pages = &draft.page_numbers;
        assert!(!pages.is_empty());
        assert!(
            pages.windows(2).all(|w| w[1] == w[0] + 1),
            "page gap in {:?}",
            pages
        );
    }
}

#[test]
fn test_proof_of_service_excluded_by_default() {
    let doc = motion();
    let outcome = chunk_document(&doc, &AlignOptions::default(), &ChunkOptions::default()).unwrap();
    assert!(outcome.drafts.iter().all(|d| !d.page_numbers.contains(&10)));
    assert!(outcome.drafts.iter().all(|d| !d.text.contains("PROOF OF SERVICE")));
}

#[test]
fn test_proof_of_service_is_never_a_chunk_of_its_own() {
    let doc = motion();
    let options = ChunkOptions::default()
        .with_max_tokens(20)
        .with_min_tokens(5)
        .with_exclude_proof_of_service(false);
    let outcome = chunk_document(&doc, &AlignOptions::default(), &options).unwrap();

    let with_service: Vec<_> = outcome
        .drafts
        .iter()
        .filter(|d| d.page_numbers.contains(&10))
        .collect();
    assert!(!with_service.is_empty());
    for draft in with_service {
        assert!(draft.page_numbers.len() > 1, "service page chunked alone");
    }

    // service page opening the body, closed off by the first heading
    let mut leading = Document::new(
        "Notice of Motion",
        vec![
            Page::classified(
                1,
                PageCategory::ProofOfService,
                "PROOF OF SERVICE\nI served the papers on counsel.",
            ),
            Page::classified(
                2,
                PageCategory::PleadingBody,
                "I. INTRODUCTION\nPlaintiff moves for summary judgment on every claim.",
            ),
        ],
    )
    .unwrap();
    leading.toc = Some(parse_toc("I. INTRODUCTION ..... 2").unwrap());
    let include = ChunkOptions::default().with_exclude_proof_of_service(false);
    let outcome = chunk_document(&leading, &AlignOptions::default(), &include).unwrap();

    assert_eq!(outcome.mode, ChunkMode::Structural);
    assert_eq!(outcome.drafts.len(), 1);
    assert_eq!(outcome.drafts[0].page_numbers, vec![1, 2]);
    for draft in &outcome.drafts {
        assert_ne!(draft.page_numbers, vec![1], "service page chunked alone");
        assert_ne!(draft.page_type, PageCategory::ProofOfService);
    }
}

#[test]
fn test_document_without_toc_falls_back() {
    let mut doc = motion();
    doc.toc = None;
    let outcome = chunk_document(&doc, &AlignOptions::default(), &ChunkOptions::default()).unwrap();

    assert_eq!(outcome.mode, ChunkMode::Fallback);
    assert_eq!(outcome.fallback_reason.as_deref(), Some("no table of contents"));
    assert!(outcome.drafts.iter().all(|d| d.section_path.is_none()));
}

#[test]
fn test_pipeline_writes_chunks_and_mirrors() {
    let dir = TempDir::new().unwrap();
    let report = process(dir.path(), motion());

    assert_eq!(report.document_id, DocumentId(1));
    assert_eq!(report.mode, ChunkMode::Structural);
    assert_eq!(report.alignment, Some((2, 3)));
    assert!(!report.resumed);

    let layout = OutputLayout::new(dir.path());
    let chunks = read_chunks(layout.chunks_jsonl(DocumentId(1))).unwrap();
    assert_eq!(chunks.len(), report.chunk_count);
    assert!(layout.chunks_csv(DocumentId(1)).exists());
    assert!(layout.classification_csv(DocumentId(1)).exists());

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_id.0 as usize, i + 1);
        assert!(chunk.hash_is_current());
        assert_eq!(chunk.filing_party.as_deref(), Some("Plaintiff"));
    }

    let record = filingchunk::DocumentRecord::load(layout.document_json(DocumentId(1)))
        .unwrap()
        .unwrap();
    assert_eq!(record.stage, Stage::Sync);
    assert_eq!(record.chunk_count, chunks.len());
    assert_eq!(
        record.caption.as_ref().and_then(|c| c.case_number.as_deref()),
        Some("22-1")
    );
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());

    process(dir.path(), motion());
    let first_bytes = fs::read(layout.chunks_jsonl(DocumentId(1))).unwrap();
    let first: Vec<Chunk> = read_chunks(layout.chunks_jsonl(DocumentId(1))).unwrap();

    let report = process(dir.path(), motion());
    let second_bytes = fs::read(layout.chunks_jsonl(DocumentId(1))).unwrap();
    let second: Vec<Chunk> = read_chunks(layout.chunks_jsonl(DocumentId(1))).unwrap();

    assert!(report.resumed);
    assert_eq!(report.classified_pages, 0);
    assert!(report.identity_changes.is_empty());
    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn filing_dir(root: &Path, name: &str, case: &str) {
    let dir = root.join(name);
    write(
        &dir.join("text_pages/page_0001.txt"),
        &format!("SUPERIOR COURT OF CALIFORNIA\nCase No. {}\nAttorneys for Plaintiff", case),
    );
    write(
        &dir.join("text_pages/page_0002.txt"),
        "The motion is timely. The supporting declaration is attached.",
    );
}

#[test]
fn test_batch_issues_ids_by_name_and_writes_tables() {
    let sources = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    filing_dir(sources.path(), "Beta Opposition", "23-5");
    filing_dir(sources.path(), "Alpha Motion", "23-4");

    let dirs = filingchunk::discover_documents(sources.path()).unwrap();
    let layout = OutputLayout::new(out.path());
    let pipeline = Pipeline::new(layout.clone(), PipelineConfig::new());
    let report = pipeline.run_batch(&dirs).unwrap();

    assert!(report.is_success());
    let ids: Vec<(String, DocumentId)> = report
        .documents
        .iter()
        .map(|d| (d.name.clone(), d.document_id))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("Alpha Motion".to_string(), DocumentId(1)),
            ("Beta Opposition".to_string(), DocumentId(2)),
        ]
    );
    for doc in &report.documents {
        assert_eq!(doc.mode, ChunkMode::Fallback);
        assert_eq!(doc.classified_pages, 2);
    }
    assert!(layout.documents_csv().exists());
    assert!(layout.registry_csv().exists());
    assert!(report.documents_sync.is_some());

    let again = pipeline.run_batch(&dirs).unwrap();
    let ids_again: Vec<DocumentId> = again.documents.iter().map(|d| d.document_id).collect();
    assert_eq!(ids_again, vec![DocumentId(1), DocumentId(2)]);
    assert!(again.documents.iter().all(|d| d.resumed));
}
