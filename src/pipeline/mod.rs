//! Document pipeline: load → classify → align → chunk → persist → sync.
//!
//! Documents of a batch run in parallel on the rayon pool; the stages of one
//! document run in order. Document ids are issued before the parallel
//! section so they never depend on scheduling. A failing document is
//! reported as a [`DocumentFailure`] and never stops the others.
//!
//! Classification is saved as soon as it completes, so a cancelled or failed
//! run resumes from the saved classification instead of classifying again.

mod config;
mod report;

pub use config::PipelineConfig;
pub use report::{BatchReport, DocumentReport};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chunk::chunk_document;
use crate::classify::{HeuristicClassifier, PageClassifier, RetryingClassifier};
use crate::error::{DocumentFailure, Error, Result};
use crate::identity::{ChunkIdAllocator, DocumentId, IdRegistry, KeyedLocks};
use crate::model::{detect_exhibits, Document};
use crate::source::{document_name, SourceLoader};
use crate::store::{read_chunks, write_chunks, ClassificationRow, DocumentRecord, OutputLayout};
use crate::sync::{SyncLock, SyncReport, SyncSnapshot, Synchronizer, CHUNK_TABLE};
use crate::toc::parse_toc;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Read page text and classifier output
    Load,
    /// Assign page categories
    Classify,
    /// Parse the TOC, find exhibits
    Align,
    /// Build chunks
    Chunk,
    /// Number and store chunks
    Persist,
    /// Mirror to the CSV files
    Sync,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Classify => "classify",
            Stage::Align => "align",
            Stage::Chunk => "chunk",
            Stage::Persist => "persist",
            Stage::Sync => "sync",
        };
        f.write_str(name)
    }
}

/// Shared flag checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] before `stage` when cancelled.
    pub fn check(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs documents through every stage and writes the output layout.
pub struct Pipeline {
    config: PipelineConfig,
    layout: OutputLayout,
    loader: SourceLoader,
    classifier: RetryingClassifier,
    synchronizer: Synchronizer,
    cancel: CancellationToken,
    locks: KeyedLocks,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    /// Create a pipeline writing to `layout`, with the heuristic classifier.
    pub fn new(layout: OutputLayout, config: PipelineConfig) -> Self {
        let classifier = RetryingClassifier::new(Arc::new(HeuristicClassifier::new()), config.retry.clone());
        let synchronizer = Synchronizer::new(config.sync.clone());
        Self {
            config,
            layout,
            loader: SourceLoader::default(),
            classifier,
            synchronizer,
            cancel: CancellationToken::new(),
            locks: KeyedLocks::new(),
            progress: None,
        }
    }

    /// Use another page classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn PageClassifier>) -> Self {
        self.classifier = RetryingClassifier::new(classifier, self.config.retry.clone());
        self
    }

    /// Use another source loader.
    pub fn with_loader(mut self, loader: SourceLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Share a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Call `f` with each document name as it finishes.
    pub fn with_progress(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Cancellation token of this pipeline.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Output layout.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process a batch of document directories.
    ///
    /// Ids are issued in sorted name order before any document runs; the
    /// registry, its CSV export and the documents table are updated after.
    pub fn run_batch(&self, sources: &[PathBuf]) -> Result<BatchReport> {
        self.layout.ensure()?;

        let load = |dir: &PathBuf| (document_name(dir), self.loader.load(dir));
        let loaded: Vec<(String, Result<Document>)> = if self.config.parallel {
            sources.par_iter().map(load).collect()
        } else {
            sources.iter().map(load).collect()
        };

        let mut registry = IdRegistry::open_in(self.layout.root())?;
        let keys: Vec<(String, Option<String>)> = loaded
            .iter()
            .map(|(name, doc)| (name.clone(), doc.as_ref().ok().map(Document::fingerprint)))
            .collect();
        let ids = registry.register_all(&keys);
        registry.save()?;
        log::info!("Issued ids for {} documents", ids.len());

        let jobs: Vec<(DocumentId, String, Result<Document>)> = ids
            .into_iter()
            .zip(loaded)
            .map(|(id, (name, doc))| (id, name, doc))
            .collect();
        let run = |(id, name, doc): (DocumentId, String, Result<Document>)| {
            let result = match doc {
                Ok(doc) => self.process_document(doc, id),
                Err(e) => Err(DocumentFailure::new(Some(id), name.as_str(), Stage::Load, &e)),
            };
            if let Some(progress) = &self.progress {
                progress(&name);
            }
            result
        };
        let results: Vec<std::result::Result<DocumentReport, DocumentFailure>> = if self.config.parallel {
            jobs.into_par_iter().map(run).collect()
        } else {
            jobs.into_iter().map(run).collect()
        };

        let mut report = BatchReport::default();
        let mut statuses: HashMap<DocumentId, String> = HashMap::new();
        for result in results {
            match result {
                Ok(doc) => {
                    statuses.insert(doc.document_id, "processed".to_string());
                    report.documents.push(doc);
                }
                Err(failure) => {
                    log::error!("{}", failure);
                    if let Some(id) = failure.document_id {
                        statuses.insert(id, format!("failed at {}", failure.stage));
                    }
                    report.failures.push(failure);
                }
            }
        }
        registry.export_csv(self.layout.registry_csv(), &statuses)?;

        if !report.documents.is_empty() && !self.cancel.is_cancelled() {
            match self.synchronizer.sync_documents(&self.layout) {
                Ok(sync) => report.documents_sync = Some(sync),
                Err(e) => log::warn!("Documents table not synced: {}", e),
            }
        }

        log::info!(
            "Batch done: {} documents, {} failed, {} chunks",
            report.documents.len(),
            report.failures.len(),
            report.chunk_count()
        );
        Ok(report)
    }

    /// Run every stage for one document under an already issued id.
    pub fn process_document(
        &self,
        doc: Document,
        id: DocumentId,
    ) -> std::result::Result<DocumentReport, DocumentFailure> {
        let name = doc.name.clone();
        let mut stage = Stage::Load;
        self.run_stages(doc, id, &mut stage)
            .map_err(|e| DocumentFailure::new(Some(id), name, stage, &e))
    }

    fn run_stages(&self, mut doc: Document, id: DocumentId, stage: &mut Stage) -> Result<DocumentReport> {
        let layout = &self.layout;
        layout.ensure_document(id)?;
        let record_path = layout.document_json(id);
        let fingerprint = doc.fingerprint();
        let mut sync = SyncReport::new(Some(id));

        // load: resume from a previous run's classification when content is unchanged
        let mut record = match DocumentRecord::load(&record_path)? {
            Some(previous) if previous.fingerprint == fingerprint && previous.stage >= Stage::Classify => {
                let mut absorbed = self.locks.with_lock(id, || self.synchronizer.sync_document(layout, id))?;
                if !absorbed.invalidated_pages.is_empty() {
                    log::info!(
                        "Document {}: pages {:?} reclassified by hand; rebuilding",
                        id,
                        absorbed.invalidated_pages
                    );
                    absorbed.invalidated_pages.clear();
                }
                sync.merge(absorbed);
                DocumentRecord::load(&record_path)?.ok_or_else(|| Error::MissingInput(record_path.clone()))?
            }
            Some(mut previous) => {
                if previous.fingerprint != fingerprint {
                    log::warn!("Document {} ({}): content changed; classifying again", id, doc.name);
                }
                previous.name = doc.name.clone();
                previous.fingerprint = fingerprint;
                previous.stage = Stage::Load;
                previous
            }
            None => DocumentRecord::new(id, &doc),
        };
        let resumed = record.stage >= Stage::Classify && record.classification.len() == doc.pages.len();

        *stage = Stage::Classify;
        self.cancel.check(Stage::Classify)?;
        let mut classified_pages = 0;
        if resumed {
            restore_classification(&mut doc, &record.classification);
            log::info!("Document {}: classification resumed", id);
        } else {
            classified_pages = self.classifier.classify_missing(&mut doc.pages, self.config.parallel);
            record.classification = doc.pages.iter().map(ClassificationRow::from_page).collect();
            record.advance(Stage::Classify);
            record.save(&record_path)?;
            log::info!("Document {}: classified {} pages", id, classified_pages);
        }
        if record.caption.is_none() {
            record.caption = doc.caption().cloned();
        }

        *stage = Stage::Align;
        self.cancel.check(Stage::Align)?;
        doc.exhibits = detect_exhibits(&doc.pages);
        doc.toc = match doc.toc_text() {
            Some(text) => match parse_toc(&text) {
                Ok(forest) if !forest.is_empty() => Some(forest),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Document {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        *stage = Stage::Chunk;
        self.cancel.check(Stage::Chunk)?;
        let outcome = chunk_document(&doc, &self.config.align, &self.config.chunk)?;
        let alignment = match (&outcome.alignment, &doc.toc) {
            (Some(a), Some(forest)) => Some((a.matched_count(), forest.len())),
            _ => None,
        };
        let mode = outcome.mode;
        let fallback_reason = outcome.fallback_reason.clone();

        *stage = Stage::Persist;
        self.cancel.check(Stage::Persist)?;
        let allocator = ChunkIdAllocator::new(id);
        let caption = record.caption.clone();
        let (chunk_count, reapplied_edits, identity_changes) = self.locks.with_lock(id, || -> Result<_> {
            // shared with sync runs in other processes
            let _lock = SyncLock::for_document(layout.locks_dir(), id)?;
            let chunks_path = layout.chunks_jsonl(id);
            let previous = read_chunks(&chunks_path)?;
            let mut chunks = allocator.allocate(outcome.drafts, caption.as_ref());
            let changes = allocator.stamp(&chunks, &previous);

            let state_path = layout.sync_state(id);
            let mut snapshot = SyncSnapshot::load(&state_path)?;
            let reapplied = snapshot.apply_overrides(CHUNK_TABLE, &mut chunks);
            if reapplied > 0 {
                log::info!("Document {}: re-applied {} edited fields", id, reapplied);
            }
            write_chunks(&chunks_path, &chunks)?;
            snapshot.save(&state_path)?;
            Ok((chunks.len(), reapplied, changes))
        })?;
        record.mode = Some(mode);
        record.fallback_reason = fallback_reason.clone();
        record.chunk_count = chunk_count;
        record.identity_changes = identity_changes.clone();
        record.advance(Stage::Persist);
        record.save(&record_path)?;

        *stage = Stage::Sync;
        self.cancel.check(Stage::Sync)?;
        let mirrored = self.locks.with_lock(id, || self.synchronizer.sync_document(layout, id))?;
        let rerun = !mirrored.invalidated_pages.is_empty();
        sync.merge(mirrored);
        if !rerun && !self.config.sync.dry_run {
            if let Some(mut synced) = DocumentRecord::load(&record_path)? {
                synced.advance(Stage::Sync);
                synced.save(&record_path)?;
            }
        }

        log::info!("Document {} ({}): {} chunks, {} mode", id, doc.name, chunk_count, mode);
        Ok(DocumentReport {
            document_id: id,
            name: doc.name.clone(),
            page_count: doc.page_count(),
            classified_pages,
            resumed,
            mode,
            fallback_reason,
            alignment,
            chunk_count,
            reapplied_edits,
            identity_changes,
            sync,
        })
    }
}

/// Put saved classification rows back on freshly loaded pages.
///
/// Caption and TOC payloads come from the source files and are kept.
fn restore_classification(doc: &mut Document, rows: &[ClassificationRow]) {
    let by_page: HashMap<u32, &ClassificationRow> =
        rows.iter().filter_map(|r| r.page().map(|p| (p, r))).collect();
    for page in &mut doc.pages {
        let Some(row) = by_page.get(&page.number) else {
            continue;
        };
        let mut classification = row.to_classification();
        if let Some(previous) = page.classification.take() {
            classification.caption = previous.caption;
            classification.toc = previous.toc;
        }
        page.classification = Some(classification);
    }
}
