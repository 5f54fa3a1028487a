//! Loading classified document directories.
//!
//! ```text
//! <doc>/
//!   text_pages/page_0001.txt
//!   metadata/<name>_classification.csv
//!   metadata/page_0001_caption.txt
//!   metadata/page_0002_TOC.txt
//!   metadata/footnotes/page_0004_footnotes.json
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::caption::parse_caption;
use crate::error::{Error, Result};
use crate::model::{Document, Footnote, Page};
use crate::store::ClassificationRow;
use crate::text::{CleanupOptions, CleanupPipeline};

/// Directory of per-page OCR text.
pub const TEXT_PAGES_DIR: &str = "text_pages";
/// Directory of classifier output.
pub const METADATA_DIR: &str = "metadata";

static PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page_(\d+)\.txt$").expect("valid regex"));

/// Footnote files hold either a bare list or `{"footnotes": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FootnoteFile {
    List(Vec<Footnote>),
    Wrapped { footnotes: Vec<Footnote> },
}

/// Whether `dir` looks like a document directory.
pub fn is_document_dir(dir: &Path) -> bool {
    dir.join(TEXT_PAGES_DIR).is_dir()
}

/// Document directories under `root`: `root` itself when it is one,
/// otherwise its immediate subdirectories that are, sorted by name.
pub fn discover_documents(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::MissingInput(root.to_path_buf()));
    }
    if is_document_dir(root) {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_document_dir(p))
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Name of a document directory.
pub fn document_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Loads document directories into [`Document`]s.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    cleanup: CleanupPipeline,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(CleanupOptions::standard())
    }
}

impl SourceLoader {
    /// Create a loader applying the given cleanup to page text.
    pub fn new(cleanup: CleanupOptions) -> Self {
        Self {
            cleanup: CleanupPipeline::new(cleanup),
        }
    }

    /// Load one document directory.
    ///
    /// Pages missing from the classification table stay unclassified.
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<Document> {
        let dir = dir.as_ref();
        let text_dir = dir.join(TEXT_PAGES_DIR);
        if !text_dir.is_dir() {
            return Err(Error::MissingInput(text_dir));
        }

        let mut pages = Vec::new();
        for entry in fs::read_dir(&text_dir)? {
            let path = entry?.path();
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let Some(number) = file_name
                .as_deref()
                .and_then(|n| PAGE_FILE.captures(n))
                .and_then(|c| c[1].parse::<u32>().ok())
            else {
                continue;
            };
            let raw = read_text(&path)?;
            pages.push(Page::new(number, self.cleanup.process(&raw)));
        }
        if pages.is_empty() {
            return Err(Error::InvalidInput(format!("{}: no page text files", text_dir.display())));
        }

        let metadata = dir.join(METADATA_DIR);
        let rows = read_classification(&metadata)?;
        let by_page: HashMap<u32, &ClassificationRow> =
            rows.iter().filter_map(|r| r.page().map(|p| (p, r))).collect();

        for page in &mut pages {
            page.footnotes = read_footnotes(&metadata, page.number)?;
            let Some(row) = by_page.get(&page.number) else {
                continue;
            };
            let mut classification = row.to_classification();
            let caption_path = metadata.join(format!("page_{:04}_caption.txt", page.number));
            if caption_path.is_file() {
                let caption = parse_caption(&read_text(&caption_path)?);
                if !caption.is_empty() {
                    classification = classification.with_caption(caption);
                }
            }
            let toc_path = metadata.join(format!("page_{:04}_TOC.txt", page.number));
            if toc_path.is_file() {
                classification = classification.with_toc(read_text(&toc_path)?);
            }
            page.classification = Some(classification);
        }

        let doc = Document::new(document_name(dir), pages)?;
        log::info!(
            "Loaded {} ({} pages, {} classified)",
            doc.name,
            doc.page_count(),
            doc.pages.iter().filter(|p| p.is_classified()).count()
        );
        Ok(doc)
    }
}

/// Read OCR output, replacing byte sequences that are not UTF-8.
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("{} is not valid UTF-8; replacing invalid bytes", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Rows of the first `*_classification.csv` in `metadata`, empty when none.
fn read_classification(metadata: &Path) -> Result<Vec<ClassificationRow>> {
    if !metadata.is_dir() {
        return Ok(Vec::new());
    }
    let mut candidates: Vec<PathBuf> = fs::read_dir(metadata)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().ends_with("_classification.csv"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    let Some(path) = candidates.first() else {
        return Ok(Vec::new());
    };
    if candidates.len() > 1 {
        log::warn!("Several classification tables in {}; using {}", metadata.display(), path.display());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<ClassificationRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

fn read_footnotes(metadata: &Path, page: u32) -> Result<Vec<Footnote>> {
    let path = metadata
        .join("footnotes")
        .join(format!("page_{:04}_footnotes.json", page));
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = read_text(&path)?;
    match serde_json::from_str::<FootnoteFile>(&content) {
        Ok(FootnoteFile::List(notes)) | Ok(FootnoteFile::Wrapped { footnotes: notes }) => Ok(notes),
        Err(e) => {
            log::warn!("Ignoring unreadable footnotes {}: {}", path.display(), e);
            Ok(Vec::new())
        }
    }
}
