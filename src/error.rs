//! Error types for filingchunk.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::identity::DocumentId;
use crate::pipeline::Stage;

/// Result type alias for filingchunk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while preparing a filing.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV (de)serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Input files are missing or inconsistent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required file or directory does not exist.
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// The TOC payload could not be turned into an outline.
    #[error("TOC parsing error: {0}")]
    TocParse(String),

    /// Too few TOC entries found a heading in the body text.
    #[error("TOC alignment failed: {matched} of {total} entries matched")]
    AlignmentFailed {
        /// Entries that matched a heading candidate
        matched: usize,
        /// Total TOC entries
        total: usize,
    },

    /// Another sync run holds the document's lock.
    #[error("Document {0} is locked by another sync run")]
    Locked(DocumentId),

    /// A tabular row carries a value that cannot be applied.
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField {
        /// Field name
        field: String,
        /// Failure description
        reason: String,
    },

    /// The run was cancelled between stages.
    #[error("Cancelled before stage {stage}")]
    Cancelled {
        /// Stage that did not start
        stage: Stage,
    },

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the pipeline recovers from this error locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AlignmentFailed { .. })
    }
}

/// A per-document failure, with enough detail to rerun just that document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentFailure {
    /// Document identifier, if one was issued
    pub document_id: Option<DocumentId>,

    /// Document name (input folder name)
    pub name: String,

    /// Stage that failed
    pub stage: Stage,

    /// Failure description
    pub reason: String,
}

impl DocumentFailure {
    /// Create a failure record from an error.
    pub fn new(
        document_id: Option<DocumentId>,
        name: impl Into<String>,
        stage: Stage,
        err: &Error,
    ) -> Self {
        Self {
            document_id,
            name: name.into(),
            stage,
            reason: err.to_string(),
        }
    }
}

impl std::fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.document_id {
            Some(id) => write!(f, "[{}] {} at {}: {}", id, self.name, self.stage, self.reason),
            None => write!(f, "{} at {}: {}", self.name, self.stage, self.reason),
        }
    }
}
