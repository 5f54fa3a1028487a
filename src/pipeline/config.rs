//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::chunk::ChunkOptions;
use crate::classify::RetryPolicy;
use crate::error::Result;
use crate::sync::SyncOptions;
use crate::toc::AlignOptions;

/// Options for a whole pipeline run, loadable from a JSON file.
///
/// Missing keys take their defaults:
///
/// ```json
/// { "chunk": { "max_tokens": 500 }, "parallel": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// TOC alignment
    pub align: AlignOptions,

    /// Chunking
    pub chunk: ChunkOptions,

    /// Mirror synchronization
    pub sync: SyncOptions,

    /// Process documents in parallel
    pub parallel: bool,

    /// Classification retries
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            align: AlignOptions::default(),
            chunk: ChunkOptions::default(),
            sync: SyncOptions::default(),
            parallel: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Set alignment options.
    pub fn with_align(mut self, align: AlignOptions) -> Self {
        self.align = align;
        self
    }

    /// Set chunking options.
    pub fn with_chunk(mut self, chunk: ChunkOptions) -> Self {
        self.chunk = chunk;
        self
    }

    /// Set sync options.
    pub fn with_sync(mut self, sync: SyncOptions) -> Self {
        self.sync = sync;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the classification retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"chunk": {"max_tokens": 500}, "parallel": false}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.chunk.max_tokens, 500);
        assert_eq!(config.chunk.min_tokens, ChunkOptions::default().min_tokens);
        assert!(!config.parallel);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::new()
            .sequential()
            .with_sync(SyncOptions::new().with_dry_run(true));
        assert!(!config.parallel);
        assert!(config.sync.dry_run);
    }
}
