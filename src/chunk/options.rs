//! Chunking options and configuration.

use serde::{Deserialize, Serialize};

/// Options for chunking a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Token budget per chunk (soft ceiling: atomic spans may exceed it)
    pub max_tokens: usize,

    /// Minimum tokens before the fallback chunker closes a chunk at a page end
    pub min_tokens: usize,

    /// Characters per token for the approximate counter
    pub chars_per_token: f64,

    /// Leave proof-of-service pages out of the chunk output
    pub exclude_proof_of_service: bool,
}

impl ChunkOptions {
    /// Create new chunk options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token budget.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Set the minimum chunk size for page-end closing.
    pub fn with_min_tokens(mut self, min_tokens: usize) -> Self {
        self.min_tokens = min_tokens;
        self
    }

    /// Set the characters-per-token ratio.
    pub fn with_chars_per_token(mut self, ratio: f64) -> Self {
        if ratio > 0.0 {
            self.chars_per_token = ratio;
        }
        self
    }

    /// Include or exclude proof-of-service pages.
    pub fn with_exclude_proof_of_service(mut self, exclude: bool) -> Self {
        self.exclude_proof_of_service = exclude;
        self
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_tokens: 700,
            min_tokens: 100,
            chars_per_token: 4.0,
            exclude_proof_of_service: true,
        }
    }
}
