//! Alignment options and configuration.

use serde::{Deserialize, Serialize};

/// Options for aligning a TOC outline to body headings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    /// Minimum similarity (0.0..=1.0) for an entry/candidate pair to match
    pub min_similarity: f64,

    /// Minimum share of entries that must match, below which alignment fails
    pub min_match_fraction: f64,

    /// Maximum length (chars) of a heading-like line
    pub max_heading_len: usize,
}

impl AlignOptions {
    /// Create new align options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the similarity threshold.
    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        self.min_similarity = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum share of matched entries.
    pub fn with_min_match_fraction(mut self, fraction: f64) -> Self {
        self.min_match_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Set the maximum heading length.
    pub fn with_max_heading_len(mut self, len: usize) -> Self {
        self.max_heading_len = len;
        self
    }

    /// Similarity threshold on the integer 0..=1000 score scale.
    pub(crate) fn threshold_millis(&self) -> u32 {
        (self.min_similarity * 1000.0).round() as u32
    }
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.70,
            min_match_fraction: 0.25,
            max_heading_len: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let opts = AlignOptions::new();
        assert_eq!(opts.threshold_millis(), 700);
        assert_eq!(opts.max_heading_len, 200);

        let opts = AlignOptions::new().with_min_similarity(1.5).with_min_match_fraction(0.5);
        assert_eq!(opts.min_similarity, 1.0);
        assert_eq!(opts.min_match_fraction, 0.5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: AlignOptions = serde_json::from_str(r#"{"min_similarity":0.8}"#).unwrap();
        assert_eq!(opts.min_similarity, 0.8);
        assert_eq!(opts.min_match_fraction, 0.25);
    }
}
