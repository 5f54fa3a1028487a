//! Token counting.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

/// Character-ratio estimate: `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTokenCounter {
    chars_per_token: f64,
}

impl ApproxTokenCounter {
    /// Create a counter with the given characters-per-token ratio.
    pub fn new(chars_per_token: f64) -> Self {
        Self {
            chars_per_token: if chars_per_token > 0.0 { chars_per_token } else { 4.0 },
        }
    }
}

impl Default for ApproxTokenCounter {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        let chars = if text.is_ascii() {
            text.len()
        } else {
            text.chars().count()
        };
        (chars as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Whitespace-separated word count, for tests and callers that budget in words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
