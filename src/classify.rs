//! Page classification.
//!
//! Classifiers sit behind [`PageClassifier`] so a remote model and the
//! built-in [`HeuristicClassifier`] are interchangeable. Calls go through
//! [`RetryingClassifier`], which retries transient failures with
//! exponential backoff and turns permanent failures into an `Unknown`
//! page with a note instead of failing the document.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::caption::parse_caption;
use crate::model::{normalize_label, Classification, Page, PageCategory};

/// Why a classification call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Worth retrying (timeouts, rate limits).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying will not help (unreadable page, rejected request).
    #[error("permanent failure: {0}")]
    Permanent(String),
}

/// Something that assigns a category to a page.
pub trait PageClassifier: Send + Sync {
    /// Classifier name, for logs.
    fn name(&self) -> &str;

    /// Classify one page.
    fn classify(&self, page: &Page) -> Result<Classification, ClassifyError>;
}

/// Backoff schedule for classification retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per page, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Multiplier applied after each retry
    pub backoff_factor: f64,

    /// Upper bound on a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the first retry delay.
    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay_ms as f64;
        for _ in 1..retry {
            delay *= self.backoff_factor;
        }
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }
}

/// Classifier wrapper applying a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingClassifier {
    inner: Arc<dyn PageClassifier>,
    policy: RetryPolicy,
}

impl RetryingClassifier {
    /// Wrap a classifier.
    pub fn new(inner: Arc<dyn PageClassifier>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Classify one page. Never fails.
    pub fn classify(&self, page: &Page) -> Classification {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            match self.inner.classify(page) {
                Ok(c) => return c,
                Err(ClassifyError::Permanent(reason)) => {
                    last = reason;
                    break;
                }
                Err(ClassifyError::Transient(reason)) => {
                    log::debug!(
                        "{}: page {} attempt {}/{} failed: {}",
                        self.inner.name(),
                        page.number,
                        attempt,
                        attempts,
                        reason
                    );
                    last = reason;
                    if attempt < attempts {
                        thread::sleep(self.policy.delay(attempt));
                    }
                }
            }
        }
        log::warn!(
            "{}: page {} left unclassified: {}",
            self.inner.name(),
            page.number,
            last
        );
        Classification::new(PageCategory::Unknown).with_notes(format!("classification failed: {}", last))
    }

    /// Classify every page that has no classification yet.
    ///
    /// Returns the number of pages classified.
    pub fn classify_missing(&self, pages: &mut [Page], parallel: bool) -> usize {
        let classify = |page: &mut Page| {
            if page.is_classified() {
                return 0;
            }
            page.classification = Some(self.classify(page));
            1
        };
        if parallel {
            pages.par_iter_mut().map(classify).sum()
        } else {
            pages.iter_mut().map(classify).sum()
        }
    }
}

static EXHIBIT_COVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*EXHIBIT\s+([A-Z]{1,3}|\d{1,3}(?:-[A-Z0-9]+)?)\s*$").expect("valid regex")
});

/// Longest page still treated as a bare exhibit cover.
const COVER_MAX_CHARS: usize = 80;

/// Classifier driven by page text alone.
///
/// Used when no classification table was delivered with a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Create a classifier.
    pub fn new() -> Self {
        Self
    }
}

impl PageClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn classify(&self, page: &Page) -> Result<Classification, ClassifyError> {
        let text = page.text.trim();
        let head: String = text.chars().take(400).collect::<String>().to_uppercase();

        if text.chars().count() <= COVER_MAX_CHARS {
            if let Some(caps) = EXHIBIT_COVER.captures(text) {
                let label = normalize_label(&format!("Exhibit {}", &caps[1]));
                return Ok(Classification::new(PageCategory::ExhibitCover).with_exhibit(label, None));
            }
        }
        if head.contains("TABLE OF CONTENTS") {
            return Ok(Classification::new(PageCategory::TableOfContents).with_toc(text));
        }
        if head.contains("TABLE OF AUTHORITIES") {
            return Ok(Classification::new(PageCategory::TableOfAuthorities));
        }
        if head.contains("PROOF OF SERVICE") || head.contains("CERTIFICATE OF SERVICE") {
            return Ok(Classification::new(PageCategory::ProofOfService));
        }
        if page.number == 1 && (head.contains("ATTORNEYS FOR") || head.contains("CASE NO")) {
            let caption = parse_caption(text);
            let mut c = Classification::new(PageCategory::Caption);
            if !caption.is_empty() {
                c = c.with_caption(caption);
            }
            return Ok(c);
        }
        if text.is_empty() {
            return Ok(Classification::new(PageCategory::Unknown).with_notes("blank page"));
        }
        Ok(Classification::new(PageCategory::PleadingBody))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        permanent: bool,
    }

    impl PageClassifier for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn classify(&self, _page: &Page) -> Result<Classification, ClassifyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.permanent {
                return Err(ClassifyError::Permanent("unreadable".into()));
            }
            if n <= self.fail_first {
                Err(ClassifyError::Transient("timeout".into()))
            } else {
                Ok(Classification::new(PageCategory::PleadingBody))
            }
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(0)
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 2,
            permanent: false,
        });
        let c = RetryingClassifier::new(flaky.clone(), fast()).classify(&Page::new(1, "x"));
        assert_eq!(c.category, PageCategory::PleadingBody);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_failure_marks_unknown_without_retry() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 0,
            permanent: true,
        });
        let c = RetryingClassifier::new(flaky.clone(), fast()).classify(&Page::new(4, "x"));
        assert_eq!(c.category, PageCategory::Unknown);
        assert!(c.notes.unwrap().contains("unreadable"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhausted_retries_mark_unknown() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 10,
            permanent: false,
        });
        let c = RetryingClassifier::new(flaky.clone(), fast().with_max_attempts(2)).classify(&Page::new(1, "x"));
        assert_eq!(c.category, PageCategory::Unknown);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_heuristics() {
        let h = HeuristicClassifier::new();
        let cover = h.classify(&Page::new(5, "  EXHIBIT b \n")).unwrap();
        assert_eq!(cover.category, PageCategory::ExhibitCover);
        assert_eq!(cover.exhibit_label.as_deref(), Some("Exhibit B"));

        let toc = h.classify(&Page::new(2, "TABLE OF CONTENTS\nI. INTRODUCTION ..... 1")).unwrap();
        assert_eq!(toc.category, PageCategory::TableOfContents);
        assert!(toc.toc.is_some());

        let caption = h
            .classify(&Page::new(1, "Attorneys for Defendant ACME INC.\nCase No. 21-CV-0001"))
            .unwrap();
        assert_eq!(caption.category, PageCategory::Caption);
        assert_eq!(
            caption.caption.and_then(|c| c.case_number).as_deref(),
            Some("21-CV-0001")
        );

        let body = h.classify(&Page::new(3, "The court should deny the motion.")).unwrap();
        assert_eq!(body.category, PageCategory::PleadingBody);
    }

    #[test]
    fn test_classify_missing_keeps_existing() {
        let classifier = RetryingClassifier::new(Arc::new(HeuristicClassifier), RetryPolicy::none());
        let mut pages = vec![
            Page::classified(1, PageCategory::Caption, "x"),
            Page::new(2, "Body text."),
        ];
        assert_eq!(classifier.classify_missing(&mut pages, true), 1);
        assert_eq!(pages[0].category(), PageCategory::Caption);
        assert_eq!(pages[1].category(), PageCategory::PleadingBody);
    }
}
