//! Order-preserving alignment of TOC entries to heading candidates.
//!
//! Both sequences are in reading order, so the matching is computed as a
//! weighted longest-common-subsequence: the set of (entry, candidate) pairs,
//! strictly increasing in both sequences, that maximizes the summed
//! similarity of pairs above the threshold.

use serde::{Deserialize, Serialize};

use super::{AlignOptions, BodyPosition, HeadingCandidate};
use crate::error::{Error, Result};
use crate::model::{TocEntry, TocForest};
use crate::text::{body_key, match_key, split_label};

/// Number of leading entry tokens used for the containment probe.
const PROBE_TOKENS: usize = 6;

/// Score awarded when the entry's leading tokens appear in the candidate.
const PROBE_SCORE: u32 = 700;

/// Score factor when both sides carry a label and the labels differ.
const LABEL_MISMATCH_FACTOR: f64 = 0.85;

/// A matched TOC entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocMatch {
    /// Index into the candidate list
    pub candidate: usize,
    /// Position of the matched heading line
    pub position: BodyPosition,
    /// Similarity (0.0..=1.0)
    pub score: f64,
}

/// Result of aligning an outline to the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// One slot per TOC entry, `None` when the entry is unmatched
    pub matches: Vec<Option<TocMatch>>,
}

impl Alignment {
    /// Number of matched entries.
    pub fn matched_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_some()).count()
    }

    /// Share of matched entries.
    pub fn match_ratio(&self) -> f64 {
        if self.matches.is_empty() {
            0.0
        } else {
            self.matched_count() as f64 / self.matches.len() as f64
        }
    }

    /// Hierarchy markers for matched entries, in body order.
    pub fn markers(&self, forest: &TocForest) -> Vec<HierarchyMarker> {
        self.matches
            .iter()
            .enumerate()
            .filter_map(|(entry, m)| {
                let m = m.as_ref()?;
                Some(HierarchyMarker {
                    position: m.position,
                    entry,
                    depth: forest.get(entry)?.depth,
                })
            })
            .collect()
    }
}

/// A structural delimiter injected into the body stream at a matched heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyMarker {
    /// Start of the heading line
    pub position: BodyPosition,
    /// Index of the TOC entry
    pub entry: usize,
    /// Depth of the entry
    pub depth: u8,
}

/// Comparison keys of one side of a pair.
struct Keys {
    body: String,
    label: Option<String>,
}

impl Keys {
    fn of(text: &str) -> Self {
        let body = body_key(text);
        Self {
            // a bare label ("IV.") compares on the full heading
            body: if body.is_empty() { match_key(text) } else { body },
            label: split_label(text).0,
        }
    }
}

/// Similarity of an entry to one rendering of a candidate, on a 0..=1000 scale.
fn score_keys(entry: &Keys, cand: &Keys) -> u32 {
    let ratio = strsim::normalized_levenshtein(&entry.body, &cand.body);
    let labels_differ = match (&entry.label, &cand.label) {
        (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
        _ => false,
    };
    let mut score = match (&entry.label, &cand.label) {
        (Some(_), Some(_)) if !labels_differ => 0.72 * ratio + 0.28,
        _ => ratio,
    };

    let tokens: Vec<&str> = entry.body.split_whitespace().take(PROBE_TOKENS).collect();
    if !tokens.is_empty() {
        let probe = tokens.join(" ");
        if format!(" {} ", cand.body).contains(&format!(" {} ", probe)) {
            score = score.max(PROBE_SCORE as f64 / 1000.0);
        }
    }
    if labels_differ {
        score *= LABEL_MISMATCH_FACTOR;
    }

    (score.clamp(0.0, 1.0) * 1000.0).round() as u32
}

/// Similarity of an entry to a candidate, best of the one- and two-line renderings.
pub fn score(entry: &TocEntry, candidate: &HeadingCandidate) -> u32 {
    let entry_keys = Keys::of(&entry.heading);
    let one_line = Keys {
        body: if candidate.body_norm.is_empty() {
            match_key(&candidate.text)
        } else {
            candidate.body_norm.clone()
        },
        label: candidate.label.clone(),
    };
    let mut best = score_keys(&entry_keys, &one_line);
    if let Some(extended) = &candidate.extended {
        best = best.max(score_keys(&entry_keys, &Keys::of(extended)));
    }
    best
}

/// Align an outline to heading candidates.
///
/// Returns [`Error::AlignmentFailed`] when no entry, or fewer than
/// `min_match_fraction` of the entries, found a match.
pub fn align(
    forest: &TocForest,
    candidates: &[HeadingCandidate],
    options: &AlignOptions,
) -> Result<Alignment> {
    let entries = forest.entries();
    let n = entries.len();
    let m = candidates.len();
    let threshold = options.threshold_millis();

    let scores: Vec<Vec<u32>> = entries
        .iter()
        .map(|e| candidates.iter().map(|c| score(e, c)).collect())
        .collect();

    // best[i][j]: best total over entries i.. and candidates j..
    let mut best = vec![vec![0u64; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            let mut v = best[i + 1][j].max(best[i][j + 1]);
            let s = scores[i][j];
            if s >= threshold {
                v = v.max(s as u64 + best[i + 1][j + 1]);
            }
            best[i][j] = v;
        }
    }

    // forward walk: take the earliest optimal candidate for each entry
    let mut matches: Vec<Option<TocMatch>> = vec![None; n];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        let s = scores[i][j];
        if s >= threshold && best[i][j] == s as u64 + best[i + 1][j + 1] {
            log::debug!(
                "TOC entry '{}' matched '{}' on page {} ({})",
                entries[i].heading,
                candidates[j].text,
                candidates[j].position.page,
                s
            );
            matches[i] = Some(TocMatch {
                candidate: j,
                position: candidates[j].position,
                score: s as f64 / 1000.0,
            });
            i += 1;
            j += 1;
        } else if best[i][j] == best[i][j + 1] {
            j += 1;
        } else {
            i += 1;
        }
    }

    let alignment = Alignment { matches };
    let matched = alignment.matched_count();
    if matched == 0 || alignment.match_ratio() < options.min_match_fraction {
        return Err(Error::AlignmentFailed { matched, total: n });
    }

    log::info!("Aligned {} of {} TOC entries", matched, n);
    Ok(alignment)
}
