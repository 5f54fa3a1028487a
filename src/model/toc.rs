//! Table-of-contents outline types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::match_key;

/// One entry of a parsed table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Position in reading order (0-based, reassigned by [`TocForest::new`])
    pub order: usize,

    /// Numbering label ("II.", "A.", "1."), if any
    pub label: Option<String>,

    /// Heading text without the label
    pub title: String,

    /// Full heading as printed ("II. ARGUMENT")
    pub heading: String,

    /// Hierarchy depth (1 = top level)
    pub depth: u8,

    /// Page number printed in the TOC, if any
    pub page_hint: Option<u32>,
}

impl TocEntry {
    /// Create an entry from a full heading line.
    pub fn new(heading: impl Into<String>, depth: u8) -> Self {
        let heading = heading.into();
        let (label, title) = crate::text::split_label(&heading);
        Self {
            order: 0,
            label,
            title,
            heading,
            depth,
            page_hint: None,
        }
    }

    /// Set the printed page number.
    pub fn with_page_hint(mut self, page: u32) -> Self {
        self.page_hint = Some(page);
        self
    }
}

/// A validated TOC outline.
///
/// Depth starts at 1 and increases by at most one level per entry. Siblings
/// never share the same normalized heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocForest {
    entries: Vec<TocEntry>,
    parents: Vec<Option<usize>>,
}

impl TocForest {
    /// Build a forest from entries in reading order.
    ///
    /// Over-deep entries are clamped to one level below their predecessor.
    /// A sibling duplicate is dropped and its descendants are attached to
    /// the earlier entry with the same heading.
    pub fn new(entries: Vec<TocEntry>) -> Self {
        let mut kept: Vec<TocEntry> = Vec::with_capacity(entries.len());
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(entries.len());
        // stack[k] is the index of the open entry at depth k+1
        let mut stack: Vec<usize> = Vec::new();

        for mut entry in entries {
            let requested = entry.depth.max(1) as usize;
            let depth = requested.min(stack.len() + 1);
            if depth != requested {
                log::debug!(
                    "TOC entry '{}' clamped from depth {} to {}",
                    entry.heading,
                    requested,
                    depth
                );
            }

            stack.truncate(depth - 1);
            let parent = stack.last().copied();
            let key = match_key(&entry.heading);

            let duplicate = (0..kept.len())
                .find(|&j| parents[j] == parent && match_key(&kept[j].heading) == key);
            if let Some(existing) = duplicate {
                log::debug!("Dropping duplicate TOC entry '{}'", entry.heading);
                stack.push(existing);
                continue;
            }

            entry.depth = depth as u8;
            entry.order = kept.len();
            stack.push(kept.len());
            parents.push(parent);
            kept.push(entry);
        }

        Self {
            entries: kept,
            parents,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the forest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in reading order.
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Get an entry by index.
    pub fn get(&self, idx: usize) -> Option<&TocEntry> {
        self.entries.get(idx)
    }

    /// Parent of an entry.
    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parents.get(idx).copied().flatten()
    }

    /// Ancestors of an entry, nearest first.
    pub fn ancestors(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = self.parent(idx);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Direct children of an entry, in reading order.
    pub fn children(&self, idx: usize) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|&j| self.parents[j] == Some(idx))
            .collect()
    }

    /// Top-level entries.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|&j| self.parents[j].is_none())
            .collect()
    }

    /// Headings from the root down to the entry.
    pub fn path(&self, idx: usize) -> SectionPath {
        if idx >= self.entries.len() {
            return SectionPath::default();
        }
        let mut chain = self.ancestors(idx);
        chain.reverse();
        chain.push(idx);
        SectionPath(
            chain
                .into_iter()
                .map(|i| self.entries[i].heading.clone())
                .collect(),
        )
    }
}

/// Headings governing a span of text, root to leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionPath(pub Vec<String>);

impl SectionPath {
    /// Separator used in flattened (CSV) form.
    pub const SEPARATOR: &'static str = " / ";

    /// Path with a single element.
    pub fn single(heading: impl Into<String>) -> Self {
        Self(vec![heading.into()])
    }

    /// Parse the flattened form. Empty input gives `None`.
    pub fn parse(flat: &str) -> Option<Self> {
        let parts: Vec<String> = flat
            .split(Self::SEPARATOR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }

    /// Innermost heading.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no headings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(Self::SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(heading: &str, depth: u8) -> TocEntry {
        TocEntry::new(heading, depth)
    }

    #[test]
    fn test_forest_parents_and_paths() {
        let forest = TocForest::new(vec![
            entry("I. INTRODUCTION", 1),
            entry("II. ARGUMENT", 1),
            entry("A. Liability Standards", 2),
            entry("1. Duty", 3),
            entry("B. Damages", 2),
            entry("III. CONCLUSION", 1),
        ]);
        assert_eq!(forest.len(), 6);
        assert_eq!(forest.roots(), vec![0, 1, 5]);
        assert_eq!(forest.children(1), vec![2, 4]);
        assert_eq!(forest.parent(3), Some(2));
        assert_eq!(forest.ancestors(3), vec![2, 1]);
        assert_eq!(
            forest.path(3).to_string(),
            "II. ARGUMENT / A. Liability Standards / 1. Duty"
        );
        assert_eq!(forest.path(4).0, vec!["II. ARGUMENT", "B. Damages"]);
    }

    #[test]
    fn test_forest_clamps_depth_jumps() {
        let forest = TocForest::new(vec![entry("A. Facts", 3), entry("1. Timeline", 4)]);
        assert_eq!(forest.get(0).unwrap().depth, 1);
        assert_eq!(forest.get(1).unwrap().depth, 2);
        assert_eq!(forest.parent(1), Some(0));
    }

    #[test]
    fn test_forest_drops_sibling_duplicates() {
        let forest = TocForest::new(vec![
            entry("I. ARGUMENT", 1),
            entry("A. Standing", 2),
            entry("A. STANDING", 2),
            entry("1. Injury", 3),
            entry("II. CONCLUSION", 1),
            entry("A. Standing", 2),
        ]);
        // second "A. STANDING" dropped, its child attached to the first
        assert_eq!(forest.len(), 5);
        assert_eq!(forest.parent(2), Some(1));
        assert_eq!(forest.get(2).unwrap().heading, "1. Injury");
        // same heading under a different parent is kept
        assert_eq!(forest.parent(4), Some(3));
        assert_eq!(forest.get(4).unwrap().order, 4);
    }

    #[test]
    fn test_entry_label_split() {
        let e = TocEntry::new("II. ARGUMENT", 1).with_page_hint(4);
        assert_eq!(e.label.as_deref(), Some("II."));
        assert_eq!(e.title, "ARGUMENT");
        assert_eq!(e.page_hint, Some(4));
    }

    #[test]
    fn test_section_path_flat_form() {
        let path = SectionPath(vec!["II. ARGUMENT".into(), "A. Duty".into()]);
        assert_eq!(SectionPath::parse(&path.to_string()), Some(path.clone()));
        assert_eq!(SectionPath::parse("  "), None);
        assert_eq!(path.leaf(), Some("A. Duty"));
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["II. ARGUMENT","A. Duty"]"#);
    }
}
