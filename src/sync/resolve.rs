//! Three-way resolution of one field.

use serde::{Deserialize, Serialize};

/// The three versions of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldVersions<'a> {
    /// Value at the last sync, `None` when the row was never synced
    pub base: Option<&'a str>,
    /// Value in the canonical store
    pub canonical: &'a str,
    /// Value in the tabular mirror
    pub edited: &'a str,
}

/// Outcome of resolving a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    /// Nothing changed
    Unchanged,
    /// Only the mirror changed: the edit goes to the canonical store
    EditWins(String),
    /// Only the canonical store changed: the mirror is refreshed
    CanonicalWins(String),
    /// Both changed to the same value
    Converged(String),
    /// Both changed to different values
    Conflict,
}

fn same(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

impl FieldVersions<'_> {
    /// Resolve the field.
    ///
    /// A row without a base counts as a conflict when the two sides differ,
    /// since neither side is known to be the older one.
    pub fn resolve(&self) -> Resolution {
        let FieldVersions {
            base,
            canonical,
            edited,
        } = *self;

        if same(canonical, edited) {
            return match base {
                Some(b) if same(b, canonical) => Resolution::Unchanged,
                _ => Resolution::Converged(canonical.trim().to_string()),
            };
        }
        match base {
            Some(b) if same(b, canonical) => Resolution::EditWins(edited.trim().to_string()),
            Some(b) if same(b, edited) => Resolution::CanonicalWins(canonical.trim().to_string()),
            _ => Resolution::Conflict,
        }
    }
}
