//! Synchronizer options.

use serde::{Deserialize, Serialize};

/// Options for metadata synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Delete canonical rows that were removed from the tabular file
    pub confirm_deletions: bool,

    /// Report what would change without writing anything
    pub dry_run: bool,
}

impl SyncOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply row deletions.
    pub fn with_confirm_deletions(mut self, confirm: bool) -> Self {
        self.confirm_deletions = confirm;
        self
    }

    /// Only report.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
