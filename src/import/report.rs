//! Per-item outcomes and the structured batch report.
//!
//! Every processed item lands in the report exactly once; a final count of
//! succeeded/cancelled/failed items is always available, even after partial
//! failure. Messages are ordered and human-readable for display layers.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Copied,
    Moved,
    Deleted,
    /// Destination conflicted and the item was applied under a new name.
    Renamed,
    /// Cancelled because content comparison confirmed a duplicate.
    CancelledDuplicate,
    /// Cancelled at planning time (no destination) or by a skip policy.
    CancelledFiltered,
    /// Left untouched with a diagnostic (delete-if-duplicate refusals).
    Skipped,
    Failed,
}

impl ItemStatus {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ItemStatus::Copied | ItemStatus::Moved | ItemStatus::Deleted | ItemStatus::Renamed
        )
    }

    pub fn is_cancelled(self) -> bool {
        matches!(
            self,
            ItemStatus::CancelledDuplicate | ItemStatus::CancelledFiltered | ItemStatus::Skipped
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Copied => "copied",
            ItemStatus::Moved => "moved",
            ItemStatus::Deleted => "deleted",
            ItemStatus::Renamed => "renamed",
            ItemStatus::CancelledDuplicate => "cancelled (duplicate)",
            ItemStatus::CancelledFiltered => "cancelled (by filter)",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub status: ItemStatus,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub message: String,
}

impl ItemOutcome {
    pub fn new(
        status: ItemStatus,
        source: PathBuf,
        destination: Option<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            source,
            destination,
            message: message.into(),
        }
    }

    pub fn failed(source: PathBuf, error: &anyhow::Error) -> Self {
        Self {
            status: ItemStatus::Failed,
            source,
            destination: None,
            message: format!("{error:#}"),
        }
    }
}

/// Structured result of one importer run: success flag plus ordered
/// human-readable messages.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    outcomes: Vec<ItemOutcome>,
}

impl ImportReport {
    pub fn push(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_cancelled()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Failed)
            .count()
    }

    /// True when no item errored. Cancelled items do not count against
    /// success; they are policy, not failure.
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// One line per processed item, in processing order.
    pub fn messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|o| {
                let mut line = format!("{}: {}", o.status, o.source.display());
                if let Some(dest) = &o.destination {
                    line.push_str(&format!(" -> {}", dest.display()));
                }
                if !o.message.is_empty() {
                    line.push_str(&format!(" ({})", o.message));
                }
                line
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} cancelled, {} failed",
            self.succeeded(),
            self.cancelled(),
            self.failed()
        )
    }
}
