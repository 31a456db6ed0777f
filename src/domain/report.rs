//! Run reports
//!
//! Every sync run produces one `SyncReport` enumerating the per-target
//! outcome: how many records landed in the dataset, which sections were
//! missing, how many pages or periods failed. The orchestration layer maps
//! this onto the process exit status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason")]
pub enum TargetOutcome {
    /// Every section found, every page fetched, every outstanding period
    /// synced.
    Completed,
    /// The target produced data, but with recoverable omissions (missing
    /// sections, failed pages, or an interrupted period drain).
    CompletedWithGaps,
    /// The target contributed nothing this run.
    Failed(String),
}

impl TargetOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one scrape target within a run.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub outcome: TargetOutcome,
    pub records_written: usize,
    pub sections_missing: Vec<String>,
    pub pages_failed: usize,
    pub periods_synced: usize,
    pub periods_failed: usize,
    pub periods_remaining: usize,
}

impl TargetReport {
    pub fn failed(target: &str, reason: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            outcome: TargetOutcome::Failed(reason.into()),
            records_written: 0,
            sections_missing: Vec::new(),
            pages_failed: 0,
            periods_synced: 0,
            periods_failed: 0,
            periods_remaining: 0,
        }
    }

    pub fn has_gaps(&self) -> bool {
        !self.sections_missing.is_empty()
            || self.pages_failed > 0
            || self.periods_failed > 0
            || self.periods_remaining > 0
    }
}

/// Aggregate result of one `run`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
}

impl SyncReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, targets: Vec<TargetReport>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            targets,
        }
    }

    pub fn total_records(&self) -> usize {
        self.targets.iter().map(|t| t.records_written).sum()
    }

    pub fn failed_targets(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_failed()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_targets() > 0
    }
}
