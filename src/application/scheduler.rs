//! Watermark-driven weekly sync scheduler
//!
//! The weekly review target does not snapshot: it drains. The scheduler
//! reads the newest recorded period (the watermark), computes every
//! seven-day bucket between it and the current remote week, and fetches
//! them strictly in order. A bucket is recorded only on confirmed
//! structural success; the first failure stops the drain so that no later
//! bucket is ever recorded ahead of an earlier gap.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::domain::{
    outstanding_buckets, remote_now, RawRecord, SectionSpec, TargetSpec, WeekBucket,
};
use crate::infrastructure::config::{SiteConfig, SyncConfig};
use crate::infrastructure::normalizer::{sanitize_sheet_name, MAX_SHEET_NAME_LEN};
use crate::infrastructure::{
    backoffice, DatasetStore, ExtractionOutcome, PageFetcher, SheetVariant, SheetWrite,
    StoreError, TableExtractor,
};

/// Phases of one scheduler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    ComputingDelta,
    Draining,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ComputingDelta => "computing_delta",
            Self::Draining => "draining",
        };
        write!(f, "{}", name)
    }
}

/// What one drain pass accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub periods_synced: usize,
    pub periods_failed: usize,
    pub periods_remaining: usize,
    pub records_written: usize,
    /// Reason of the bucket failure that stopped the drain, if any.
    pub failure: Option<String>,
}

impl DrainSummary {
    pub fn is_clean(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of one bucket cycle.
enum BucketSync {
    /// Structural success, period recorded with this many records.
    Recorded(usize),
    /// The registry already held the period; treated as synced.
    AlreadyRecorded,
    /// Fetch or structural failure. The drain must stop here.
    Failed(String),
}

/// Drives the incremental sync of the one bucketed target.
///
/// Each `drain` call is a full pass: resolve the watermark, compute the
/// outstanding buckets, then fetch and record them oldest first. Buckets
/// past the first failure stay outstanding for the next run.
pub struct WatermarkScheduler<'a> {
    store: &'a DatasetStore,
    fetcher: &'a dyn PageFetcher,
    extractor: &'a TableExtractor,
    site: &'a SiteConfig,
    sync: &'a SyncConfig,
    state: SchedulerState,
}

impl<'a> WatermarkScheduler<'a> {
    pub fn new(
        store: &'a DatasetStore,
        fetcher: &'a dyn PageFetcher,
        extractor: &'a TableExtractor,
        site: &'a SiteConfig,
        sync: &'a SyncConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            site,
            sync,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Sync every outstanding period of `target`, oldest first.
    pub async fn drain(&mut self, target: &TargetSpec) -> Result<DrainSummary, StoreError> {
        let Some(section) = target.sections.first() else {
            return Ok(DrainSummary::default());
        };

        self.transition(SchedulerState::ComputingDelta);
        let watermark = self.resolve_watermark(target.name).await?;
        let buckets = outstanding_buckets(watermark, remote_now(), self.sync.backfill_weeks);
        info!(
            target = target.name,
            watermark = ?watermark,
            outstanding = buckets.len(),
            "Computed outstanding periods"
        );

        let mut summary = DrainSummary::default();
        if buckets.is_empty() {
            self.transition(SchedulerState::Idle);
            return Ok(summary);
        }

        self.transition(SchedulerState::Draining);
        for (index, bucket) in buckets.iter().enumerate() {
            match self.sync_bucket(target.name, section, bucket).await? {
                BucketSync::Recorded(records) => {
                    summary.periods_synced += 1;
                    summary.records_written += records;
                }
                BucketSync::AlreadyRecorded => summary.periods_synced += 1,
                BucketSync::Failed(reason) => {
                    warn!(
                        target = target.name,
                        bucket = %bucket.label(),
                        reason = %reason,
                        "Stopping drain at failed period"
                    );
                    summary.periods_failed = 1;
                    summary.periods_remaining = buckets.len() - index - 1;
                    summary.failure = Some(reason);
                    break;
                }
            }
        }

        self.transition(SchedulerState::Idle);
        Ok(summary)
    }

    /// Newest recorded period start, or `None` for a full backfill.
    ///
    /// The period registry is authoritative. When it is empty (a dataset
    /// imported from before the registry existed) the last row of the
    /// configured consolidated sheet supplies the watermark instead.
    async fn resolve_watermark(&self, target: &str) -> Result<Option<NaiveDate>, StoreError> {
        if let Some(latest) = self.store.latest_period_start(target).await? {
            debug!(target = target, watermark = %latest, "Watermark from period registry");
            return Ok(Some(latest));
        }

        let fallback = &self.sync.watermark_fallback_sheet;
        let Some(label) = self
            .store
            .last_label_in_sheet(SheetVariant::Filtered, fallback)
            .await?
        else {
            info!(
                target = target,
                "Empty dataset, backfilling {} weeks",
                self.sync.backfill_weeks
            );
            return Ok(None);
        };

        match WeekBucket::parse_label(&label) {
            Some(bucket) => {
                debug!(
                    target = target,
                    sheet = %fallback,
                    watermark = %bucket.start,
                    "Watermark from fallback sheet"
                );
                Ok(Some(bucket.start))
            }
            None if self.sync.full_resync_on_unparsable => {
                warn!(
                    target = target,
                    label = %label,
                    "Unparsable fallback watermark, re-running full backfill"
                );
                Ok(None)
            }
            None => Err(StoreError::WatermarkUnparsable { label }),
        }
    }

    /// Fetch, extract, and record one bucket.
    ///
    /// Fetch and structural failures come back as `BucketSync::Failed`;
    /// only genuine database errors propagate as `Err`.
    async fn sync_bucket(
        &self,
        target: &str,
        section: &SectionSpec,
        bucket: &WeekBucket,
    ) -> Result<BucketSync, StoreError> {
        let url = backoffice::review_url(&self.site.base_url, bucket.start, bucket.end());
        let body = match self.fetcher.fetch_page(&url).await {
            Ok(body) => body,
            Err(e) => return Ok(BucketSync::Failed(e.to_string())),
        };

        let document = Html::parse_document(&body);
        let (writes, records) = match self.extractor.extract_section(&document, section) {
            ExtractionOutcome::Rows(rows) => {
                let records = rows.len();
                (bucket_writes(section, bucket, &rows), records)
            }
            ExtractionOutcome::Empty => {
                info!(
                    target = target,
                    bucket = %bucket.label(),
                    "Period has no activity, recording as synced"
                );
                (Vec::new(), 0)
            }
            ExtractionOutcome::SectionNotFound | ExtractionOutcome::TableNotFound => {
                return Ok(BucketSync::Failed(format!(
                    "review table '{}' not found for {}",
                    section.label,
                    bucket.label()
                )));
            }
        };

        match self
            .store
            .append_period(target, bucket, &writes, records as i64)
            .await
        {
            Ok(()) => {
                info!(
                    target = target,
                    bucket = %bucket.label(),
                    records = records,
                    "Recorded weekly period"
                );
                Ok(BucketSync::Recorded(records))
            }
            Err(StoreError::PeriodAlreadySynced { .. }) => {
                warn!(
                    target = target,
                    bucket = %bucket.label(),
                    "Period already recorded, skipping"
                );
                Ok(BucketSync::AlreadyRecorded)
            }
            Err(e) => Err(e),
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Scheduler state change");
            self.state = next;
        }
    }
}

/// Build the raw period sheet plus the per-category consolidated rows for
/// one successfully extracted bucket.
fn bucket_writes(
    section: &SectionSpec,
    bucket: &WeekBucket,
    rows: &[RawRecord],
) -> Vec<SheetWrite> {
    let start = bucket.start.format("%d/%m/%Y").to_string();
    let end = bucket.end().format("%d/%m/%Y").to_string();

    let mut raw_columns = vec!["Week Start".to_string(), "Week End".to_string()];
    raw_columns.extend(section.raw_header());
    let raw_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|record| {
            let mut cells = vec![start.clone(), end.clone()];
            cells.extend(record.cells.iter().cloned());
            cells
        })
        .collect();

    let mut writes = vec![SheetWrite {
        variant: SheetVariant::Raw,
        name: bucket.label(),
        columns: raw_columns,
        rows: raw_rows,
    }];

    // One consolidated sheet per category row; duplicate category names
    // within a bucket get a numeric suffix.
    let mut metric_columns = vec!["Date".to_string()];
    metric_columns.extend(section.raw_header().into_iter().skip(1));
    let mut used = HashSet::new();
    for record in rows {
        let Some(category) = record.cells.first() else {
            continue;
        };
        if category.is_empty() {
            debug!(bucket = %bucket.label(), "Skipping category row with no name");
            continue;
        }
        let name = unique_sheet_name(category, &mut used);
        let mut cells = vec![bucket.label()];
        cells.extend(record.cells.iter().skip(1).cloned());
        writes.push(SheetWrite {
            variant: SheetVariant::Filtered,
            name,
            columns: metric_columns.clone(),
            rows: vec![cells],
        });
    }

    writes
}

/// Sheet name for a category, deduplicated within one bucket. The suffix
/// is appended inside the length cap so truncated names cannot collide.
fn unique_sheet_name(category: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(category);
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 1;
    loop {
        let suffix = format!("_{}", n);
        let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
