//! Sync run orchestration
//!
//! One `run` call drives the whole catalogue: authenticate once, open the
//! dataset, then sweep every target. Listing targets snapshot into the
//! dataset; the weekly review target drains through the watermark
//! scheduler. Failures are contained per target so a broken view cannot
//! take the rest of the run down with it; only authentication and dataset
//! setup abort the run as a whole.

use std::ops::RangeInclusive;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::scheduler::WatermarkScheduler;
use crate::application::targets::builtin_targets;
use crate::domain::{SyncReport, TargetKind, TargetOutcome, TargetReport, TargetSpec};
use crate::infrastructure::normalizer::{derive_filtered, filtered_header};
use crate::infrastructure::{
    backoffice, AppConfig, DatasetStore, HttpSession, PageFetcher, Paginator, SheetVariant,
    SheetWrite, SyncError, SyncResult, TableExtractor,
};

pub struct SyncOrchestrator {
    config: AppConfig,
}

impl SyncOrchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Execute one full sync run over every built-in target.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting sync run");

        let credentials = self.config.credentials.resolve()?;
        let session =
            HttpSession::authenticate(&self.config.site, &credentials, &self.config.http).await?;
        let extractor = TableExtractor::new().map_err(|e| SyncError::config(e.to_string()))?;

        let database_path = self.config.storage.resolved_database_path();
        let store = DatasetStore::connect(&database_path).await?;
        store.migrate().await?;

        let mut targets = Vec::new();
        for target in builtin_targets() {
            let report = match &target.kind {
                TargetKind::Listing { filter, pages } => {
                    self.sync_listing(&session, &extractor, &store, &target, *filter, pages.clone())
                        .await
                }
                TargetKind::WeeklyReview => {
                    self.sync_weekly(&session, &extractor, &store, &target).await
                }
            };
            targets.push(report);
        }

        let report = SyncReport::new(run_id, started_at, targets);
        info!(
            run_id = %run_id,
            records = report.total_records(),
            failed_targets = report.failed_targets(),
            "Sync run finished"
        );
        Ok(report)
    }

    /// Snapshot one listing target: sweep its page range, then replace its
    /// sheets with whatever the sweep produced.
    async fn sync_listing(
        &self,
        fetcher: &dyn PageFetcher,
        extractor: &TableExtractor,
        store: &DatasetStore,
        target: &TargetSpec,
        filter: u8,
        pages: RangeInclusive<u32>,
    ) -> TargetReport {
        info!(target = target.name, filter = filter, "Scraping listing target");

        let base = &self.config.site.base_url;
        let paginator = Paginator::new(fetcher, extractor);
        let harvest = paginator
            .collect(
                |page| backoffice::listing_url(base, filter, page),
                pages,
                &target.sections,
            )
            .await;

        if harvest.all_pages_failed() {
            return TargetReport::failed(target.name, "every listing page fetch failed");
        }

        let mut writes = Vec::new();
        let mut records_written = 0;
        for (section, harvested) in target.sections.iter().zip(&harvest.sections) {
            if !harvested.found_anywhere {
                continue;
            }
            records_written += harvested.rows.len();
            let name = sheet_name(target, section.label);
            writes.push(SheetWrite {
                variant: SheetVariant::Raw,
                name: name.clone(),
                columns: section.raw_header(),
                rows: harvested.rows.iter().map(|r| r.cells.clone()).collect(),
            });
            writes.push(SheetWrite {
                variant: SheetVariant::Filtered,
                name,
                columns: filtered_header(&section.columns),
                rows: harvested
                    .rows
                    .iter()
                    .map(|r| derive_filtered(&r.cells, &section.columns, base))
                    .collect(),
            });
        }

        // Pages came back but no declared section matched anywhere: mark
        // the absence explicitly instead of leaving an ambiguous dataset.
        if writes.is_empty() {
            warn!(target = target.name, "No declared section found on any page");
            writes.push(SheetWrite {
                variant: SheetVariant::Raw,
                name: sheet_name(target, "NoData"),
                columns: Vec::new(),
                rows: Vec::new(),
            });
        }

        if let Err(e) = store.replace_snapshot(&writes).await {
            return TargetReport::failed(target.name, e.to_string());
        }

        let sections_missing: Vec<String> = harvest
            .missing_sections()
            .iter()
            .map(|label| label.to_string())
            .collect();
        let outcome = if harvest.pages_failed == 0 && sections_missing.is_empty() {
            TargetOutcome::Completed
        } else {
            TargetOutcome::CompletedWithGaps
        };
        TargetReport {
            target: target.name.to_string(),
            outcome,
            records_written,
            sections_missing,
            pages_failed: harvest.pages_failed as usize,
            periods_synced: 0,
            periods_failed: 0,
            periods_remaining: 0,
        }
    }

    /// Drain the weekly review target and fold the drain summary into a
    /// target report. A drain that recorded nothing before failing counts
    /// as a failed target; partial progress counts as gaps.
    async fn sync_weekly(
        &self,
        fetcher: &dyn PageFetcher,
        extractor: &TableExtractor,
        store: &DatasetStore,
        target: &TargetSpec,
    ) -> TargetReport {
        info!(target = target.name, "Draining weekly review target");

        let mut scheduler = WatermarkScheduler::new(
            store,
            fetcher,
            extractor,
            &self.config.site,
            &self.config.sync,
        );
        let summary = match scheduler.drain(target).await {
            Ok(summary) => summary,
            Err(e) => return TargetReport::failed(target.name, e.to_string()),
        };

        let outcome = match &summary.failure {
            None => TargetOutcome::Completed,
            Some(reason) if summary.periods_synced == 0 => TargetOutcome::Failed(reason.clone()),
            Some(_) => TargetOutcome::CompletedWithGaps,
        };
        TargetReport {
            target: target.name.to_string(),
            outcome,
            records_written: summary.records_written,
            sections_missing: Vec::new(),
            pages_failed: 0,
            periods_synced: summary.periods_synced,
            periods_failed: summary.periods_failed,
            periods_remaining: summary.periods_remaining,
        }
    }
}

/// Dataset sheets are shared across targets, so section sheets carry the
/// target name as a prefix.
fn sheet_name(target: &TargetSpec, label: &str) -> String {
    format!("{} {}", target.name, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::targets::{builtin_targets as catalogue, WEEKLY_REVIEW_TARGET};
    use crate::domain::{ColumnSpec, SectionSpec};
    use crate::infrastructure::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::tempdir;

    const BASE: &str = "https://backoffice.test";

    struct CannedFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::status(500, url))
        }
    }

    async fn open_store(path: &Path) -> DatasetStore {
        let store = DatasetStore::connect(path).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.site.base_url = BASE.to_string();
        config
    }

    fn probe_target() -> TargetSpec {
        let columns = || {
            vec![
                ColumnSpec::stripped("Seller"),
                ColumnSpec::link("Link"),
            ]
        };
        TargetSpec {
            name: "probe",
            kind: TargetKind::Listing {
                filter: 9,
                pages: 1..=2,
            },
            sections: vec![
                SectionSpec::heading("Open", columns()),
                SectionSpec::heading("Closed", columns()),
            ],
        }
    }

    fn listing_page(heading: &str, sellers: &[&str]) -> String {
        let mut html = format!(
            "<html><body><h2>{}</h2><table><tr><th>Seller</th><th>Action</th></tr>",
            heading
        );
        for seller in sellers {
            html.push_str(&format!(
                "<tr><td>{}<br></td><td><a href=\"/enquiry/7\">View</a></td></tr>",
                seller
            ));
        }
        html.push_str("</table></body></html>");
        html
    }

    #[tokio::test]
    async fn listing_snapshot_lands_raw_and_filtered_sheets() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let target = probe_target();

        let mut pages = HashMap::new();
        pages.insert(
            backoffice::listing_url(BASE, 9, 1),
            listing_page("Open", &["Lim Bee Hoon", "Tan Ah Kow"]),
        );
        pages.insert(
            backoffice::listing_url(BASE, 9, 2),
            listing_page("Closed", &["Lee Mei Ling"]),
        );
        let fetcher = CannedFetcher { pages };
        let extractor = TableExtractor::new().unwrap();

        let orchestrator = SyncOrchestrator::new(config());
        let report = orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        assert_eq!(report.outcome, TargetOutcome::Completed);
        assert_eq!(report.records_written, 3);
        assert!(report.sections_missing.is_empty());

        let (raw_columns, raw_rows) =
            store.read_sheet(SheetVariant::Raw, "probe Open").await.unwrap();
        assert_eq!(raw_columns, vec!["Seller", "Link"]);
        assert_eq!(raw_rows.len(), 2);
        assert_eq!(raw_rows[0][0], "Lim Bee Hoon<br>");

        let (filtered_columns, filtered_rows) = store
            .read_sheet(SheetVariant::Filtered, "probe Open")
            .await
            .unwrap();
        assert_eq!(filtered_columns, vec!["Seller", "Link"]);
        assert_eq!(filtered_rows[0][0], "Lim Bee Hoon");
        assert_eq!(filtered_rows[0][1], "https://backoffice.test/enquiry/7");
    }

    #[tokio::test]
    async fn rerun_replaces_listing_sheets_instead_of_appending() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let target = probe_target();
        let extractor = TableExtractor::new().unwrap();
        let orchestrator = SyncOrchestrator::new(config());

        let mut pages = HashMap::new();
        pages.insert(
            backoffice::listing_url(BASE, 9, 1),
            listing_page("Open", &["Lim Bee Hoon", "Tan Ah Kow"]),
        );
        pages.insert(backoffice::listing_url(BASE, 9, 2), listing_page("Open", &[]));
        let fetcher = CannedFetcher { pages };
        orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        let mut pages = HashMap::new();
        pages.insert(
            backoffice::listing_url(BASE, 9, 1),
            listing_page("Open", &["Lee Mei Ling"]),
        );
        pages.insert(backoffice::listing_url(BASE, 9, 2), listing_page("Open", &[]));
        let fetcher = CannedFetcher { pages };
        orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        let (_, rows) = store.read_sheet(SheetVariant::Raw, "probe Open").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Lee Mei Ling<br>");
    }

    #[tokio::test]
    async fn all_sections_missing_writes_a_placeholder() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let target = probe_target();

        let empty = "<html><body><h2>Unrelated</h2></body></html>".to_string();
        let mut pages = HashMap::new();
        pages.insert(backoffice::listing_url(BASE, 9, 1), empty.clone());
        pages.insert(backoffice::listing_url(BASE, 9, 2), empty);
        let fetcher = CannedFetcher { pages };
        let extractor = TableExtractor::new().unwrap();

        let orchestrator = SyncOrchestrator::new(config());
        let report = orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        assert_eq!(report.outcome, TargetOutcome::CompletedWithGaps);
        assert_eq!(report.records_written, 0);
        assert_eq!(report.sections_missing, vec!["Open", "Closed"]);

        let sheets = store.sheet_names(SheetVariant::Raw).await.unwrap();
        assert!(sheets.contains(&"probe NoData".to_string()));
    }

    #[tokio::test]
    async fn unreachable_listing_pages_fail_the_target() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let target = probe_target();

        let fetcher = CannedFetcher { pages: HashMap::new() };
        let extractor = TableExtractor::new().unwrap();

        let orchestrator = SyncOrchestrator::new(config());
        let report = orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        assert!(report.outcome.is_failed());
        assert!(store.sheet_names(SheetVariant::Raw).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_page_failure_keeps_the_rest_of_the_sweep() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let target = probe_target();

        // Page 2 is unreachable; page 1 still lands.
        let mut pages = HashMap::new();
        pages.insert(
            backoffice::listing_url(BASE, 9, 1),
            listing_page("Open", &["Lim Bee Hoon"]),
        );
        let fetcher = CannedFetcher { pages };
        let extractor = TableExtractor::new().unwrap();

        let orchestrator = SyncOrchestrator::new(config());
        let report = orchestrator
            .sync_listing(&fetcher, &extractor, &store, &target, 9, 1..=2)
            .await;

        assert_eq!(report.outcome, TargetOutcome::CompletedWithGaps);
        assert_eq!(report.records_written, 1);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.sections_missing, vec!["Closed"]);
    }

    #[tokio::test]
    async fn failed_drain_with_no_progress_fails_the_weekly_target() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("sync.db")).await;
        let weekly = catalogue()
            .into_iter()
            .find(|t| t.name == WEEKLY_REVIEW_TARGET)
            .unwrap();

        let fetcher = CannedFetcher { pages: HashMap::new() };
        let extractor = TableExtractor::new().unwrap();

        let orchestrator = SyncOrchestrator::new(config());
        let report = orchestrator
            .sync_weekly(&fetcher, &extractor, &store, &weekly)
            .await;

        assert!(report.outcome.is_failed());
        assert_eq!(report.periods_synced, 0);
        assert_eq!(report.periods_failed, 1);
        assert!(report.periods_remaining > 0);
    }
}
