//! Bounded pagination over a listing endpoint
//!
//! Pages are visited in ascending order within a fixed, small range. A page
//! that fails to fetch is logged and skipped; harvesting continues so one bad
//! page cannot sink a whole target. Section rows accumulate across pages in
//! visit order.

use std::ops::RangeInclusive;

use scraper::Html;
use tracing::{debug, warn};

use crate::domain::record::RawRecord;
use crate::domain::section::SectionSpec;
use crate::infrastructure::http_session::PageFetcher;
use crate::infrastructure::table_extractor::TableExtractor;

/// Accumulated rows for one declared section across every visited page.
#[derive(Debug)]
pub struct SectionHarvest {
    pub label: &'static str,
    pub rows: Vec<RawRecord>,
    /// Whether the section was structurally present on at least one page.
    /// Sections confined to the first page stay `true` even when later pages
    /// lack them.
    pub found_anywhere: bool,
}

/// Result of one pagination sweep over a target.
#[derive(Debug)]
pub struct PaginationHarvest {
    pub sections: Vec<SectionHarvest>,
    pub pages_fetched: u32,
    pub pages_failed: u32,
}

impl PaginationHarvest {
    /// Every page in the range failed to fetch. The sweep produced no
    /// evidence about the target at all.
    pub fn all_pages_failed(&self) -> bool {
        self.pages_fetched == 0 && self.pages_failed > 0
    }

    /// Labels of declared sections that no visited page contained.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        self.sections
            .iter()
            .filter(|s| !s.found_anywhere)
            .map(|s| s.label)
            .collect()
    }

    pub fn total_records(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

/// Sweeps a page range and feeds each fetched document to the extractor.
pub struct Paginator<'a> {
    fetcher: &'a dyn PageFetcher,
    extractor: &'a TableExtractor,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, extractor: &'a TableExtractor) -> Self {
        Self { fetcher, extractor }
    }

    pub async fn collect(
        &self,
        build_url: impl Fn(u32) -> String,
        pages: RangeInclusive<u32>,
        sections: &[SectionSpec],
    ) -> PaginationHarvest {
        let mut harvest: Vec<SectionHarvest> = sections
            .iter()
            .map(|section| SectionHarvest {
                label: section.label,
                rows: Vec::new(),
                found_anywhere: false,
            })
            .collect();
        let mut pages_fetched = 0;
        let mut pages_failed = 0;

        for page in pages {
            let url = build_url(page);
            let body = match self.fetcher.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Skipping page {}: {}", page, e);
                    pages_failed += 1;
                    continue;
                }
            };
            pages_fetched += 1;

            let document = Html::parse_document(&body);
            for (section, entry) in sections.iter().zip(harvest.iter_mut()) {
                let outcome = self.extractor.extract_section(&document, section);
                if outcome.is_structural_success() {
                    entry.found_anywhere = true;
                    entry.rows.extend(outcome.into_rows());
                } else {
                    debug!("Section '{}' absent from page {}", section.label, page);
                }
            }
        }

        PaginationHarvest {
            sections: harvest,
            pages_fetched,
            pages_failed,
        }
    }
}
