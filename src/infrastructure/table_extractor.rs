//! Labeled-table extraction from fetched documents
//!
//! Pages carry one or more declared sections. Each section resolves to a
//! table through its locator, and every data row of that table becomes one
//! raw record. Cells keep their inner markup untouched; only the filtered
//! derivation interprets it.

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::domain::record::RawRecord;
use crate::domain::section::{SectionLocator, SectionSpec};

/// What extracting one declared section from one document produced.
///
/// A present-but-empty table is a structural success: the page rendered the
/// section and it simply has no records right now. A missing heading or a
/// heading without a table is not.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Table located, with at least one data row.
    Rows(Vec<RawRecord>),
    /// Table located, but nothing below the header row.
    Empty,
    /// The section's anchor (heading or class) matched nothing.
    SectionNotFound,
    /// The anchor matched but no table follows it.
    TableNotFound,
}

impl ExtractionOutcome {
    pub fn is_structural_success(&self) -> bool {
        matches!(self, Self::Rows(_) | Self::Empty)
    }

    pub fn record_count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            _ => 0,
        }
    }

    pub fn into_rows(self) -> Vec<RawRecord> {
        match self {
            Self::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }
}

/// Section-aware table reader with precompiled structural selectors.
pub struct TableExtractor {
    heading_selector: Selector,
    table_selector: Selector,
    row_selector: Selector,
    cell_selector: Selector,
}

impl TableExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading_selector: Selector::parse("h2")
                .map_err(|e| anyhow!("Invalid heading selector: {}", e))?,
            table_selector: Selector::parse("table")
                .map_err(|e| anyhow!("Invalid table selector: {}", e))?,
            row_selector: Selector::parse("tr")
                .map_err(|e| anyhow!("Invalid row selector: {}", e))?,
            cell_selector: Selector::parse("td")
                .map_err(|e| anyhow!("Invalid cell selector: {}", e))?,
        })
    }

    /// Resolve a section against a parsed document and read its rows.
    pub fn extract_section(&self, document: &Html, section: &SectionSpec) -> ExtractionOutcome {
        match &section.locator {
            SectionLocator::Heading => self.extract_after_heading(document, section),
            SectionLocator::FirstTable => match document.select(&self.table_selector).next() {
                Some(table) => self.rows_from_tables(&[table], section),
                None => ExtractionOutcome::TableNotFound,
            },
            SectionLocator::CssClass(class) => self.extract_by_class(document, class, section),
        }
    }

    fn extract_after_heading(&self, document: &Html, section: &SectionSpec) -> ExtractionOutcome {
        let heading = document
            .select(&self.heading_selector)
            .find(|h| h.text().collect::<String>().trim() == section.label);
        let Some(heading) = heading else {
            return ExtractionOutcome::SectionNotFound;
        };

        match first_table_after(document, heading) {
            Some(table) => self.rows_from_tables(&[table], section),
            None => ExtractionOutcome::TableNotFound,
        }
    }

    fn extract_by_class(
        &self,
        document: &Html,
        class: &str,
        section: &SectionSpec,
    ) -> ExtractionOutcome {
        let selector = match Selector::parse(&format!("table.{}", class)) {
            Ok(selector) => selector,
            Err(_) => {
                warn!(
                    "Invalid table class '{}' for section '{}'",
                    class, section.label
                );
                return ExtractionOutcome::SectionNotFound;
            }
        };

        let tables: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if tables.is_empty() {
            return ExtractionOutcome::SectionNotFound;
        }
        self.rows_from_tables(&tables, section)
    }

    /// Read data rows from the located tables, in document order. The first
    /// row of each table is its header and is skipped; rows without a single
    /// data cell are ignored.
    fn rows_from_tables(
        &self,
        tables: &[ElementRef<'_>],
        section: &SectionSpec,
    ) -> ExtractionOutcome {
        let width = section.columns.len();
        let mut records = Vec::new();

        for table in tables {
            for (index, row) in table.select(&self.row_selector).skip(1).enumerate() {
                let cells: Vec<String> = row
                    .select(&self.cell_selector)
                    .map(|cell| cell.inner_html().trim().to_string())
                    .collect();
                if cells.is_empty() {
                    continue;
                }

                let mut record = RawRecord::from(cells);
                if record.conform_to(width) {
                    warn!(
                        "Section '{}' row {} has more cells than the declared {} columns, truncating",
                        section.label, index, width
                    );
                }
                records.push(record);
            }
        }

        if records.is_empty() {
            ExtractionOutcome::Empty
        } else {
            ExtractionOutcome::Rows(records)
        }
    }
}

/// First `<table>` element strictly after `anchor` in document order.
fn first_table_after<'a>(document: &'a Html, anchor: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut past_anchor = false;
    for node in document.root_element().descendants() {
        if node.id() == anchor.id() {
            past_anchor = true;
            continue;
        }
        if !past_anchor {
            continue;
        }
        if let Some(element) = ElementRef::wrap(node) {
            if element.value().name() == "table" {
                return Some(element);
            }
        }
    }
    None
}
