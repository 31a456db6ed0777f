//! Section descriptors: where a table lives on a page and what its columns mean
//!
//! A scrape target declares a fixed set of sections up front. Each section
//! carries a locator (how the table is found in the document) and an ordered
//! column schema. Column roles drive the filtered-variant derivation: which
//! cells get split into sub-fields, which resolve to a link, and which are
//! collapsed to their first line.

use std::ops::RangeInclusive;

/// How a section's table is located within a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLocator {
    /// First table following a heading whose trimmed text equals the label,
    /// in document order.
    Heading,
    /// The first table in the document (single-table listing pages).
    FirstTable,
    /// Every table carrying the given CSS class; rows from all matches are
    /// accumulated in document order.
    CssClass(&'static str),
}

/// What a column's raw cell content means for the filtered variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    /// Carried over as-is.
    Text,
    /// Line-break-packed list expanded in place into the named sub-fields.
    Composite { sub_fields: &'static [&'static str] },
    /// Replaced by the absolute URL of the first non-contact anchor.
    Link,
    /// Collapsed to the text before the first line break.
    FirstLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub role: ColumnRole,
    /// Drop one trailing line-break artifact before any other handling.
    pub strip_trailing_break: bool,
    /// Header name used in the filtered variant when it differs from `name`.
    pub filtered_name: Option<&'static str>,
}

impl ColumnSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::Text,
            strip_trailing_break: false,
            filtered_name: None,
        }
    }

    /// Text column known to end with a stray break tag (e.g. seller names).
    pub const fn stripped(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::Text,
            strip_trailing_break: true,
            filtered_name: None,
        }
    }

    pub const fn composite(name: &'static str, sub_fields: &'static [&'static str]) -> Self {
        Self {
            name,
            role: ColumnRole::Composite { sub_fields },
            strip_trailing_break: false,
            filtered_name: None,
        }
    }

    pub const fn link(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::Link,
            strip_trailing_break: false,
            filtered_name: None,
        }
    }

    pub const fn first_line(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::FirstLine,
            strip_trailing_break: false,
            filtered_name: None,
        }
    }

    pub const fn first_line_as(name: &'static str, filtered_name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::FirstLine,
            strip_trailing_break: false,
            filtered_name: Some(filtered_name),
        }
    }

    /// Header name this column contributes to the filtered variant.
    /// Composite columns contribute their sub-field names instead.
    pub fn filtered_header(&self) -> &'static str {
        self.filtered_name.unwrap_or(self.name)
    }
}

/// A named, schema-bound table-like region within a fetched page.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub label: &'static str,
    pub locator: SectionLocator,
    pub columns: Vec<ColumnSpec>,
}

impl SectionSpec {
    pub fn heading(label: &'static str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            label,
            locator: SectionLocator::Heading,
            columns,
        }
    }

    pub fn first_table(label: &'static str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            label,
            locator: SectionLocator::FirstTable,
            columns,
        }
    }

    pub fn css_class(label: &'static str, class: &'static str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            label,
            locator: SectionLocator::CssClass(class),
            columns,
        }
    }

    /// Declared column header row for the raw variant.
    pub fn raw_header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }
}

/// How a target's pages are addressed and how often it syncs.
#[derive(Debug, Clone)]
pub enum TargetKind {
    /// Paginated listing view, snapshot-synced: every run replaces the
    /// target's sheets wholesale.
    Listing { filter: u8, pages: RangeInclusive<u32> },
    /// Date-ranged review view, incrementally synced one week bucket at a
    /// time through the watermark scheduler.
    WeeklyReview,
}

/// One configured scrape target: endpoint addressing plus the sections
/// expected there.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub name: &'static str,
    pub kind: TargetKind,
    pub sections: Vec<SectionSpec>,
}

impl TargetSpec {
    pub fn is_bucketed(&self) -> bool {
        matches!(self.kind, TargetKind::WeeklyReview)
    }

    pub fn section_labels(&self) -> Vec<&'static str> {
        self.sections.iter().map(|s| s.label).collect()
    }
}
