//! Cell normalization: composite splitting, link extraction, cleanup
//!
//! Raw cells keep their inner markup through extraction; this module turns
//! them into the plain values of the filtered dataset variant. Break tags
//! are matched in every serialization (`<br>`, `<br/>`, `<br />`) so the
//! same rules apply to live pages and stored fixtures alike.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use crate::domain::section::{ColumnRole, ColumnSpec};

static BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<br\s*/?>").expect("static break-tag pattern"));
static TRAILING_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<br\s*/?>\s*$").expect("static trailing-break pattern"));
static SHEET_NAME_INVALID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("static sheet-name pattern"));
static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static anchor selector"));

/// Maximum sheet name length accepted by the tabular container format.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Split a line-break-packed cell into exactly `expected` sub-fields.
///
/// Position is preserved: segment N always maps to declared sub-field N.
/// Missing trailing segments become empty strings, surplus segments are
/// dropped.
pub fn split_composite(raw: &str, expected: usize) -> Vec<String> {
    let mut parts: Vec<String> = BREAK_TAG
        .split(raw)
        .map(|segment| segment.trim().to_string())
        .collect();
    parts.truncate(expected);
    while parts.len() < expected {
        parts.push(String::new());
    }
    parts
}

/// Absolute URL of the first anchor in the cell whose target is not a phone
/// or mail scheme; empty string when no qualifying anchor exists. Relative
/// paths resolve against the site origin.
pub fn extract_link(raw: &str, origin: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let href = fragment
        .select(&ANCHOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .find(|href| !href.starts_with("tel:") && !href.starts_with("mailto:"));

    let Some(href) = href else {
        return String::new();
    };

    match Url::parse(origin).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            warn!("Could not resolve link '{}' against '{}': {}", href, origin, e);
            href.to_string()
        }
    }
}

/// Remove a single trailing break-tag artifact from markup-derived text.
pub fn strip_trailing_break(raw: &str) -> String {
    TRAILING_BREAK.replace(raw, "").trim_end().to_string()
}

/// Text before the first break tag, trimmed. Cells without a break tag are
/// returned whole.
pub fn first_line(raw: &str) -> String {
    match BREAK_TAG.find(raw) {
        Some(m) => raw[..m.start()].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Replace characters the tabular container rejects and cap the length.
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced = SHEET_NAME_INVALID.replace_all(name, "_");
    replaced.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Header row of the filtered variant for a column schema: composite columns
/// contribute their sub-field names in place, renamed columns use their
/// filtered name.
pub fn filtered_header(columns: &[ColumnSpec]) -> Vec<String> {
    let mut header = Vec::new();
    for column in columns {
        match &column.role {
            ColumnRole::Composite { sub_fields } => {
                header.extend(sub_fields.iter().map(|s| s.to_string()));
            }
            _ => header.push(column.filtered_header().to_string()),
        }
    }
    header
}

/// Derive one filtered row from raw cells according to the column schema.
/// `cells` must already be conformed to the schema width.
pub fn derive_filtered(cells: &[String], columns: &[ColumnSpec], origin: &str) -> Vec<String> {
    let mut row = Vec::new();
    for (cell, column) in cells.iter().zip(columns.iter()) {
        let value = if column.strip_trailing_break {
            strip_trailing_break(cell)
        } else {
            cell.clone()
        };

        match &column.role {
            ColumnRole::Text => row.push(value),
            ColumnRole::Composite { sub_fields } => {
                row.extend(split_composite(&value, sub_fields.len()));
            }
            ColumnRole::Link => row.push(extract_link(&value, origin)),
            ColumnRole::FirstLine => row.push(first_line(&value)),
        }
    }
    row
}
