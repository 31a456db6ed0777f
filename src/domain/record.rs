//! Raw records extracted from HTML tables
//!
//! A `RawRecord` is one table row: an ordered sequence of cell values whose
//! content is the cell's raw inner markup, trimmed but otherwise untouched.
//! Normalization (composite splitting, link resolution) happens later and
//! produces plain `Vec<String>` rows for the filtered variant.

use serde::{Deserialize, Serialize};

/// One logical row of a section, cells in declared column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub cells: Vec<String>,
}

impl RawRecord {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Conform the record to the declared column count: pad short rows with
    /// empty cells, drop excess cells from long ones. Returns whether cells
    /// were dropped so the caller can log the shape anomaly.
    pub fn conform_to(&mut self, width: usize) -> bool {
        let truncated = self.cells.len() > width;
        self.cells.truncate(width);
        while self.cells.len() < width {
            self.cells.push(String::new());
        }
        truncated
    }
}

impl From<Vec<String>> for RawRecord {
    fn from(cells: Vec<String>) -> Self {
        Self::new(cells)
    }
}
