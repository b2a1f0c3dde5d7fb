//! Work partitioning of the input grid.
//!
//! The input spatial extent is split along one axis into contiguous,
//! non-overlapping windows, one per worker. Every partition gets
//! `n / P` lines and the last one absorbs the remainder:
//!
//! ```text
//! nx_in = 10, P = 3
//!
//!   [0, 3)  [3, 6)  [6, 10)
//! ```
//!
//! Partitions are independent, so the kernel can process them in any order.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Input axis along which work is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionAxis {
    /// Split input columns (`x`). Each window spans all rows.
    #[default]
    Columns,
    /// Split input rows (`y`). Each window spans all columns.
    Rows,
}

impl PartitionAxis {
    pub fn name(&self) -> &'static str {
        match self {
            PartitionAxis::Columns => "columns",
            PartitionAxis::Rows => "rows",
        }
    }
}

impl fmt::Display for PartitionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PartitionAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columns" | "cols" | "x" => Ok(PartitionAxis::Columns),
            "rows" | "y" => Ok(PartitionAxis::Rows),
            other => Err(format!(
                "Invalid partition axis '{}': expected 'columns' or 'rows'",
                other
            )),
        }
    }
}

/// Rectangular region of input pixels handed to one kernel invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWindow {
    /// Input columns `[start, end)`.
    pub cols: Range<usize>,
    /// Input rows `[start, end)`.
    pub rows: Range<usize>,
}

impl InputWindow {
    /// Window covering the whole `ny × nx` grid.
    pub fn full(ny: usize, nx: usize) -> Self {
        Self {
            cols: 0..nx,
            rows: 0..ny,
        }
    }

    /// Number of input pixels in the window.
    pub fn pixel_count(&self) -> usize {
        self.cols.len() * self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }
}

/// Splits an `ny × nx` input grid into `workers` windows along `axis`.
///
/// `workers` is clamped to at least one. When there are more workers than
/// lines, leading windows are empty and the last covers everything; empty
/// windows contribute nothing to the sums.
pub fn partition(ny: usize, nx: usize, workers: usize, axis: PartitionAxis) -> Vec<InputWindow> {
    let workers = workers.max(1);
    let extent = match axis {
        PartitionAxis::Columns => nx,
        PartitionAxis::Rows => ny,
    };
    let step = extent / workers;

    (0..workers)
        .map(|i| {
            let start = step * i;
            let end = if i == workers - 1 {
                extent
            } else {
                step * (i + 1)
            };
            match axis {
                PartitionAxis::Columns => InputWindow {
                    cols: start..end,
                    rows: 0..ny,
                },
                PartitionAxis::Rows => InputWindow {
                    cols: 0..nx,
                    rows: start..end,
                },
            }
        })
        .collect()
}
