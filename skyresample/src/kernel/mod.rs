//! Overlap kernel seam.
//!
//! A kernel takes one window of the input grid, the full harmonized
//! coordinate arrays and one 2-D image slice, and returns partial sums over
//! the *entire* output grid:
//!
//! ```text
//! window + coords + slice ──► OverlapKernel ──► PartialSums { weighted_sum, weight }
//!                                                     (ny_out × nx_out each)
//! ```
//!
//! The orchestration relies on one property only: partial sums from disjoint
//! windows add up to the sums for their union. Everything else about the
//! geometry is the kernel's business.

mod planar;

pub use planar::PlanarOverlapKernel;

use std::ops::Range;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use crate::harmonize::HarmonizedCoords;
use crate::partition::InputWindow;

/// Errors raised by an overlap kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A coordinate or data array does not have the expected shape.
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The window extends past the input grid.
    #[error("Window rows {rows:?} cols {cols:?} exceeds input grid {grid:?}")]
    WindowOutOfBounds {
        rows: Range<usize>,
        cols: Range<usize>,
        grid: (usize, usize),
    },

    /// Kernel-specific failure.
    #[error("Overlap computation failed: {0}")]
    Computation(String),
}

/// Partial flux and weight accumulators over the full output grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSums {
    /// Sum of `value × weight` contributions.
    pub weighted_sum: Array2<f64>,
    /// Sum of overlap weights.
    pub weight: Array2<f64>,
}

impl PartialSums {
    /// Zeroed accumulators of shape `(ny_out, nx_out)`.
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            weighted_sum: Array2::zeros(shape),
            weight: Array2::zeros(shape),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.weight.dim()
    }

    /// Adds `value × weight` and `weight` at output pixel `(row, col)`.
    #[inline]
    pub fn deposit(&mut self, row: usize, col: usize, value: f64, weight: f64) {
        self.weighted_sum[[row, col]] += value * weight;
        self.weight[[row, col]] += weight;
    }
}

/// Computes area-overlap contributions of an input window to the output grid.
///
/// Implementations must be `Send + Sync`; one instance is shared by all
/// workers of a call.
pub trait OverlapKernel: Send + Sync {
    /// Returns the contributions of the input pixels in `window`.
    ///
    /// # Arguments
    ///
    /// * `window` - Input rows and columns to process
    /// * `coords` - Harmonized corner coordinates of both grids
    /// * `slice` - One 2-D input image slice, shape `(ny_in, nx_in)`
    /// * `out_shape` - Output spatial shape `(ny_out, nx_out)`
    fn overlap(
        &self,
        window: &InputWindow,
        coords: &HarmonizedCoords,
        slice: ArrayView2<'_, f64>,
        out_shape: (usize, usize),
    ) -> Result<PartialSums, KernelError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Checks that `coords`, `slice` and `window` agree on the grid shapes.
pub fn check_inputs(
    window: &InputWindow,
    coords: &HarmonizedCoords,
    slice: ArrayView2<'_, f64>,
    out_shape: (usize, usize),
) -> Result<(), KernelError> {
    let (ny_in, nx_in) = slice.dim();
    let in_corners = (ny_in + 1, nx_in + 1);
    let out_corners = (out_shape.0 + 1, out_shape.1 + 1);

    let arrays = [
        ("xp_inout", coords.xp_inout.dim(), in_corners),
        ("yp_inout", coords.yp_inout.dim(), in_corners),
        ("xw_in", coords.xw_in.dim(), in_corners),
        ("yw_in", coords.yw_in.dim(), in_corners),
        ("xw_out", coords.xw_out.dim(), out_corners),
        ("yw_out", coords.yw_out.dim(), out_corners),
    ];
    for (what, actual, expected) in arrays {
        if actual != expected {
            return Err(KernelError::ShapeMismatch {
                what,
                expected,
                actual,
            });
        }
    }

    if window.rows.end > ny_in || window.cols.end > nx_in {
        return Err(KernelError::WindowOutOfBounds {
            rows: window.rows.clone(),
            cols: window.cols.clone(),
            grid: (ny_in, nx_in),
        });
    }
    Ok(())
}
