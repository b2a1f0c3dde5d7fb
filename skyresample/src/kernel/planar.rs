//! Exact polygon overlap in output pixel space.
//!
//! Each input pixel is the quadrilateral formed by its four corners mapped
//! into output pixel coordinates (`xp_inout`, `yp_inout`). Its overlap with
//! every output pixel square in its bounding box is integrated edge by edge
//! with Green's theorem, and the covered fraction of the output pixel becomes
//! the weight of that input value.
//!
//! ```text
//!   output pixel (ii, jj) = [ii - 0.5, ii + 0.5] × [jj - 0.5, jj + 0.5]
//!
//!   weight[jj, ii]       += overlap
//!   weighted_sum[jj, ii] += value × overlap
//! ```
//!
//! Since output pixels have unit area in their own pixel space, a fully
//! covered output pixel ends with weight 1.

use ndarray::ArrayView2;

use super::{check_inputs, KernelError, OverlapKernel, PartialSums};
use crate::harmonize::HarmonizedCoords;
use crate::partition::InputWindow;

/// Overlap kernel operating on the projected input quadrilaterals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarOverlapKernel;

impl PlanarOverlapKernel {
    pub fn new() -> Self {
        Self
    }
}

impl OverlapKernel for PlanarOverlapKernel {
    fn overlap(
        &self,
        window: &InputWindow,
        coords: &HarmonizedCoords,
        slice: ArrayView2<'_, f64>,
        out_shape: (usize, usize),
    ) -> Result<PartialSums, KernelError> {
        check_inputs(window, coords, slice, out_shape)?;

        let (ny_out, nx_out) = out_shape;
        let mut sums = PartialSums::zeros(out_shape);
        let xp = &coords.xp_inout;
        let yp = &coords.yp_inout;

        for j in window.rows.clone() {
            for i in window.cols.clone() {
                let value = slice[[j, i]];
                if !value.is_finite() {
                    continue;
                }

                // Counterclockwise in pixel space
                let x = [xp[[j, i]], xp[[j, i + 1]], xp[[j + 1, i + 1]], xp[[j + 1, i]]];
                let y = [yp[[j, i]], yp[[j, i + 1]], yp[[j + 1, i + 1]], yp[[j + 1, i]]];
                if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
                    continue;
                }

                let Some(cols) = covered_range(&x, nx_out) else {
                    continue;
                };
                let Some(rows) = covered_range(&y, ny_out) else {
                    continue;
                };

                for jj in rows.0..=rows.1 {
                    for ii in cols.0..=cols.1 {
                        let overlap = boxer(ii as f64 - 0.5, jj as f64 - 0.5, &x, &y);
                        if overlap > 0.0 {
                            sums.deposit(jj, ii, value, overlap);
                        }
                    }
                }
            }
        }

        Ok(sums)
    }

    fn name(&self) -> &str {
        "planar"
    }
}

/// Inclusive range of output pixel indices along one axis touched by the
/// span of `v`, clamped to `[0, n)`.
fn covered_range(v: &[f64; 4], n: usize) -> Option<(usize, usize)> {
    let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let first = (lo + 0.5).floor().max(0.0);
    let last = (hi + 0.5).floor().min(n as f64 - 1.0);
    if n == 0 || first > last {
        return None;
    }
    Some((first as usize, last as usize))
}

/// Signed area between segment `(x1, y1)-(x2, y2)` and the x-axis, clipped to
/// the unit square.
///
/// Positive for left-to-right traversal. Summed over the edges of a closed
/// polygon it gives the signed area of the polygon inside the unit square.
fn sgarea(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;

    // Vertical edges enclose no area
    if dx.abs() < 1e-14 {
        return 0.0;
    }

    let (sign, xlo, xhi) = if dx < 0.0 {
        (-1.0, x2, x1)
    } else {
        (1.0, x1, x2)
    };
    if xlo >= 1.0 || xhi <= 0.0 {
        return 0.0;
    }

    let xlo = xlo.max(0.0);
    let xhi = xhi.min(1.0);
    let slope = dy / dx;
    let ylo = y1 + slope * (xlo - x1);
    let yhi = y1 + slope * (xhi - x1);

    if ylo <= 0.0 && yhi <= 0.0 {
        return 0.0;
    }
    if ylo >= 1.0 && yhi >= 1.0 {
        return sign * (xhi - xlo);
    }

    // x where the line crosses y = 0 is det / dy, and y = 1 is (det + dx) / dy
    let det = x1 * y2 - y1 * x2;
    let (xlo, ylo) = if ylo < 0.0 { (det / dy, 0.0) } else { (xlo, ylo) };
    let (xhi, yhi) = if yhi < 0.0 { (det / dy, 0.0) } else { (xhi, yhi) };

    if ylo <= 1.0 {
        if yhi <= 1.0 {
            return sign * 0.5 * (xhi - xlo) * (yhi + ylo);
        }
        let xtop = (dx + det) / dy;
        return sign * (0.5 * (xtop - xlo) * (1.0 + ylo) + xhi - xtop);
    }

    let xtop = (dx + det) / dy;
    sign * (0.5 * (xhi - xtop) * (1.0 + yhi) + xtop - xlo)
}

/// Area of the quadrilateral `(x, y)` inside the unit square whose lower-left
/// corner sits at `(ox, oy)`.
fn boxer(ox: f64, oy: f64, x: &[f64; 4], y: &[f64; 4]) -> f64 {
    let px = x.map(|v| v - ox);
    let py = y.map(|v| v - oy);

    let mut sum = 0.0;
    for i in 0..4 {
        let j = (i + 1) % 4;
        sum += sgarea(px[i], py[i], px[j], py[j]);
    }
    sum.abs()
}
