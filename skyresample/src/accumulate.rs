//! Accumulation and normalization of partial kernel results.
//!
//! Partial sums from every window of one loop index are added elementwise,
//! in window order, then the weighted sum is divided by the weight:
//!
//! ```text
//! image[p]     = Σ weighted_sum[p] / Σ weight[p]     (NaN where Σ weight[p] == 0)
//! footprint[p] = Σ weight[p]
//! ```
//!
//! A zero weight means no input pixel covered `p`. It produces NaN in the
//! image, silently, and is the documented way callers detect uncovered
//! regions.

use ndarray::Array2;

use crate::kernel::{KernelError, PartialSums};
use crate::pool::WorkerPool;

/// Resampled image and footprint for one loop index.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSlice {
    /// Weighted-sum over weight, NaN where the weight is zero.
    pub image: Array2<f64>,
    /// Total overlap weight per output pixel.
    pub footprint: Array2<f64>,
}

/// Running elementwise sum of partial results for one loop index.
#[derive(Debug, Clone)]
pub struct Accumulator {
    totals: PartialSums,
    partials: usize,
}

impl Accumulator {
    /// Creates an accumulator for an output grid of shape `(ny_out, nx_out)`.
    pub fn new(out_shape: (usize, usize)) -> Self {
        Self {
            totals: PartialSums::zeros(out_shape),
            partials: 0,
        }
    }

    /// Adds one partial result.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ShapeMismatch`] if the partial does not cover
    /// the full output grid.
    pub fn add(&mut self, partial: &PartialSums) -> Result<(), KernelError> {
        let expected = self.totals.dim();
        for (what, actual) in [
            ("partial weighted_sum", partial.weighted_sum.dim()),
            ("partial weight", partial.weight.dim()),
        ] {
            if actual != expected {
                return Err(KernelError::ShapeMismatch {
                    what,
                    expected,
                    actual,
                });
            }
        }

        self.totals.weighted_sum += &partial.weighted_sum;
        self.totals.weight += &partial.weight;
        self.partials += 1;
        Ok(())
    }

    /// Number of partials added so far.
    pub fn partials(&self) -> usize {
        self.partials
    }

    /// Current totals.
    pub fn totals(&self) -> &PartialSums {
        &self.totals
    }

    /// Divides the totals, producing the image and footprint.
    pub fn finish(self) -> NormalizedSlice {
        self.finish_in(&WorkerPool::inline())
    }

    /// Same as [`finish`](Self::finish), dividing rows on `pool`.
    pub fn finish_in(self, pool: &WorkerPool) -> NormalizedSlice {
        let image = normalize_in(pool, &self.totals.weighted_sum, &self.totals.weight);
        NormalizedSlice {
            image,
            footprint: self.totals.weight,
        }
    }
}

/// Elementwise `weighted_sum / weight`, with NaN wherever `weight` is zero.
///
/// Both arrays must have the same shape.
pub fn normalize(weighted_sum: &Array2<f64>, weight: &Array2<f64>) -> Array2<f64> {
    normalize_in(&WorkerPool::inline(), weighted_sum, weight)
}

/// [`normalize`] with rows divided on `pool`.
pub fn normalize_in(
    pool: &WorkerPool,
    weighted_sum: &Array2<f64>,
    weight: &Array2<f64>,
) -> Array2<f64> {
    let (ny, nx) = weight.dim();
    let rows: Vec<Vec<f64>> = pool.map_indexed(ny, |j| {
        weighted_sum
            .row(j)
            .iter()
            .zip(weight.row(j))
            .map(|(&sum, &w)| if w == 0.0 { f64::NAN } else { sum / w })
            .collect()
    });
    Array2::from_shape_fn((ny, nx), |(j, i)| rows[j][i])
}

/// Combines partial results in iteration order and normalizes them.
pub fn combine<I>(out_shape: (usize, usize), partials: I) -> Result<NormalizedSlice, KernelError>
where
    I: IntoIterator<Item = PartialSums>,
{
    let mut acc = Accumulator::new(out_shape);
    for partial in partials {
        acc.add(&partial)?;
    }
    Ok(acc.finish())
}
