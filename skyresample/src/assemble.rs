//! Result assembly.
//!
//! Per-loop-index slices are collected back into the declared output shape.
//! A synthetic loop yields the bare 2-D slice; otherwise slices are stacked
//! along a leading axis and reshaped to `loop_shape × (ny_out, nx_out)`.

use ndarray::{Array2, ArrayD, IxDyn};

use crate::accumulate::NormalizedSlice;
use crate::error::{ReprojectError, ReprojectResult};
use crate::shape::LoopLayout;

/// Output of an exact reprojection.
#[derive(Debug, Clone, PartialEq)]
pub struct Reprojection {
    /// Resampled image with the declared output shape. NaN marks output
    /// pixels no input pixel covered.
    pub image: ArrayD<f64>,
    /// Total overlap weight per output pixel, when requested.
    pub footprint: Option<ArrayD<f64>>,
}

impl Reprojection {
    pub fn shape(&self) -> &[usize] {
        self.image.shape()
    }

    /// Splits into `(image, footprint)`.
    pub fn into_parts(self) -> (ArrayD<f64>, Option<ArrayD<f64>>) {
        (self.image, self.footprint)
    }
}

/// Collects normalized slices in loop order.
#[derive(Debug)]
pub struct Assembler {
    output_shape: Vec<usize>,
    synthetic: bool,
    expected: usize,
    want_footprint: bool,
    images: Vec<Array2<f64>>,
    footprints: Vec<Array2<f64>>,
}

impl Assembler {
    pub fn new(layout: &LoopLayout, want_footprint: bool) -> Self {
        Self {
            output_shape: layout.output_shape().to_vec(),
            synthetic: layout.is_synthetic(),
            expected: layout.loop_count(),
            want_footprint,
            images: Vec::with_capacity(layout.loop_count()),
            footprints: Vec::new(),
        }
    }

    /// Appends the slice for the next loop index.
    pub fn push(&mut self, slice: NormalizedSlice) {
        self.images.push(slice.image);
        if self.want_footprint {
            self.footprints.push(slice.footprint);
        }
    }

    /// Number of slices collected so far.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Builds the final arrays.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError::IncompleteResult`] if fewer or more slices
    /// were pushed than the layout's loop count.
    pub fn finish(self) -> ReprojectResult<Reprojection> {
        if self.images.len() != self.expected {
            return Err(ReprojectError::IncompleteResult {
                expected: self.expected,
                actual: self.images.len(),
            });
        }

        let image = stack(&self.output_shape, self.synthetic, self.images)?;
        let footprint = if self.want_footprint {
            Some(stack(&self.output_shape, self.synthetic, self.footprints)?)
        } else {
            None
        };
        Ok(Reprojection { image, footprint })
    }
}

fn stack(shape: &[usize], synthetic: bool, slices: Vec<Array2<f64>>) -> ReprojectResult<ArrayD<f64>> {
    let actual = slices.len();
    if synthetic {
        return slices
            .into_iter()
            .next()
            .map(|slice| slice.into_dyn())
            .ok_or(ReprojectError::IncompleteResult {
                expected: 1,
                actual,
            });
    }

    let per_slice: usize = shape.iter().rev().take(2).product();
    let mut data = Vec::with_capacity(per_slice * actual);
    for slice in &slices {
        data.extend(slice.iter().copied());
    }
    ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|_| ReprojectError::IncompleteResult {
        expected: shape.iter().product::<usize>() / per_slice.max(1),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::TanProjection;
    use ndarray::array;

    fn layout(image: &[usize], output: &[usize]) -> LoopLayout {
        let tan = TanProjection::new((1.0, 1.0), (0.0, 0.0), (-0.1, 0.1));
        LoopLayout::validate(image, output, &tan, &tan).unwrap()
    }

    fn slice(value: f64) -> NormalizedSlice {
        NormalizedSlice {
            image: Array2::from_elem((2, 3), value),
            footprint: Array2::from_elem((2, 3), value * 10.0),
        }
    }

    #[test]
    fn test_synthetic_returns_2d() {
        let mut asm = Assembler::new(&layout(&[4, 4], &[2, 3]), true);
        asm.push(NormalizedSlice {
            image: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            footprint: Array2::ones((2, 3)),
        });
        let result = asm.finish().unwrap();
        assert_eq!(result.shape(), &[2, 3]);
        assert_eq!(result.image[[1, 2]], 6.0);
        assert_eq!(result.footprint.unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn test_stacks_loop_dims() {
        let mut asm = Assembler::new(&layout(&[2, 3, 4, 4], &[2, 3, 2, 3]), true);
        for k in 0..6 {
            asm.push(slice(k as f64));
        }
        assert_eq!(asm.len(), 6);

        let (image, footprint) = asm.finish().unwrap().into_parts();
        assert_eq!(image.shape(), &[2, 3, 2, 3]);
        // Loop index (1, 2) is flat index 5
        assert_eq!(image[[1, 2, 0, 0]], 5.0);
        assert_eq!(image[[0, 1, 1, 2]], 1.0);
        assert_eq!(footprint.unwrap()[[1, 0, 1, 1]], 30.0);
    }

    #[test]
    fn test_footprint_suppressed() {
        let mut asm = Assembler::new(&layout(&[5, 4, 4], &[5, 2, 3]), false);
        for k in 0..5 {
            asm.push(slice(k as f64));
        }
        let result = asm.finish().unwrap();
        assert!(result.footprint.is_none());
        assert_eq!(result.shape(), &[5, 2, 3]);
    }

    #[test]
    fn test_missing_slices_rejected() {
        let mut asm = Assembler::new(&layout(&[3, 4, 4], &[3, 2, 3]), true);
        asm.push(slice(0.0));
        let err = asm.finish().unwrap_err();
        assert!(matches!(
            err,
            ReprojectError::IncompleteResult {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_empty_synthetic_rejected() {
        let asm = Assembler::new(&layout(&[4, 4], &[2, 3]), false);
        assert!(asm.is_empty());
        assert!(asm.finish().is_err());
    }
}
