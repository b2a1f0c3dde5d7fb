//! Dimensionality validation and loop-dimension broadcasting.
//!
//! An image may carry extra leading axes in front of its two spatial axes.
//! The same geometric transform is applied to every 2-D slice along those
//! axes, so they are flattened into a single loop index before dispatch. A
//! plain 2-D image gets a synthetic loop of length one, giving downstream
//! code a single iteration model.
//!
//! ```text
//! image  (a, b, ny, nx)  ──►  (a·b, ny, nx)     loop_count = a·b
//! image  (ny, nx)        ──►  (1, ny, nx)       synthetic loop
//! ```

use ndarray::{Array3, ArrayViewD};

use crate::error::{ReprojectError, ReprojectResult};
use crate::sky::SkyProjection;

/// Number of spatial axes supported by exact reprojection.
pub const SPATIAL_DIMS: usize = 2;

/// Validated split of input and output shapes into loop and spatial parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLayout {
    loop_shape: Vec<usize>,
    loop_count: usize,
    input_spatial: (usize, usize),
    output_spatial: (usize, usize),
    output_shape: Vec<usize>,
}

impl LoopLayout {
    /// Validates an image shape and a declared output shape against the two
    /// grids.
    ///
    /// # Errors
    ///
    /// Returns a dimensionality error when:
    /// - either grid is not 2-dimensional
    /// - the output shape or image has fewer axes than its grid
    /// - image and output ranks differ
    /// - the leading loop axes differ
    /// - any axis has zero length
    /// - a grid declares a spatial shape that the arrays do not match
    pub fn validate(
        image_shape: &[usize],
        output_shape: &[usize],
        input: &dyn SkyProjection,
        output: &dyn SkyProjection,
    ) -> ReprojectResult<Self> {
        let in_dims = input.pixel_n_dim();
        let out_dims = output.pixel_n_dim();

        if in_dims != SPATIAL_DIMS {
            return Err(ReprojectError::UnsupportedSpatialRank(in_dims));
        }
        if out_dims != SPATIAL_DIMS {
            return Err(ReprojectError::UnsupportedSpatialRank(out_dims));
        }
        if output_shape.len() < out_dims {
            return Err(ReprojectError::OutputShapeTooShort {
                shape: output_shape.to_vec(),
                required: out_dims,
            });
        }
        if image_shape.len() < in_dims {
            return Err(ReprojectError::InputShapeTooShort {
                shape: image_shape.to_vec(),
                required: in_dims,
            });
        }
        if image_shape.len() != output_shape.len() {
            return Err(ReprojectError::RankMismatch {
                input: image_shape.to_vec(),
                output: output_shape.to_vec(),
            });
        }

        let split = image_shape.len() - SPATIAL_DIMS;
        let (loop_in, spatial_in) = image_shape.split_at(split);
        let (loop_out, spatial_out) = output_shape.split_at(split);
        if loop_in != loop_out {
            return Err(ReprojectError::LoopDimensionMismatch {
                input: loop_in.to_vec(),
                output: loop_out.to_vec(),
            });
        }

        for shape in [image_shape, output_shape] {
            if let Some(axis) = shape.iter().position(|&n| n == 0) {
                return Err(ReprojectError::EmptyAxis {
                    shape: shape.to_vec(),
                    axis,
                });
            }
        }

        let input_spatial = (spatial_in[0], spatial_in[1]);
        let output_spatial = (spatial_out[0], spatial_out[1]);
        for (projection, actual) in [(input, input_spatial), (output, output_spatial)] {
            if let Some(declared) = projection.pixel_shape() {
                if declared != actual {
                    return Err(ReprojectError::SpatialShapeMismatch { declared, actual });
                }
            }
        }

        Ok(Self {
            loop_shape: loop_in.to_vec(),
            loop_count: loop_in.iter().product(),
            input_spatial,
            output_spatial,
            output_shape: output_shape.to_vec(),
        })
    }

    /// True when the caller passed plain 2-D arrays and the loop axis was
    /// synthesized.
    pub fn is_synthetic(&self) -> bool {
        self.loop_shape.is_empty()
    }

    /// Leading loop axes as declared by the caller (empty when synthetic).
    pub fn loop_shape(&self) -> &[usize] {
        &self.loop_shape
    }

    /// Number of 2-D slices to reproject (1 when synthetic).
    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    /// Input spatial shape `(ny_in, nx_in)`.
    pub fn input_spatial(&self) -> (usize, usize) {
        self.input_spatial
    }

    /// Output spatial shape `(ny_out, nx_out)`.
    pub fn output_spatial(&self) -> (usize, usize) {
        self.output_spatial
    }

    /// Declared output shape, including loop axes.
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Flattens `image` into a contiguous `(loop_count, ny_in, nx_in)` stack
    /// of `f64`, converting the element type.
    ///
    /// The image must have the shape this layout was validated against.
    pub fn flatten<T>(&self, image: ArrayViewD<'_, T>) -> ReprojectResult<Array3<f64>>
    where
        T: Copy + Into<f64>,
    {
        let (ny, nx) = self.input_spatial;
        let expected: Vec<usize> = self
            .loop_shape
            .iter()
            .copied()
            .chain([ny, nx])
            .collect();
        if image.shape() != expected.as_slice() {
            return Err(ReprojectError::RankMismatch {
                input: image.shape().to_vec(),
                output: expected,
            });
        }

        let data: Vec<f64> = image.iter().map(|&v| v.into()).collect();
        Array3::from_shape_vec((self.loop_count, ny, nx), data).map_err(|_| {
            ReprojectError::RankMismatch {
                input: image.shape().to_vec(),
                output: vec![self.loop_count, ny, nx],
            }
        })
    }
}
