//! Frame harmonization of input and output corner coordinates.
//!
//! Input corners are re-expressed in the output grid's frame so both sets of
//! positions are directly comparable, and each input corner is located in
//! output pixel space once, up front:
//!
//! ```text
//! input corners (input frame) ──convert──► input corners (output frame)
//!                                                │
//!                                     output.world_to_pixel
//!                                                ▼
//!                                     xp_inout, yp_inout
//! ```

use ndarray::Array2;
use tracing::warn;

use crate::grid::CornerGrid;
use crate::pool::WorkerPool;
use crate::sky::{LonLat, SkyProjection};

/// Coordinate arrays consumed by the overlap kernel.
///
/// All arrays are in standard (row-major, contiguous) layout. Input arrays
/// have shape `(ny_in + 1, nx_in + 1)`; output arrays `(ny_out + 1, nx_out + 1)`.
/// World coordinates are longitude/latitude in degrees, in the output frame.
#[derive(Debug, Clone)]
pub struct HarmonizedCoords {
    /// Output-pixel x of every input corner.
    pub xp_inout: Array2<f64>,
    /// Output-pixel y of every input corner.
    pub yp_inout: Array2<f64>,
    /// Input corner longitudes.
    pub xw_in: Array2<f64>,
    /// Input corner latitudes.
    pub yw_in: Array2<f64>,
    /// Output corner longitudes.
    pub xw_out: Array2<f64>,
    /// Output corner latitudes.
    pub yw_out: Array2<f64>,
}

impl HarmonizedCoords {
    /// Harmonizes `input` corners into the frame of `output`, locating each
    /// input corner in the pixel space of `output_projection`.
    pub fn build(
        input: &CornerGrid,
        output: &CornerGrid,
        output_projection: &dyn SkyProjection,
    ) -> Self {
        Self::build_in(&WorkerPool::inline(), input, output, output_projection)
    }

    /// Same as [`build`](Self::build), locating corner rows on `pool`.
    pub fn build_in(
        pool: &WorkerPool,
        input: &CornerGrid,
        output: &CornerGrid,
        output_projection: &dyn SkyProjection,
    ) -> Self {
        let input = input.to_frame(output.frame());
        let (rows, cols) = input.dim();
        let (lon, lat) = (input.lon(), input.lat());

        let located: Vec<Vec<Option<(f64, f64)>>> = pool.map_indexed(rows, |j| {
            (0..cols)
                .map(|i| output_projection.world_to_pixel(LonLat::new(lon[[j, i]], lat[[j, i]])))
                .collect()
        });

        let mut xp_inout = Array2::from_elem((rows, cols), f64::NAN);
        let mut yp_inout = Array2::from_elem((rows, cols), f64::NAN);
        for (j, row) in located.iter().enumerate() {
            for (i, pos) in row.iter().enumerate() {
                if let Some((x, y)) = *pos {
                    xp_inout[[j, i]] = x;
                    yp_inout[[j, i]] = y;
                }
            }
        }

        let (xw_in, yw_in) = input.into_arrays();
        Self {
            xp_inout,
            yp_inout,
            xw_in: xw_in.as_standard_layout().into_owned(),
            yw_in: yw_in.as_standard_layout().into_owned(),
            xw_out: output.lon().as_standard_layout().into_owned(),
            yw_out: output.lat().as_standard_layout().into_owned(),
        }
    }

    /// Input pixel grid shape `(ny_in, nx_in)`.
    pub fn input_pixel_dim(&self) -> (usize, usize) {
        let (rows, cols) = self.xp_inout.dim();
        (rows.saturating_sub(1), cols.saturating_sub(1))
    }

    /// Output pixel grid shape `(ny_out, nx_out)`.
    pub fn output_pixel_dim(&self) -> (usize, usize) {
        let (rows, cols) = self.xw_out.dim();
        (rows.saturating_sub(1), cols.saturating_sub(1))
    }
}

/// Which side of the reprojection a grid is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridRole {
    Input,
    Output,
}

impl std::fmt::Display for GridRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridRole::Input => f.write_str("input"),
            GridRole::Output => f.write_str("output"),
        }
    }
}

/// Non-fatal notice that a grid's pixels are too small for accurate overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionAdvisory {
    pub grid: GridRole,
    /// Pixel area in deg².
    pub pixel_area: f64,
    /// Threshold it fell below, in deg².
    pub threshold: f64,
}

/// Checks both grids against the minimum pixel area and logs a warning for
/// each grid below it. Grids without a known pixel area are not checked.
pub fn check_precision(
    input: &dyn SkyProjection,
    output: &dyn SkyProjection,
    min_pixel_area: f64,
) -> Vec<PrecisionAdvisory> {
    let mut advisories = Vec::new();
    for (grid, projection) in [(GridRole::Input, input), (GridRole::Output, output)] {
        if let Some(area) = projection.pixel_area() {
            if area < min_pixel_area {
                warn!(
                    grid = %grid,
                    pixel_area = area,
                    threshold = min_pixel_area,
                    "Exact reprojection has precision issues with resolutions below ~0.05 arcsec; \
                     results may not be accurate"
                );
                advisories.push(PrecisionAdvisory {
                    grid,
                    pixel_area: area,
                    threshold: min_pixel_area,
                });
            }
        }
    }
    advisories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::{CelestialFrame, TanProjection, DEFAULT_MIN_PIXEL_AREA};

    fn grid_pair() -> (TanProjection, TanProjection) {
        let input = TanProjection::new((4.5, 3.5), (30.0, 10.0), (-0.01, 0.01));
        let output = TanProjection::new((5.0, 4.0), (30.0, 10.0), (-0.01, 0.01));
        (input, output)
    }

    #[test]
    fn test_shapes() {
        let (input, output) = grid_pair();
        let cin = CornerGrid::sample(&input, 6, 8);
        let cout = CornerGrid::sample(&output, 7, 9);
        let coords = HarmonizedCoords::build(&cin, &cout, &output);

        assert_eq!(coords.xp_inout.dim(), (7, 9));
        assert_eq!(coords.xw_out.dim(), (8, 10));
        assert_eq!(coords.input_pixel_dim(), (6, 8));
        assert_eq!(coords.output_pixel_dim(), (7, 9));
        assert!(coords.xp_inout.is_standard_layout());
    }

    #[test]
    fn test_shifted_grid_offsets_pixels() {
        // Output reference pixel is +0.5 in both axes relative to input
        let (input, output) = grid_pair();
        let cin = CornerGrid::sample(&input, 6, 8);
        let cout = CornerGrid::sample(&output, 6, 8);
        let coords = HarmonizedCoords::build(&cin, &cout, &output);

        for ((j, i), &xp) in coords.xp_inout.indexed_iter() {
            let expected_x = i as f64 - 0.5 + 0.5;
            let expected_y = j as f64 - 0.5 + 0.5;
            assert!((xp - expected_x).abs() < 1e-8, "x at {},{}: {}", j, i, xp);
            assert!((coords.yp_inout[[j, i]] - expected_y).abs() < 1e-8);
        }
    }

    #[test]
    fn test_input_world_in_output_frame() {
        let input = TanProjection::new((2.0, 2.0), (266.4, -28.9), (-0.1, 0.1));
        let output = TanProjection::new((2.0, 2.0), (0.0, 0.0), (-0.1, 0.1))
            .with_frame(CelestialFrame::Galactic);
        let cin = CornerGrid::sample(&input, 3, 3);
        let cout = CornerGrid::sample(&output, 3, 3);
        let coords = HarmonizedCoords::build(&cin, &cout, &output);

        // Input center is near the Galactic center, so its galactic latitude is small
        let center_lat = coords.yw_in[[2, 2]];
        assert!(center_lat.abs() < 0.2, "center galactic latitude {}", center_lat);
        // And it lands near the output reference pixel (0-based 1.0)
        assert!((coords.xp_inout[[2, 2]] - 1.5).abs() < 2.0);
    }

    #[test]
    fn test_unrepresentable_corners_are_nan() {
        let input = TanProjection::new((2.0, 2.0), (0.0, 0.0), (-10.0, 10.0));
        let output = TanProjection::new((2.0, 2.0), (180.0, 0.0), (-0.1, 0.1));
        let cin = CornerGrid::sample(&input, 2, 2);
        let cout = CornerGrid::sample(&output, 2, 2);
        let coords = HarmonizedCoords::build(&cin, &cout, &output);
        assert!(coords.xp_inout.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_precision_advisory_for_tiny_pixels() {
        let tiny = TanProjection::new((1.0, 1.0), (0.0, 0.0), (-1e-6, 1e-6));
        let normal = TanProjection::new((1.0, 1.0), (0.0, 0.0), (-1e-3, 1e-3));

        let advisories = check_precision(&tiny, &normal, DEFAULT_MIN_PIXEL_AREA);
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].grid, GridRole::Input);

        let advisories = check_precision(&normal, &tiny, DEFAULT_MIN_PIXEL_AREA);
        assert_eq!(advisories[0].grid, GridRole::Output);

        assert!(check_precision(&normal, &normal, DEFAULT_MIN_PIXEL_AREA).is_empty());
    }
}
