//! Pixel-corner world coordinates.
//!
//! Exact overlap treats every pixel as the quadrilateral bounded by its four
//! corners, so both grids are sampled at corner positions rather than
//! centers: for a grid of `ny × nx` pixels the sampler evaluates
//! `(ny + 1) × (nx + 1)` points at pixel coordinates offset by −0.5.
//!
//! ```text
//!   (-0.5,-0.5) ─── (0.5,-0.5) ─── (1.5,-0.5)
//!        │    pixel 0,0  │   pixel 0,1   │
//!   (-0.5, 0.5) ─── (0.5, 0.5) ─── (1.5, 0.5)
//! ```

use ndarray::Array2;

use crate::pool::WorkerPool;
use crate::sky::{CelestialFrame, LonLat, SkyProjection};

/// World coordinates of every pixel corner of a grid.
///
/// Arrays are indexed `[row, col]` with shape `(ny + 1, nx + 1)`. Corners the
/// projection cannot represent hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerGrid {
    lon: Array2<f64>,
    lat: Array2<f64>,
    frame: CelestialFrame,
}

impl CornerGrid {
    /// Samples the corners of an `ny × nx` pixel grid through `projection`
    /// on the calling thread.
    pub fn sample(projection: &dyn SkyProjection, ny: usize, nx: usize) -> Self {
        Self::sample_in(&WorkerPool::inline(), projection, ny, nx)
    }

    /// Samples corners row by row on `pool`.
    pub fn sample_in(
        pool: &WorkerPool,
        projection: &dyn SkyProjection,
        ny: usize,
        nx: usize,
    ) -> Self {
        let rows: Vec<Vec<LonLat>> = pool.map_indexed(ny + 1, |j| {
            let y = j as f64 - 0.5;
            (0..=nx)
                .map(|i| {
                    projection
                        .pixel_to_world(i as f64 - 0.5, y)
                        .unwrap_or(LonLat::UNDEFINED)
                })
                .collect()
        });

        let shape = (ny + 1, nx + 1);
        let mut lon = Array2::zeros(shape);
        let mut lat = Array2::zeros(shape);
        for (j, row) in rows.iter().enumerate() {
            for (i, pos) in row.iter().enumerate() {
                lon[[j, i]] = pos.lon;
                lat[[j, i]] = pos.lat;
            }
        }

        Self {
            lon,
            lat,
            frame: projection.frame(),
        }
    }

    /// Builds a corner grid from precomputed arrays.
    ///
    /// Returns `None` if the arrays differ in shape.
    pub fn from_arrays(lon: Array2<f64>, lat: Array2<f64>, frame: CelestialFrame) -> Option<Self> {
        if lon.dim() != lat.dim() {
            return None;
        }
        Some(Self { lon, lat, frame })
    }

    /// Re-expresses every corner in `target`.
    pub fn to_frame(&self, target: CelestialFrame) -> CornerGrid {
        if target == self.frame {
            return self.clone();
        }
        let mut lon = self.lon.clone();
        let mut lat = self.lat.clone();
        for ((lo, la), (&src_lo, &src_la)) in lon
            .iter_mut()
            .zip(lat.iter_mut())
            .zip(self.lon.iter().zip(self.lat.iter()))
        {
            let converted = self.frame.convert(LonLat::new(src_lo, src_la), target);
            *lo = converted.lon;
            *la = converted.lat;
        }
        CornerGrid {
            lon,
            lat,
            frame: target,
        }
    }

    /// Corner array shape `(ny + 1, nx + 1)`.
    pub fn dim(&self) -> (usize, usize) {
        self.lon.dim()
    }

    /// Pixel grid shape `(ny, nx)` bounded by these corners.
    pub fn pixel_dim(&self) -> (usize, usize) {
        let (rows, cols) = self.dim();
        (rows.saturating_sub(1), cols.saturating_sub(1))
    }

    /// Corner at `[row, col]`.
    pub fn get(&self, row: usize, col: usize) -> LonLat {
        LonLat::new(self.lon[[row, col]], self.lat[[row, col]])
    }

    pub fn lon(&self) -> &Array2<f64> {
        &self.lon
    }

    pub fn lat(&self) -> &Array2<f64> {
        &self.lat
    }

    pub fn frame(&self) -> CelestialFrame {
        self.frame
    }

    /// Consumes the grid, returning `(lon, lat)`.
    pub fn into_arrays(self) -> (Array2<f64>, Array2<f64>) {
        (self.lon, self.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::TanProjection;

    /// Projection undefined on the left half of the grid.
    struct HalfPlane;

    impl SkyProjection for HalfPlane {
        fn pixel_to_world(&self, x: f64, y: f64) -> Option<LonLat> {
            (x >= 0.0).then(|| LonLat::new(x, y))
        }

        fn world_to_pixel(&self, world: LonLat) -> Option<(f64, f64)> {
            Some((world.lon, world.lat))
        }

        fn frame(&self) -> CelestialFrame {
            CelestialFrame::Icrs
        }
    }

    #[test]
    fn test_corner_grid_shape() {
        let proj = TanProjection::new((5.5, 3.5), (10.0, 20.0), (-0.1, 0.1));
        let grid = CornerGrid::sample(&proj, 6, 10);
        assert_eq!(grid.dim(), (7, 11));
        assert_eq!(grid.pixel_dim(), (6, 10));
    }

    #[test]
    fn test_corners_are_half_pixel_offsets() {
        let proj = TanProjection::new((5.5, 3.5), (10.0, 20.0), (-0.1, 0.1));
        let grid = CornerGrid::sample(&proj, 6, 10);

        let expected = proj.pixel_to_world(-0.5, -0.5).unwrap();
        assert_eq!(grid.get(0, 0), expected);

        let expected = proj.pixel_to_world(9.5, 5.5).unwrap();
        assert_eq!(grid.get(6, 10), expected);

        let expected = proj.pixel_to_world(2.5, 0.5).unwrap();
        assert_eq!(grid.get(1, 3), expected);
    }

    #[test]
    fn test_undefined_corners_are_nan() {
        let grid = CornerGrid::sample(&HalfPlane, 2, 2);
        // Column 0 is at x = -0.5
        assert!(grid.lon()[[0, 0]].is_nan());
        assert!(grid.lat()[[1, 0]].is_nan());
        assert_eq!(grid.get(0, 1), LonLat::new(0.5, -0.5));
    }

    #[test]
    fn test_frame_recorded() {
        let proj = TanProjection::new((1.0, 1.0), (0.0, 0.0), (-0.1, 0.1))
            .with_frame(CelestialFrame::Galactic);
        let grid = CornerGrid::sample(&proj, 1, 1);
        assert_eq!(grid.frame(), CelestialFrame::Galactic);
    }

    #[test]
    fn test_to_frame_roundtrip() {
        let proj = TanProjection::new((2.5, 2.5), (150.0, -30.0), (-0.5, 0.5));
        let grid = CornerGrid::sample(&proj, 4, 4);
        let back = grid
            .to_frame(CelestialFrame::Galactic)
            .to_frame(CelestialFrame::Icrs);
        for (a, b) in grid.lat().iter().zip(back.lat().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_from_arrays_rejects_mismatched_shapes() {
        let lon = Array2::zeros((2, 3));
        let lat = Array2::zeros((3, 2));
        assert!(CornerGrid::from_arrays(lon, lat, CelestialFrame::Icrs).is_none());
    }
}
