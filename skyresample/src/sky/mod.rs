//! Sky projection capability.
//!
//! A pixel grid is described by a [`SkyProjection`]: a mapping from 0-based
//! pixel coordinates to positions on the celestial sphere and back, tied to a
//! [`CelestialFrame`]. The reprojection pipeline only consumes this contract;
//! [`TanProjection`] is the built-in implementation.
//!
//! # Conventions
//!
//! ```text
//! pixel (x, y)          0-based, pixel centers at integers, corners at ±0.5
//! world (lon, lat)      degrees, lon in [0, 360), lat in [-90, 90]
//! ```

mod frame;
mod tan;

pub use frame::CelestialFrame;
pub use tan::TanProjection;

/// Threshold below which pixel scales degrade overlap precision (deg²).
///
/// Corresponds to pixels of roughly 0.05 arcsec on a side.
pub const DEFAULT_MIN_PIXEL_AREA: f64 = (0.05 / 3600.0) * (0.05 / 3600.0);

/// A position on the sky, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    /// Longitude (right ascension or galactic longitude).
    pub lon: f64,
    /// Latitude (declination or galactic latitude).
    pub lat: f64,
}

impl LonLat {
    /// Position marking an undefined projection result.
    pub const UNDEFINED: LonLat = LonLat {
        lon: f64::NAN,
        lat: f64::NAN,
    };

    /// Creates a new position from degrees.
    #[inline]
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns true when both components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// Converts to a unit vector on the sphere.
    #[inline]
    pub fn to_unit_vector(self) -> [f64; 3] {
        let (sin_lon, cos_lon) = self.lon.to_radians().sin_cos();
        let (sin_lat, cos_lat) = self.lat.to_radians().sin_cos();
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
    }

    /// Converts a unit vector back to longitude/latitude.
    ///
    /// Longitude is wrapped into `[0, 360)`.
    #[inline]
    pub fn from_unit_vector(v: [f64; 3]) -> Self {
        let lon = v[1].atan2(v[0]).to_degrees();
        let lat = v[2].atan2(v[0].hypot(v[1])).to_degrees();
        Self {
            lon: wrap_longitude(lon),
            lat,
        }
    }
}

/// Wraps a longitude in degrees into `[0, 360)`.
#[inline]
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Coordinate-system capability of a pixel grid.
///
/// Implementations must be thread-safe (`Send + Sync`) since coordinate
/// construction may run alongside worker threads.
pub trait SkyProjection: Send + Sync {
    /// Number of pixel axes the projection describes.
    fn pixel_n_dim(&self) -> usize {
        2
    }

    /// Maps a 0-based pixel position to the sky.
    ///
    /// Returns `None` where the projection is undefined.
    fn pixel_to_world(&self, x: f64, y: f64) -> Option<LonLat>;

    /// Maps a sky position, expressed in [`frame`](Self::frame), to pixel space.
    ///
    /// Returns `None` where the projection is undefined.
    fn world_to_pixel(&self, world: LonLat) -> Option<(f64, f64)>;

    /// Reference frame of the world coordinates.
    fn frame(&self) -> CelestialFrame;

    /// Projection-plane pixel area in deg², when it can be computed.
    fn pixel_area(&self) -> Option<f64> {
        None
    }

    /// Declared spatial shape `(ny, nx)`, when known.
    fn pixel_shape(&self) -> Option<(usize, usize)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_vector_roundtrip() {
        let pos = LonLat::new(123.4, -56.7);
        let back = LonLat::from_unit_vector(pos.to_unit_vector());
        assert!((back.lon - pos.lon).abs() < 1e-10);
        assert!((back.lat - pos.lat).abs() < 1e-10);
    }

    #[test]
    fn test_unit_vector_is_normalized() {
        let v = LonLat::new(10.0, 80.0).to_unit_vector();
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(370.0), 10.0);
        assert_eq!(wrap_longitude(-10.0), 350.0);
        assert_eq!(wrap_longitude(0.0), 0.0);
        assert!(wrap_longitude(-1e-20) < 360.0);
    }

    #[test]
    fn test_undefined_is_not_finite() {
        assert!(!LonLat::UNDEFINED.is_finite());
        assert!(LonLat::new(0.0, 0.0).is_finite());
    }

    #[test]
    fn test_default_min_pixel_area() {
        // (0.05 arcsec)² expressed in deg²
        assert!((DEFAULT_MIN_PIXEL_AREA - 1.929e-10).abs() < 1e-12);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_unit_vector_roundtrip_property(
                lon in 0.0..360.0_f64,
                lat in -89.9..89.9_f64
            ) {
                let back = LonLat::from_unit_vector(LonLat::new(lon, lat).to_unit_vector());
                let dlon = (back.lon - lon).abs();
                let dlon = dlon.min(360.0 - dlon);
                prop_assert!(dlon < 1e-8, "lon {} -> {}", lon, back.lon);
                prop_assert!((back.lat - lat).abs() < 1e-8, "lat {} -> {}", lat, back.lat);
            }
        }
    }
}
