//! Celestial reference frames and conversions between them.

use std::fmt;
use std::str::FromStr;

use super::LonLat;

/// Rotation taking ICRS unit vectors to Galactic unit vectors.
///
/// Rows are the Galactic x, y, z axes expressed in ICRS.
const ICRS_TO_GALACTIC: [[f64; 3]; 3] = [
    [-0.054_875_560_416_215_4, -0.873_437_090_234_885, -0.483_835_015_548_713_2],
    [0.494_109_427_875_583_7, -0.444_829_629_960_011_2, 0.746_982_244_497_218_9],
    [-0.867_666_149_019_004_7, -0.198_076_373_431_201_5, 0.455_983_776_175_066_9],
];

/// Reference frame of a grid's world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum CelestialFrame {
    /// International Celestial Reference System (RA/Dec).
    #[default]
    Icrs,
    /// Galactic coordinates (l/b).
    Galactic,
}

impl CelestialFrame {
    /// Short lowercase name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            CelestialFrame::Icrs => "icrs",
            CelestialFrame::Galactic => "galactic",
        }
    }

    /// Re-expresses `pos`, given in `self`, in the `target` frame.
    pub fn convert(&self, pos: LonLat, target: CelestialFrame) -> LonLat {
        if *self == target || !pos.is_finite() {
            return pos;
        }
        let v = pos.to_unit_vector();
        let rotated = match (self, target) {
            (CelestialFrame::Icrs, CelestialFrame::Galactic) => rotate(&ICRS_TO_GALACTIC, v),
            (CelestialFrame::Galactic, CelestialFrame::Icrs) => rotate_transposed(&ICRS_TO_GALACTIC, v),
            _ => v,
        };
        LonLat::from_unit_vector(rotated)
    }
}

impl fmt::Display for CelestialFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CelestialFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "icrs" | "fk5" | "equatorial" => Ok(CelestialFrame::Icrs),
            "galactic" | "gal" => Ok(CelestialFrame::Galactic),
            other => Err(format!("unknown celestial frame '{}'", other)),
        }
    }
}

#[inline]
fn rotate(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

#[inline]
fn rotate_transposed(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}
