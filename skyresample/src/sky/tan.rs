//! Gnomonic (TAN) projection.
//!
//! Follows the FITS WCS conventions: `crpix` is 1-based, the linear part is
//! built from `cdelt` and a `crota2` rotation, and the native pole sits at
//! `crval` with `phi_p = 180°`.

use std::f64::consts::PI;

use super::{wrap_longitude, CelestialFrame, LonLat, SkyProjection};

/// Native longitude of the celestial pole for zenithal projections.
const PHI_P: f64 = PI;

/// Gnomonic sky projection.
#[derive(Debug, Clone, PartialEq)]
pub struct TanProjection {
    crpix: (f64, f64),
    crval: LonLat,
    cdelt: (f64, f64),
    crota2: f64,
    frame: CelestialFrame,
    shape: Option<(usize, usize)>,
    cd: [[f64; 2]; 2],
    cd_inv: Option<[[f64; 2]; 2]>,
}

impl TanProjection {
    /// Creates a projection centered on `crval` (degrees) at reference pixel
    /// `crpix` (1-based), with pixel scales `cdelt` in degrees.
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cdelt: (f64, f64)) -> Self {
        let mut proj = Self {
            crpix,
            crval: LonLat::new(crval.0, crval.1),
            cdelt,
            crota2: 0.0,
            frame: CelestialFrame::Icrs,
            shape: None,
            cd: [[0.0; 2]; 2],
            cd_inv: None,
        };
        proj.update_matrix();
        proj
    }

    /// Set the rotation of the pixel axes in degrees.
    pub fn with_rotation(mut self, crota2: f64) -> Self {
        self.crota2 = crota2;
        self.update_matrix();
        self
    }

    /// Set the celestial frame of the world coordinates.
    pub fn with_frame(mut self, frame: CelestialFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Declare the grid's spatial shape `(ny, nx)`.
    pub fn with_shape(mut self, ny: usize, nx: usize) -> Self {
        self.shape = Some((ny, nx));
        self
    }

    /// Reference pixel (1-based).
    pub fn crpix(&self) -> (f64, f64) {
        self.crpix
    }

    /// Reference sky position.
    pub fn crval(&self) -> LonLat {
        self.crval
    }

    /// Pixel scales in degrees.
    pub fn cdelt(&self) -> (f64, f64) {
        self.cdelt
    }

    fn update_matrix(&mut self) {
        let (sin_r, cos_r) = self.crota2.to_radians().sin_cos();
        let (c1, c2) = self.cdelt;
        self.cd = [[c1 * cos_r, -c2 * sin_r], [c1 * sin_r, c2 * cos_r]];

        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        self.cd_inv = if det != 0.0 && det.is_finite() {
            Some([
                [self.cd[1][1] / det, -self.cd[0][1] / det],
                [-self.cd[1][0] / det, self.cd[0][0] / det],
            ])
        } else {
            None
        };
    }

    /// Native spherical coordinates (phi, theta) in radians to celestial.
    fn native_to_celestial(&self, phi: f64, theta: f64) -> LonLat {
        let (sin_dp, cos_dp) = self.crval.lat.to_radians().sin_cos();
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_dphi, cos_dphi) = (phi - PHI_P).sin_cos();

        let x = sin_t * cos_dp - cos_t * sin_dp * cos_dphi;
        let y = -cos_t * sin_dphi;
        let z = sin_t * sin_dp + cos_t * cos_dp * cos_dphi;

        LonLat::new(
            wrap_longitude(self.crval.lon + y.atan2(x).to_degrees()),
            z.atan2(x.hypot(y)).to_degrees(),
        )
    }

    /// Celestial position to native direction components.
    ///
    /// Returns `(a, b, z)` with `a = cos(theta) sin(phi - phi_p)`,
    /// `b = cos(theta) cos(phi - phi_p)` and `z = sin(theta)`.
    fn celestial_to_native(&self, pos: LonLat) -> (f64, f64, f64) {
        let (sin_dp, cos_dp) = self.crval.lat.to_radians().sin_cos();
        let (sin_d, cos_d) = pos.lat.to_radians().sin_cos();
        let (sin_da, cos_da) = (pos.lon - self.crval.lon).to_radians().sin_cos();

        let a = -cos_d * sin_da;
        let b = sin_d * cos_dp - cos_d * sin_dp * cos_da;
        let z = sin_d * sin_dp + cos_d * cos_dp * cos_da;
        (a, b, z)
    }
}

impl SkyProjection for TanProjection {
    fn pixel_to_world(&self, x: f64, y: f64) -> Option<LonLat> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let dx = x - (self.crpix.0 - 1.0);
        let dy = y - (self.crpix.1 - 1.0);

        // Intermediate world coordinates in degrees
        let xi = self.cd[0][0] * dx + self.cd[0][1] * dy;
        let eta = self.cd[1][0] * dx + self.cd[1][1] * dy;

        let r = xi.hypot(eta);
        let phi = if r == 0.0 { 0.0 } else { xi.atan2(-eta) };
        let theta = (180.0 / PI).atan2(r);

        Some(self.native_to_celestial(phi, theta))
    }

    fn world_to_pixel(&self, world: LonLat) -> Option<(f64, f64)> {
        if !world.is_finite() {
            return None;
        }
        let inv = self.cd_inv?;
        let (a, b, z) = self.celestial_to_native(world);
        if z <= 0.0 {
            // Far hemisphere has no gnomonic image
            return None;
        }

        // phi = phi_p + atan2(a, b) with phi_p = 180°, so sin(phi) = -a/cos(theta)
        let xi = (180.0 / PI) * -a / z;
        let eta = (180.0 / PI) * b / z;

        let dx = inv[0][0] * xi + inv[0][1] * eta;
        let dy = inv[1][0] * xi + inv[1][1] * eta;
        Some((dx + self.crpix.0 - 1.0, dy + self.crpix.1 - 1.0))
    }

    fn frame(&self) -> CelestialFrame {
        self.frame
    }

    fn pixel_area(&self) -> Option<f64> {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        Some(det.abs())
    }

    fn pixel_shape(&self) -> Option<(usize, usize)> {
        self.shape
    }
}
