//! # Tilted ↔ sector frame transforms
//!
//! The detector geometry uses two related local frames differing by a fixed
//! rotation by the tilt angle θ about the y axis, in the (x, z) plane.
//! Positions transform by the plain 2D rotation. Slopes do **not**: because
//! `tx = px/pz` is a ratio, it must be re-derived from the rotated momentum
//! components,
//!
//! ```text
//! tilted → sector:  tx' = (tx·cosθ + sinθ) / (cosθ − tx·sinθ)
//! sector → tilted:  tx' = (tx·cosθ − sinθ) / (cosθ + tx·sinθ)
//! ty' = ty / denominator in both directions
//! ```
//!
//! Rotating `(tx, tz)` as if it were a vector silently corrupts every
//! downstream slope without any numerical red flag; the formulas above are
//! therefore cross-checked against an explicit [`nalgebra::Rotation3`] of the
//! direction vector in the unit tests.
//!
//! The sign of pz can flip across the transform (a track near-perpendicular
//! to the tilted axis); `dir_sign` follows the sign of the denominator.

use crate::constants::{Radian, TILT_ANGLE_DEG};
use crate::state_vector::{Frame, StateVector};

/// Rotation by the fixed detector tilt angle.
#[derive(Debug, Clone, Copy)]
pub struct TiltRotation {
    cos_t: f64,
    sin_t: f64,
}

impl Default for TiltRotation {
    /// The standard detector tilt of [`TILT_ANGLE_DEG`] degrees.
    fn default() -> Self {
        Self::new(TILT_ANGLE_DEG.to_radians())
    }
}

impl TiltRotation {
    /// Rotation by an arbitrary tilt angle in radians.
    pub fn new(angle: Radian) -> Self {
        Self {
            cos_t: angle.cos(),
            sin_t: angle.sin(),
        }
    }

    /// Transform a state vector from the tilted to the sector frame.
    ///
    /// The input must carry the [`Frame::Tilted`] tag; the output carries
    /// [`Frame::Sector`]. Positions rotate in the (x, z) plane, slopes are
    /// re-derived, and all non-geometric fields pass through unchanged.
    pub fn tilted_to_sector(&self, sv: &StateVector) -> StateVector {
        debug_assert_eq!(sv.frame, Frame::Tilted, "input must be in the tilted frame");
        let (c, s) = (self.cos_t, self.sin_t);

        let denom = c - sv.tx * s;
        let mut out = *sv;
        out.x = sv.x * c + sv.z * s;
        out.z = sv.z * c - sv.x * s;
        out.tx = (sv.tx * c + s) / denom;
        out.ty = sv.ty / denom;
        out.dir_sign = sv.dir_sign * denom.signum();
        out.frame = Frame::Sector;
        out
    }

    /// Transform a state vector from the sector to the tilted frame.
    ///
    /// Exact inverse of [`TiltRotation::tilted_to_sector`].
    pub fn sector_to_tilted(&self, sv: &StateVector) -> StateVector {
        debug_assert_eq!(sv.frame, Frame::Sector, "input must be in the sector frame");
        let (c, s) = (self.cos_t, self.sin_t);

        let denom = c + sv.tx * s;
        let mut out = *sv;
        out.x = sv.x * c - sv.z * s;
        out.z = sv.z * c + sv.x * s;
        out.tx = (sv.tx * c - s) / denom;
        out.ty = sv.ty / denom;
        out.dir_sign = sv.dir_sign * denom.signum();
        out.frame = Frame::Tilted;
        out
    }
}

#[cfg(test)]
mod frame_test {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};

    fn tilted_state() -> StateVector {
        let mut sv = StateVector::new(12.5, -3.0, 240.0, 0.18, -0.07, 0.8, Frame::Tilted);
        sv.path_length = 250.0;
        sv.index = 7;
        sv
    }

    #[test]
    fn test_round_trip_restores_state() {
        let rot = TiltRotation::default();
        let original = tilted_state();
        let back = rot.sector_to_tilted(&rot.tilted_to_sector(&original));

        assert_relative_eq!(back.x, original.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, original.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, original.z, epsilon = 1e-12);
        assert_relative_eq!(back.tx, original.tx, epsilon = 1e-12);
        assert_relative_eq!(back.ty, original.ty, epsilon = 1e-12);
        assert_eq!(back.dir_sign, original.dir_sign);
        assert_eq!(back.frame, Frame::Tilted);
        // Non-geometric fields pass through untouched.
        assert_eq!(back.q, original.q);
        assert_eq!(back.index, original.index);
        assert_eq!(back.path_length, original.path_length);
    }

    #[test]
    fn test_slopes_match_rotated_direction_vector() {
        // The slope formulas must agree with rotating the actual direction
        // vector and re-deriving tx = ux/uz, ty = uy/uz.
        let rot = TiltRotation::default();
        let sv = tilted_state();
        let out = rot.tilted_to_sector(&sv);

        let angle = TILT_ANGLE_DEG.to_radians();
        let r = Rotation3::from_axis_angle(&Vector3::y_axis(), angle);
        let u = r * sv.unit_direction();

        assert_relative_eq!(out.tx, u.x / u.z, epsilon = 1e-12);
        assert_relative_eq!(out.ty, u.y / u.z, epsilon = 1e-12);

        let p = r * Vector3::new(sv.x, sv.y, sv.z);
        assert_relative_eq!(out.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(out.y, p.y, epsilon = 1e-12);
        assert_relative_eq!(out.z, p.z, epsilon = 1e-12);
    }

    #[test]
    fn test_on_axis_track_gains_tilt_slope() {
        // A track along the tilted z axis acquires tx = tan(θ) in the sector
        // frame.
        let rot = TiltRotation::default();
        let sv = StateVector::new(0.0, 0.0, 100.0, 0.0, 0.0, 1.0, Frame::Tilted);
        let out = rot.tilted_to_sector(&sv);
        assert_relative_eq!(out.tx, TILT_ANGLE_DEG.to_radians().tan(), epsilon = 1e-12);
        assert_relative_eq!(out.ty, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_dir_sign_flips_with_denominator() {
        // tx < -cot(θ) in the sector frame puts the track on the other side
        // of the tilted z axis: pz changes sign across the transform.
        let rot = TiltRotation::default();
        let angle = TILT_ANGLE_DEG.to_radians();
        let steep = -(1.0 / angle.tan() + 1.0);
        let sv = StateVector::new(0.0, 0.0, 0.0, steep, 0.0, 1.0, Frame::Sector);
        let out = rot.sector_to_tilted(&sv);
        assert_eq!(out.dir_sign, -1.0);
    }
}
