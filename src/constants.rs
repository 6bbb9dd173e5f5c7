//! # Constants and type definitions for magswim
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `magswim` library.
//!
//! ## Overview
//!
//! - Momentum/field/curvature conversion for the Lorentz-force equations
//! - Unit conventions and conversions (centimeters, GeV/c, kilogauss ↔ tesla)
//! - Multiple-scattering (Highland) coefficients and particle masses
//! - Core type aliases used across the crate
//!
//! Units are fixed by convention and preserved exactly: distances in
//! **centimeters**, momenta in **GeV/c**, magnetic field in **kilogauss**.
//! A probe calibrated in tesla is adapted once at the field boundary
//! (see [`crate::field::TeslaField`]), never inside a formula.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// Curvature conversion factor for the equations of motion.
///
/// With momentum in GeV/c, field in kilogauss and distances in centimeters,
/// the curvature of a unit-charge track is `LIGHTVEL * B / p` per centimeter.
pub const LIGHTVEL: f64 = 2.99792458e-4;

/// Kilogauss per tesla.
pub const KGAUSS_PER_TESLA: f64 = 10.0;

/// Detector tilt angle between the sector and tilted frames, in degrees.
pub const TILT_ANGLE_DEG: Degree = 25.0;

/// Leading coefficient of the Highland multiple-scattering formula [GeV/c].
pub const HIGHLAND_COEF: f64 = 0.0136;

/// Logarithmic correction coefficient of the Highland formula.
pub const HIGHLAND_LOG_COEF: f64 = 0.038;

/// Electron mass [GeV/c²] (CODATA 2018).
pub const ELECTRON_MASS: f64 = 0.51099895e-3;

/// Proton mass [GeV/c²] (CODATA 2018).
pub const PROTON_MASS: f64 = 0.93827208816;

/// Field magnitude below which a sampled field is treated as vanishing [kG].
pub const FIELD_EPS: f64 = 1.0e-6;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Distance in centimeters
pub type Centimeter = f64;
/// Momentum magnitude in GeV/c
pub type GeVc = f64;
/// Magnetic field in kilogauss
pub type Kilogauss = f64;
/// Magnetic field in tesla
pub type Tesla = f64;
/// Charge over momentum magnitude, in 1/(GeV/c); zero for neutral particles
pub type QOverP = f64;
/// Angle in radians
pub type Radian = f64;
/// Angle in degrees
pub type Degree = f64;

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_curvature_factor() {
        // A 1 GeV/c unit-charge track in a 10 kG (1 T) field bends with a
        // radius of ~333.6 cm.
        let radius = 1.0 / (LIGHTVEL * 10.0);
        assert!((radius - 333.5640951981521).abs() < 1e-6);
    }
}
