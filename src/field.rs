//! # Magnetic-field sampling interface
//!
//! The swimmer consumes the magnetic field exclusively through the
//! [`FieldProbe`] trait: a position in, a field vector out. Field-map storage
//! and interpolation live outside this crate; only the sampling contract is
//! defined here.
//!
//! ## Units
//!
//! Probes report **kilogauss**, the single internal field unit of the crate.
//! A probe calibrated in tesla is wrapped in [`TeslaField`], which applies the
//! conversion exactly once at the boundary. No formula in this crate converts
//! units ad hoc.
//!
//! ## Sharing
//!
//! Each swim samples the field afresh every step and keeps no probe state. A
//! read-only probe may therefore be shared across worker threads by reference;
//! the blanket `impl FieldProbe for &P` makes that explicit. A stateful probe
//! must be instantiated per thread.

use nalgebra::Vector3;

use crate::constants::{Centimeter, Kilogauss, Tesla, KGAUSS_PER_TESLA};

/// Sampling interface for a magnetic field.
///
/// Implementations must be pure with respect to the query position: two calls
/// with the same arguments return the same vector for the lifetime of a swim.
pub trait FieldProbe {
    /// Field vector `(Bx, By, Bz)` in kilogauss at `(x, y, z)` centimeters.
    fn field(&self, x: Centimeter, y: Centimeter, z: Centimeter) -> Vector3<Kilogauss>;

    /// Sector-aware overload for rotated or composite field maps.
    ///
    /// The default implementation ignores the sector index and forwards to
    /// [`FieldProbe::field`]; composite probes override it.
    fn field_in_sector(
        &self,
        _sector: usize,
        x: Centimeter,
        y: Centimeter,
        z: Centimeter,
    ) -> Vector3<Kilogauss> {
        self.field(x, y, z)
    }

    /// Whether the field is identically zero over the probed region.
    ///
    /// When true, the swimmer and the covariance transport short-circuit to
    /// their straight-line closed forms without sampling.
    fn is_zero_field(&self) -> bool {
        false
    }
}

impl<P: FieldProbe + ?Sized> FieldProbe for &P {
    fn field(&self, x: Centimeter, y: Centimeter, z: Centimeter) -> Vector3<Kilogauss> {
        (**self).field(x, y, z)
    }

    fn field_in_sector(
        &self,
        sector: usize,
        x: Centimeter,
        y: Centimeter,
        z: Centimeter,
    ) -> Vector3<Kilogauss> {
        (**self).field_in_sector(sector, x, y, z)
    }

    fn is_zero_field(&self) -> bool {
        (**self).is_zero_field()
    }
}

/// A field that is zero everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroField;

impl FieldProbe for ZeroField {
    fn field(&self, _x: Centimeter, _y: Centimeter, _z: Centimeter) -> Vector3<Kilogauss> {
        Vector3::zeros()
    }

    fn is_zero_field(&self) -> bool {
        true
    }
}

/// A spatially uniform field, given in kilogauss.
#[derive(Debug, Clone, Copy)]
pub struct UniformField(pub Vector3<Kilogauss>);

impl UniformField {
    /// Uniform field along y, the dominant component of a dipole spectrometer.
    pub fn along_y(by: Kilogauss) -> Self {
        Self(Vector3::new(0.0, by, 0.0))
    }
}

impl FieldProbe for UniformField {
    fn field(&self, _x: Centimeter, _y: Centimeter, _z: Centimeter) -> Vector3<Kilogauss> {
        self.0
    }

    fn is_zero_field(&self) -> bool {
        self.0 == Vector3::zeros()
    }
}

/// Adapter for a probe calibrated in tesla.
///
/// Wraps a probe whose `field` returns tesla and rescales its samples to
/// kilogauss. This is the only place in the crate where the tesla/kilogauss
/// conversion happens.
#[derive(Debug, Clone, Copy)]
pub struct TeslaField<P>(pub P);

impl<P> TeslaField<P>
where
    P: Fn(Centimeter, Centimeter, Centimeter) -> Vector3<Tesla>,
{
    /// Wrap a closure sampling a field in tesla.
    pub fn from_fn(f: P) -> Self {
        Self(f)
    }
}

impl<P> FieldProbe for TeslaField<P>
where
    P: Fn(Centimeter, Centimeter, Centimeter) -> Vector3<Tesla>,
{
    fn field(&self, x: Centimeter, y: Centimeter, z: Centimeter) -> Vector3<Kilogauss> {
        (self.0)(x, y, z) * KGAUSS_PER_TESLA
    }
}
