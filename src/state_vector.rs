//! # Track state vectors
//!
//! A [`StateVector`] is the minimal set of numbers describing a particle at
//! one point along a trajectory: position, direction encoded as slopes
//! `tx = px/pz`, `ty = py/pz`, and charge over momentum `q = charge/|p|`.
//! Auxiliary fields carry the field magnitude sampled at the point, the
//! accumulated path length, a caller-owned index tag and the sign of `dz/ds`
//! along the motion.
//!
//! Every geometric field of one state vector belongs to exactly one
//! coordinate frame, recorded in [`StateVector::frame`]; frames are never
//! mixed mid-computation. Conversions between the tilted and sector frames go
//! through [`crate::frame::TiltRotation`], which produces a new value with the
//! other tag.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{Centimeter, GeVc, Kilogauss, QOverP};
use crate::magswim_errors::SwimError;

/// Coordinate frame a [`StateVector`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Detector-local frame, tilted by the fixed stereo angle with respect to
    /// the sector frame.
    Tilted,
    /// Per-sector rotated frame.
    Sector,
}

/// State of a particle at one point along a trajectory.
///
/// Geometry is `(x, y, z)` in centimeters with the direction encoded as
/// slopes; `q` is `charge/|p|` in 1/(GeV/c) and is zero for neutral
/// particles. `dir_sign` records whether z increases (+1) or decreases (−1)
/// along the motion; together with the slopes it determines the unit
/// direction unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub x: Centimeter,
    pub y: Centimeter,
    pub z: Centimeter,
    /// Slope px/pz.
    pub tx: f64,
    /// Slope py/pz.
    pub ty: f64,
    /// Charge over momentum magnitude [1/(GeV/c)]; 0 for neutral particles.
    pub q: QOverP,
    /// Field magnitude sampled at this point [kG].
    pub b: Kilogauss,
    /// Path length accumulated from the start of the swim [cm].
    pub path_length: Centimeter,
    /// Caller-owned tag (e.g. a measurement-plane index).
    pub index: usize,
    /// +1.0 when z increases along the motion, −1.0 when it decreases.
    pub dir_sign: f64,
    /// Frame all geometric fields are expressed in.
    pub frame: Frame,
}

impl StateVector {
    /// State at the start of a swim, moving toward increasing z.
    pub fn new(
        x: Centimeter,
        y: Centimeter,
        z: Centimeter,
        tx: f64,
        ty: f64,
        q: QOverP,
        frame: Frame,
    ) -> Self {
        Self {
            x,
            y,
            z,
            tx,
            ty,
            q,
            b: 0.0,
            path_length: 0.0,
            index: 0,
            dir_sign: 1.0,
            frame,
        }
    }

    /// Same state, moving toward decreasing z.
    pub fn backward(mut self) -> Self {
        self.dir_sign = -1.0;
        self
    }

    /// Same state with the caller tag set.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Momentum magnitude, or `None` for a neutral particle.
    pub fn momentum(&self) -> Option<GeVc> {
        (self.q != 0.0).then(|| 1.0 / self.q.abs())
    }

    /// Sign of pz along the motion, as ±1.
    pub fn pz_sign(&self) -> i8 {
        if self.dir_sign < 0.0 {
            -1
        } else {
            1
        }
    }

    /// Unit direction of motion derived from the slopes and `dir_sign`.
    pub fn unit_direction(&self) -> Vector3<f64> {
        let k = (1.0 + self.tx * self.tx + self.ty * self.ty).sqrt();
        let uz = self.dir_sign / k;
        Vector3::new(self.tx * uz, self.ty * uz, uz)
    }

    /// Re-derive the slopes and `dir_sign` from a direction vector.
    ///
    /// The vector need not be normalized; its z component must be nonzero,
    /// otherwise the slopes are undefined and the state is left unchanged.
    pub(crate) fn set_direction(&mut self, u: Vector3<f64>) {
        if u.z != 0.0 {
            self.tx = u.x / u.z;
            self.ty = u.y / u.z;
            self.dir_sign = u.z.signum();
        }
    }

    /// Check the state for missing or non-finite components.
    pub fn validate(&self) -> Result<(), SwimError> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("tx", self.tx),
            ("ty", self.ty),
            ("q", self.q),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(SwimError::InvalidStart(format!(
                    "component {name} is not finite ({value})"
                )));
            }
        }
        if self.dir_sign != 1.0 && self.dir_sign != -1.0 {
            return Err(SwimError::InvalidStart(format!(
                "dir_sign must be ±1.0, got {}",
                self.dir_sign
            )));
        }
        Ok(())
    }

    /// Whether every geometric component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.tx.is_finite()
            && self.ty.is_finite()
    }

    /// Pack into the path-length parameterization `(x, y, z, ux, uy, uz)`.
    pub(crate) fn to_path_state(self) -> [f64; 6] {
        let u = self.unit_direction();
        [self.x, self.y, self.z, u.x, u.y, u.z]
    }

    /// Update geometry from the path-length parameterization at path length `s`.
    pub(crate) fn update_from_path_state(&mut self, s: f64, y: &[f64; 6]) {
        self.x = y[0];
        self.y = y[1];
        self.z = y[2];
        self.set_direction(Vector3::new(y[3], y[4], y[5]));
        self.path_length = s;
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StateVector[{:?}](x={:.4} y={:.4} z={:.4} cm, tx={:.6} ty={:.6}, q={:.4}, s={:.3} cm)",
            self.frame, self.x, self.y, self.z, self.tx, self.ty, self.q, self.path_length
        )
    }
}
