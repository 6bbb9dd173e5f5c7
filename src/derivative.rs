//! # Equations of motion
//!
//! Right-hand sides of the Lorentz-force ODE in the two interchangeable
//! parameterizations used by the swimmer:
//!
//! * **Path-length form** ([`PathLengthDerivative`]): state
//!   `(x, y, z, ux, uy, uz)` with a unit direction, independent variable the
//!   arc length s. Valid for arbitrary trajectories, including ones that
//!   turn around in z.
//! * **Fixed-coordinate form** ([`FixedZDerivative`]): state
//!   `(x, y, tx, ty)`, independent variable z itself. Compact and the basis
//!   of the covariance transport Jacobian, but only valid while the motion is
//!   monotonic in z — entry points reject a pz sign incompatible with the
//!   target before integrating.
//!
//! Both forms produce physically equivalent trajectories for the same input.
//! The fixed-coordinate form is written in terms of the literature "A"
//! functions, whose analytic (tx, ty) partials ([`a_partials`]) feed the
//! covariance transport Jacobian.

use nalgebra::Vector3;

use crate::constants::{Kilogauss, QOverP, LIGHTVEL};
use crate::field::FieldProbe;

/// System of ordinary differential equations `dy/dt = f(t, y)`.
///
/// `N` is the dimension of the state vector. The independent variable `t` is
/// the arc length for the path-length form and z for the fixed-z form.
pub trait Ode<const N: usize> {
    /// Evaluate the right-hand side into `dydt`.
    fn eval(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Lorentz-force RHS in the path-length parameterization.
///
/// State layout `(x, y, z, ux, uy, uz)`: the derivative of the position is
/// the unit direction itself, and `du/ds = q·C·(u × B)` with
/// `C = `[`LIGHTVEL`].
pub struct PathLengthDerivative<'a, P> {
    probe: &'a P,
    /// Premultiplied `q · LIGHTVEL`; zero for neutral particles.
    q_c: f64,
}

impl<'a, P: FieldProbe> PathLengthDerivative<'a, P> {
    pub fn new(probe: &'a P, q: QOverP) -> Self {
        Self {
            probe,
            q_c: q * LIGHTVEL,
        }
    }
}

impl<P: FieldProbe> Ode<6> for PathLengthDerivative<'_, P> {
    fn eval(&self, _s: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        dydt[0] = y[3];
        dydt[1] = y[4];
        dydt[2] = y[5];

        if self.q_c == 0.0 || self.probe.is_zero_field() {
            dydt[3] = 0.0;
            dydt[4] = 0.0;
            dydt[5] = 0.0;
            return;
        }

        // Field is re-sampled at every evaluation, never cached across steps.
        let b = self.probe.field(y[0], y[1], y[2]);
        dydt[3] = self.q_c * (y[4] * b.z - y[5] * b.y);
        dydt[4] = self.q_c * (y[5] * b.x - y[3] * b.z);
        dydt[5] = self.q_c * (y[3] * b.y - y[4] * b.x);
    }
}

/// Lorentz-force RHS with z as the independent variable.
///
/// State layout `(x, y, tx, ty)`; `dx/dz = tx`, `dtx/dz = q·C·A_x` and
/// analogously for y, with the A functions of [`a_functions`].
pub struct FixedZDerivative<'a, P> {
    probe: &'a P,
    q_c: f64,
}

impl<'a, P: FieldProbe> FixedZDerivative<'a, P> {
    pub fn new(probe: &'a P, q: QOverP) -> Self {
        Self {
            probe,
            q_c: q * LIGHTVEL,
        }
    }
}

impl<P: FieldProbe> Ode<4> for FixedZDerivative<'_, P> {
    fn eval(&self, z: f64, y: &[f64; 4], dydt: &mut [f64; 4]) {
        dydt[0] = y[2];
        dydt[1] = y[3];

        if self.q_c == 0.0 || self.probe.is_zero_field() {
            dydt[2] = 0.0;
            dydt[3] = 0.0;
            return;
        }

        let b = self.probe.field(y[0], y[1], z);
        let (ax, ay) = a_functions(y[2], y[3], &b);
        dydt[2] = self.q_c * ax;
        dydt[3] = self.q_c * ay;
    }
}

/// The "A" functions of the fixed-coordinate equations of motion.
///
/// With `K = sqrt(1 + tx² + ty²)`:
///
/// ```text
/// A_x = K · (ty·(tx·Bx + Bz) − (1 + tx²)·By)
/// A_y = K · (−tx·(ty·By + Bz) + (1 + ty²)·Bx)
/// ```
pub fn a_functions(tx: f64, ty: f64, b: &Vector3<Kilogauss>) -> (f64, f64) {
    let k = (1.0 + tx * tx + ty * ty).sqrt();
    let ax = k * (ty * (tx * b.x + b.z) - (1.0 + tx * tx) * b.y);
    let ay = k * (-tx * (ty * b.y + b.z) + (1.0 + ty * ty) * b.x);
    (ax, ay)
}

/// A functions together with their analytic partials with respect to the
/// slopes, as needed by the covariance transport Jacobian.
#[derive(Debug, Clone, Copy)]
pub struct APartials {
    pub ax: f64,
    pub ay: f64,
    pub dax_dtx: f64,
    pub dax_dty: f64,
    pub day_dtx: f64,
    pub day_dty: f64,
}

/// Evaluate the A functions and their (tx, ty) partials at one point.
pub fn a_partials(tx: f64, ty: f64, b: &Vector3<Kilogauss>) -> APartials {
    let k2 = 1.0 + tx * tx + ty * ty;
    let k = k2.sqrt();
    let (ax, ay) = a_functions(tx, ty, b);

    APartials {
        ax,
        ay,
        dax_dtx: tx * ax / k2 + k * (ty * b.x - 2.0 * tx * b.y),
        dax_dty: ty * ax / k2 + k * (tx * b.x + b.z),
        day_dtx: tx * ay / k2 + k * (-ty * b.y - b.z),
        day_dty: ty * ay / k2 + k * (2.0 * ty * b.x - tx * b.y),
    }
}

#[cfg(test)]
mod derivative_test {
    use super::*;
    use crate::field::{UniformField, ZeroField};
    use approx::assert_relative_eq;

    #[test]
    fn test_a_functions_on_axis() {
        // tx = ty = 0 in a pure dipole field: A_x = -By, A_y = Bx.
        let b = Vector3::new(1.5, -5.0, 2.0);
        let (ax, ay) = a_functions(0.0, 0.0, &b);
        assert_relative_eq!(ax, 5.0, epsilon = 1e-14);
        assert_relative_eq!(ay, 1.5, epsilon = 1e-14);
    }

    #[test]
    fn test_a_partials_match_finite_differences() {
        let b = Vector3::new(2.0, -15.0, 3.5);
        let (tx, ty) = (0.3, -0.15);
        let p = a_partials(tx, ty, &b);

        let eps = 1e-7;
        let (ax_px, ay_px) = a_functions(tx + eps, ty, &b);
        let (ax_mx, ay_mx) = a_functions(tx - eps, ty, &b);
        let (ax_py, ay_py) = a_functions(tx, ty + eps, &b);
        let (ax_my, ay_my) = a_functions(tx, ty - eps, &b);

        assert_relative_eq!(p.dax_dtx, (ax_px - ax_mx) / (2.0 * eps), epsilon = 1e-5);
        assert_relative_eq!(p.dax_dty, (ax_py - ax_my) / (2.0 * eps), epsilon = 1e-5);
        assert_relative_eq!(p.day_dtx, (ay_px - ay_mx) / (2.0 * eps), epsilon = 1e-5);
        assert_relative_eq!(p.day_dty, (ay_py - ay_my) / (2.0 * eps), epsilon = 1e-5);
    }

    #[test]
    fn test_parameterizations_agree_on_axis() {
        // tx = ty = 0 in a uniform By field: both forms give
        // dtx/dz = -q·C·By (ds/dz = 1 on axis).
        let probe = UniformField::along_y(-5.0);
        let q = 2.0;

        let fixed = FixedZDerivative::new(&probe, q);
        let mut d4 = [0.0; 4];
        fixed.eval(0.0, &[0.0, 0.0, 0.0, 0.0], &mut d4);

        let path = PathLengthDerivative::new(&probe, q);
        let mut d6 = [0.0; 6];
        path.eval(0.0, &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0], &mut d6);

        // dtx/ds = d(ux/uz)/ds = dux/ds on axis since uz = 1, duz/ds = 0.
        assert_relative_eq!(d4[2], d6[3], epsilon = 1e-15);
        assert_relative_eq!(d4[3], d6[4], epsilon = 1e-15);
        assert_relative_eq!(d4[2], q * LIGHTVEL * 5.0, epsilon = 1e-15);
    }

    #[test]
    fn test_neutral_particle_goes_straight() {
        let probe = UniformField::along_y(-5.0);
        let path = PathLengthDerivative::new(&probe, 0.0);
        let mut d6 = [0.0; 6];
        path.eval(0.0, &[0.0, 0.0, 0.0, 0.1, 0.2, 0.97], &mut d6);
        assert_eq!(&d6[3..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_field_short_circuits() {
        let path = PathLengthDerivative::new(&ZeroField, 1.0);
        let mut d6 = [0.0; 6];
        path.eval(0.0, &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0], &mut d6);
        assert_eq!(&d6[3..], &[0.0, 0.0, 0.0]);
    }
}
