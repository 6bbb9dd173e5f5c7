//! # Covariance transport
//!
//! Propagates the 5×5 track covariance matrix over the ordered basis
//! `(x, y, tx, ty, q)` alongside the trajectory, for use in track fitting.
//!
//! ## Per-step transport
//!
//! For each signed step `s` in z, the per-step Jacobian of the transport map
//! deviates from the identity only in ten closed-form entries built from the
//! A functions and their slope partials (see [`crate::derivative::a_partials`])
//! evaluated at the step's starting state. The update `C ← J·C·Jᵗ` is carried
//! out as two sequential sparse products; the dense Jacobian is never
//! materialized. Multiple-scattering process noise is then added to the
//! `(tx, ty)` block via the Highland formula, and the state vector is
//! advanced with the same per-step equations so state and covariance stay
//! synchronized.
//!
//! ## Strategies
//!
//! Three interchangeable stepping strategies implement [`CovarianceTransport`]:
//!
//! * [`FixedStepTransport`] — canonical: uniform steps across the interval,
//!   sized from the field magnitude at the start (`step ∝ 1/|B|`, clamped).
//! * [`TrajectoryTransport`] — re-uses an already-swum [`Trajectory`],
//!   transporting the covariance once per stored point pair.
//! * [`AdaptiveTransport`] — an independent half-step accept/reject loop
//!   whose error metric is the fractional difference between the full-step
//!   and half-step endpoint positions.
//!
//! Zero charge or an identically-zero field short-circuits to the
//! straight-line closed form. Note that the field-free Jacobian still carries
//! the `∂x/∂tx0 = ∂y/∂ty0 = s` entries; only a zero-length step is the
//! identity.

use itertools::Itertools;
use nalgebra::{SMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{
    Centimeter, Kilogauss, ELECTRON_MASS, FIELD_EPS, HIGHLAND_COEF, HIGHLAND_LOG_COEF, LIGHTVEL,
    PROTON_MASS,
};
use crate::derivative::a_partials;
use crate::field::FieldProbe;
use crate::magswim_errors::SwimError;
use crate::state_vector::StateVector;
use crate::trajectory::Trajectory;

/// 5×5 matrix over the track-parameter basis.
pub type Matrix5 = SMatrix<f64, 5, 5>;

// -------------------------------------------------------------------------------------------------
// Covariance matrix
// -------------------------------------------------------------------------------------------------

/// Symmetric covariance of the track parameters `(x, y, tx, ty, q)`.
///
/// Owned by exactly one in-flight propagation at a time: transport consumes
/// the matrix by value and returns the propagated one; copies are explicit
/// `clone()` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    m: Matrix5,
}

impl CovarianceMatrix {
    pub fn new(m: Matrix5) -> Self {
        Self { m }
    }

    /// Diagonal covariance from per-parameter variances.
    pub fn from_diagonal(var: [f64; 5]) -> Self {
        let mut m = Matrix5::zeros();
        for (i, v) in var.into_iter().enumerate() {
            m[(i, i)] = v;
        }
        Self { m }
    }

    pub fn zeros() -> Self {
        Self {
            m: Matrix5::zeros(),
        }
    }

    pub fn matrix(&self) -> &Matrix5 {
        &self.m
    }

    pub fn into_inner(self) -> Matrix5 {
        self.m
    }

    /// Restore exact symmetry after accumulated floating-point drift.
    pub fn symmetrize(&mut self) {
        self.m = 0.5 * (self.m + self.m.transpose());
    }
}

impl std::ops::Index<(usize, usize)> for CovarianceMatrix {
    type Output = f64;

    fn index(&self, ij: (usize, usize)) -> &f64 {
        &self.m[ij]
    }
}

// -------------------------------------------------------------------------------------------------
// Parameters
// -------------------------------------------------------------------------------------------------

/// Mass hypothesis for the multiple-scattering β.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassHypothesis {
    /// Select by the sign of q: negative → electron, otherwise proton.
    ///
    /// This reproduces the historical behavior of the reconstruction it was
    /// lifted from; it is a modeling simplification, not a verified physics
    /// policy. Use [`MassHypothesis::Fixed`] to override.
    ByChargeSign,
    /// Fixed mass in GeV/c².
    Fixed(f64),
}

impl MassHypothesis {
    fn mass_for(self, q: f64) -> f64 {
        match self {
            MassHypothesis::ByChargeSign => {
                if q < 0.0 {
                    ELECTRON_MASS
                } else {
                    PROTON_MASS
                }
            }
            MassHypothesis::Fixed(m) => m,
        }
    }
}

/// Configuration of the covariance transport strategies.
#[derive(Debug, Clone)]
pub struct TransportParams {
    /// Base step at the reference field magnitude [cm].
    pub step: Centimeter,
    /// Field magnitude at which the base step applies [kG]; stronger fields
    /// shrink the step proportionally.
    pub reference_field: Kilogauss,
    /// Clamp bounds of the field-scaled step [cm].
    pub min_step: Centimeter,
    pub max_step: Centimeter,
    /// Radiation length X0 of the traversed material [cm]; `None` disables
    /// multiple-scattering noise.
    pub radiation_length: Option<Centimeter>,
    pub mass_hypothesis: MassHypothesis,
    /// Relative tolerance of the adaptive strategy's endpoint-position error.
    pub rel_tolerance: f64,
    /// Step growth factor of the adaptive strategy.
    pub grow_factor: f64,
    /// Minimum adaptive step before the transport fails [cm].
    pub adaptive_min_step: Centimeter,
    /// Tolerance on the trajectory endpoint matching the requested target [cm].
    pub target_tolerance: Centimeter,
    /// Budget on kernel evaluations.
    pub max_steps: u64,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            step: 1.0,
            reference_field: 20.0,
            min_step: 0.1,
            max_step: 5.0,
            radiation_length: None,
            mass_hypothesis: MassHypothesis::ByChargeSign,
            rel_tolerance: 1.0e-6,
            grow_factor: 1.5,
            adaptive_min_step: 1.0e-3,
            target_tolerance: 1.0e-2,
            max_steps: 100_000,
        }
    }
}

impl TransportParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TransportParamsBuilder {
        TransportParamsBuilder::new()
    }

    /// Uniform step size for a region of field magnitude `b`.
    fn step_for(&self, b: Kilogauss) -> Centimeter {
        if b <= FIELD_EPS {
            self.max_step
        } else {
            (self.step * self.reference_field / b).clamp(self.min_step, self.max_step)
        }
    }
}

/// Builder for [`TransportParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct TransportParamsBuilder {
    params: TransportParams,
}

impl TransportParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: TransportParams::default(),
        }
    }

    pub fn step(mut self, v: Centimeter) -> Self {
        self.params.step = v;
        self
    }
    pub fn reference_field(mut self, v: Kilogauss) -> Self {
        self.params.reference_field = v;
        self
    }
    pub fn min_step(mut self, v: Centimeter) -> Self {
        self.params.min_step = v;
        self
    }
    pub fn max_step(mut self, v: Centimeter) -> Self {
        self.params.max_step = v;
        self
    }
    pub fn radiation_length(mut self, x0: Centimeter) -> Self {
        self.params.radiation_length = Some(x0);
        self
    }
    pub fn no_scattering(mut self) -> Self {
        self.params.radiation_length = None;
        self
    }
    pub fn mass_hypothesis(mut self, v: MassHypothesis) -> Self {
        self.params.mass_hypothesis = v;
        self
    }
    pub fn rel_tolerance(mut self, v: f64) -> Self {
        self.params.rel_tolerance = v;
        self
    }
    pub fn grow_factor(mut self, v: f64) -> Self {
        self.params.grow_factor = v;
        self
    }
    pub fn adaptive_min_step(mut self, v: Centimeter) -> Self {
        self.params.adaptive_min_step = v;
        self
    }
    pub fn target_tolerance(mut self, v: Centimeter) -> Self {
        self.params.target_tolerance = v;
        self
    }
    pub fn max_steps(mut self, v: u64) -> Self {
        self.params.max_steps = v;
        self
    }

    pub fn build(self) -> Result<TransportParams, SwimError> {
        let p = &self.params;
        if !(p.step > 0.0 && p.reference_field > 0.0) {
            return Err(SwimError::InvalidParameter(
                "step and reference_field must be > 0".into(),
            ));
        }
        if !(p.min_step > 0.0 && p.min_step <= p.max_step) {
            return Err(SwimError::InvalidParameter(
                "require 0 < min_step <= max_step".into(),
            ));
        }
        if let Some(x0) = p.radiation_length {
            if !(x0 > 0.0) {
                return Err(SwimError::InvalidParameter(
                    "radiation_length must be > 0".into(),
                ));
            }
        }
        if !(p.rel_tolerance > 0.0 && p.adaptive_min_step > 0.0 && p.target_tolerance > 0.0) {
            return Err(SwimError::InvalidParameter(
                "tolerances must be > 0".into(),
            ));
        }
        if !(p.grow_factor > 1.0) {
            return Err(SwimError::InvalidParameter(
                "grow_factor must be > 1".into(),
            ));
        }
        if p.max_steps == 0 {
            return Err(SwimError::InvalidParameter("max_steps must be >= 1".into()));
        }
        Ok(self.params)
    }
}

// -------------------------------------------------------------------------------------------------
// Per-step kernel
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Scatter {
    x0: Centimeter,
    mass: f64,
}

/// One transport step of signed length `s` in z.
///
/// `b` is the field at the step's *starting* state; the covariance is updated
/// as `J·C·Jᵗ` plus scattering noise, then the state is advanced to second
/// order with the same A functions so the two stay synchronized.
fn transport_step(
    b: &Vector3<Kilogauss>,
    state: &mut StateVector,
    cov: &mut Matrix5,
    s: f64,
    scatter: Option<Scatter>,
) {
    let (tx, ty, q) = (state.tx, state.ty, state.q);
    let p = a_partials(tx, ty, b);
    let c = LIGHTVEL;
    let qc = q * c;
    let s2 = s * s;

    // Deviations of the per-step Jacobian from the identity, basis (x,y,tx,ty,q).
    let d_x_tx = s;
    let d_x_ty = 0.5 * qc * s2 * p.dax_dty;
    let d_x_q = 0.5 * c * s2 * p.ax;
    let d_y_tx = 0.5 * qc * s2 * p.day_dtx;
    let d_y_ty = s;
    let d_y_q = 0.5 * c * s2 * p.ay;
    let d_tx_ty = qc * s * p.dax_dty;
    let d_tx_q = c * s * p.ax;
    let d_ty_tx = qc * s * p.day_dtx;
    let d_ty_q = c * s * p.ay;

    // u = J·C: only the first four rows differ from C.
    let mut u = *cov;
    for k in 0..5 {
        u[(0, k)] = cov[(0, k)] + d_x_tx * cov[(2, k)] + d_x_ty * cov[(3, k)] + d_x_q * cov[(4, k)];
        u[(1, k)] = cov[(1, k)] + d_y_tx * cov[(2, k)] + d_y_ty * cov[(3, k)] + d_y_q * cov[(4, k)];
        u[(2, k)] = cov[(2, k)] + d_tx_ty * cov[(3, k)] + d_tx_q * cov[(4, k)];
        u[(3, k)] = cov[(3, k)] + d_ty_tx * cov[(2, k)] + d_ty_q * cov[(4, k)];
    }

    // C' = u·Jᵗ: only the first four columns differ from u.
    let mut out = u;
    for k in 0..5 {
        out[(k, 0)] = u[(k, 0)] + d_x_tx * u[(k, 2)] + d_x_ty * u[(k, 3)] + d_x_q * u[(k, 4)];
        out[(k, 1)] = u[(k, 1)] + d_y_tx * u[(k, 2)] + d_y_ty * u[(k, 3)] + d_y_q * u[(k, 4)];
        out[(k, 2)] = u[(k, 2)] + d_tx_ty * u[(k, 3)] + d_tx_q * u[(k, 4)];
        out[(k, 3)] = u[(k, 3)] + d_ty_tx * u[(k, 2)] + d_ty_q * u[(k, 4)];
    }
    *cov = out;

    // Multiple-scattering process noise (Highland), neutral particles skip it.
    if let Some(sc) = scatter {
        if q != 0.0 {
            let k2 = 1.0 + tx * tx + ty * ty;
            let rad_lengths = s.abs() * k2.sqrt() / sc.x0;
            if rad_lengths > 0.0 {
                let pmag = 1.0 / q.abs();
                let beta = pmag / (pmag * pmag + sc.mass * sc.mass).sqrt();
                let theta = HIGHLAND_COEF / (beta * pmag)
                    * rad_lengths.sqrt()
                    * (1.0 + HIGHLAND_LOG_COEF * rad_lengths.ln());
                let t2 = theta * theta;
                cov[(2, 2)] += (1.0 + tx * tx) * k2 * t2;
                cov[(3, 3)] += (1.0 + ty * ty) * k2 * t2;
                cov[(2, 3)] += tx * ty * k2 * t2;
                cov[(3, 2)] += tx * ty * k2 * t2;
            }
        }
    }

    // Advance the state with the same per-step equations, to second order.
    state.x += tx * s + 0.5 * qc * p.ax * s2;
    state.y += ty * s + 0.5 * qc * p.ay * s2;
    state.tx = tx + qc * p.ax * s;
    state.ty = ty + qc * p.ay * s;
    state.z += s;
    state.path_length += s.abs() * (1.0 + tx * tx + ty * ty).sqrt();
    state.b = b.norm();
}

// -------------------------------------------------------------------------------------------------
// Strategies
// -------------------------------------------------------------------------------------------------

/// Result of one covariance transport call.
#[derive(Debug, Clone)]
pub struct TransportResult {
    pub state: StateVector,
    pub covariance: CovarianceMatrix,
    /// Kernel evaluations spent.
    pub steps: u64,
}

/// Propagate a covariance matrix (and its synchronized state) to a target z.
pub trait CovarianceTransport {
    fn transport<P: FieldProbe>(
        &self,
        probe: &P,
        start: &StateVector,
        cov: CovarianceMatrix,
        target_z: Centimeter,
    ) -> Result<TransportResult, SwimError>;
}

fn sample_field<P: FieldProbe>(probe: &P, state: &StateVector) -> Vector3<Kilogauss> {
    if state.q == 0.0 || probe.is_zero_field() {
        Vector3::zeros()
    } else {
        probe.field(state.x, state.y, state.z)
    }
}

fn check_direction(start: &StateVector, target_z: Centimeter) -> Result<(), SwimError> {
    let dz = target_z - start.z;
    if dz == 0.0 {
        return Ok(());
    }
    let required: i8 = if dz > 0.0 { 1 } else { -1 };
    if required != start.pz_sign() {
        return Err(SwimError::InconsistentDirection {
            start_z: start.z,
            target_z,
            required,
            actual: start.pz_sign(),
        });
    }
    Ok(())
}

/// Canonical strategy: uniform steps across the interval, sized from the
/// field magnitude at the starting state.
#[derive(Debug, Clone, Default)]
pub struct FixedStepTransport {
    pub params: TransportParams,
}

impl FixedStepTransport {
    pub fn new(params: TransportParams) -> Self {
        Self { params }
    }
}

impl CovarianceTransport for FixedStepTransport {
    fn transport<P: FieldProbe>(
        &self,
        probe: &P,
        start: &StateVector,
        cov: CovarianceMatrix,
        target_z: Centimeter,
    ) -> Result<TransportResult, SwimError> {
        start.validate()?;
        let dz = target_z - start.z;
        if dz == 0.0 {
            return Ok(TransportResult {
                state: *start,
                covariance: cov,
                steps: 0,
            });
        }
        check_direction(start, target_z)?;

        let scatter = self.params.radiation_length.map(|x0| Scatter {
            x0,
            mass: self.params.mass_hypothesis.mass_for(start.q),
        });
        let mut state = *start;
        let mut m = cov.into_inner();

        // Degenerate inputs collapse to the straight-line closed form in one step.
        if state.q == 0.0 || probe.is_zero_field() {
            transport_step(&Vector3::zeros(), &mut state, &mut m, dz, scatter);
            return Ok(TransportResult {
                state,
                covariance: CovarianceMatrix::new(m),
                steps: 1,
            });
        }

        let b0 = probe.field(start.x, start.y, start.z).norm();
        let step = self.params.step_for(b0);
        let n = (dz.abs() / step).ceil().max(1.0) as u64;
        if n > self.params.max_steps {
            return Err(SwimError::MaxStepsExceeded(self.params.max_steps));
        }
        let h = dz / n as f64;

        for _ in 0..n {
            let b = sample_field(probe, &state);
            transport_step(&b, &mut state, &mut m, h, scatter);
            if !state.is_finite() {
                return Err(SwimError::NonFiniteState {
                    path_length: state.path_length,
                });
            }
        }
        Ok(TransportResult {
            state,
            covariance: CovarianceMatrix::new(m),
            steps: n,
        })
    }
}

/// Transport along an already-swum adaptive trajectory, one kernel step per
/// stored point pair. The state at each step is taken from the trajectory
/// itself, so the returned state is the trajectory's end state.
#[derive(Debug, Clone)]
pub struct TrajectoryTransport<'t> {
    pub trajectory: &'t Trajectory,
    pub params: TransportParams,
}

impl<'t> TrajectoryTransport<'t> {
    pub fn new(trajectory: &'t Trajectory, params: TransportParams) -> Self {
        Self { trajectory, params }
    }
}

impl CovarianceTransport for TrajectoryTransport<'_> {
    fn transport<P: FieldProbe>(
        &self,
        probe: &P,
        start: &StateVector,
        cov: CovarianceMatrix,
        target_z: Centimeter,
    ) -> Result<TransportResult, SwimError> {
        start.validate()?;
        let (first, last) = match (self.trajectory.first(), self.trajectory.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(SwimError::InvalidParameter(
                    "trajectory transport requires a non-empty trajectory".into(),
                ))
            }
        };
        if (first.z - start.z).abs() > self.params.target_tolerance {
            return Err(SwimError::InvalidParameter(format!(
                "trajectory starts at z = {:.4}, not at the start state z = {:.4}",
                first.z, start.z
            )));
        }
        if (last.z - target_z).abs() > self.params.target_tolerance {
            return Err(SwimError::InvalidParameter(format!(
                "trajectory ends at z = {:.4}, not at the requested target z = {:.4}",
                last.z, target_z
            )));
        }

        let scatter = self.params.radiation_length.map(|x0| Scatter {
            x0,
            mass: self.params.mass_hypothesis.mass_for(start.q),
        });
        let mut m = cov.into_inner();
        let mut steps = 0u64;

        for (a, b_point) in self.trajectory.iter().tuple_windows() {
            let s = b_point.z - a.z;
            if s == 0.0 {
                continue;
            }
            let field = sample_field(probe, a);
            // Covariance only; the advanced scratch state is discarded in
            // favor of the stored trajectory point.
            let mut scratch = *a;
            transport_step(&field, &mut scratch, &mut m, s, scatter);
            steps += 1;
        }

        Ok(TransportResult {
            state: *last,
            covariance: CovarianceMatrix::new(m),
            steps,
        })
    }
}

/// Independent half-step adaptive strategy.
///
/// Accepts a step when the fractional difference between the full-step and
/// two-half-step endpoint positions is within `rel_tolerance`, halving on
/// rejection and growing after acceptance, with its own minimum-step failure.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveTransport {
    pub params: TransportParams,
}

impl AdaptiveTransport {
    pub fn new(params: TransportParams) -> Self {
        Self { params }
    }

    fn endpoint_error(full: &StateVector, halved: &StateVector) -> f64 {
        let scale = 1.0_f64.max(halved.x.abs()).max(halved.y.abs());
        ((full.x - halved.x).abs()).max((full.y - halved.y).abs()) / scale
    }
}

impl CovarianceTransport for AdaptiveTransport {
    fn transport<P: FieldProbe>(
        &self,
        probe: &P,
        start: &StateVector,
        cov: CovarianceMatrix,
        target_z: Centimeter,
    ) -> Result<TransportResult, SwimError> {
        start.validate()?;
        let dz = target_z - start.z;
        if dz == 0.0 {
            return Ok(TransportResult {
                state: *start,
                covariance: cov,
                steps: 0,
            });
        }
        check_direction(start, target_z)?;

        let scatter = self.params.radiation_length.map(|x0| Scatter {
            x0,
            mass: self.params.mass_hypothesis.mass_for(start.q),
        });
        let mut state = *start;
        let mut m = cov.into_inner();
        let mut h = dz.signum() * self.params.max_step.min(dz.abs());
        let mut steps = 0u64;
        let mut accepted = Trajectory::with_capacity(16);
        accepted.push(*start);

        loop {
            let remaining = target_z - state.z;
            if remaining.abs() < 1.0e-12 {
                break;
            }
            if h.abs() > remaining.abs() {
                h = remaining;
            }

            // Full step against two half steps, field re-sampled mid-way.
            let mut full_state = state;
            let mut full_cov = m;
            let b = sample_field(probe, &state);
            transport_step(&b, &mut full_state, &mut full_cov, h, scatter);

            let mut half_state = state;
            let mut half_cov = m;
            transport_step(&b, &mut half_state, &mut half_cov, 0.5 * h, scatter);
            let b_mid = sample_field(probe, &half_state);
            transport_step(&b_mid, &mut half_state, &mut half_cov, 0.5 * h, scatter);

            steps += 3;
            if steps > self.params.max_steps {
                return Err(SwimError::MaxStepsExceeded(self.params.max_steps));
            }

            if Self::endpoint_error(&full_state, &half_state) <= self.params.rel_tolerance {
                state = half_state;
                m = half_cov;
                if !state.is_finite() {
                    return Err(SwimError::NonFiniteState {
                        path_length: state.path_length,
                    });
                }
                accepted.push(state);
                let grown = h.abs() * self.params.grow_factor;
                h = h.signum() * grown.min(self.params.max_step);
            } else {
                h *= 0.5;
                if h.abs() < self.params.adaptive_min_step {
                    return Err(SwimError::ToleranceNotMet {
                        step: h.abs(),
                        min_step: self.params.adaptive_min_step,
                        path_length: state.path_length,
                        partial: Box::new(accepted),
                    });
                }
            }
        }

        Ok(TransportResult {
            state,
            covariance: CovarianceMatrix::new(m),
            steps,
        })
    }
}

#[cfg(test)]
mod covariance_test {
    use super::*;
    use crate::field::{UniformField, ZeroField};
    use crate::state_vector::Frame;
    use approx::assert_relative_eq;

    fn start_state(q: f64) -> StateVector {
        StateVector::new(0.0, 0.0, 0.0, 0.0, 0.0, q, Frame::Tilted)
    }

    fn seed_cov() -> CovarianceMatrix {
        CovarianceMatrix::from_diagonal([0.01, 0.01, 1.0e-4, 1.0e-4, 1.0e-4])
    }

    #[test]
    fn test_zero_path_is_identity() {
        let probe = UniformField::along_y(-15.0);
        let transport = FixedStepTransport::default();
        let cov = seed_cov();
        let out = transport
            .transport(&probe, &start_state(1.0), cov.clone(), 0.0)
            .unwrap();
        assert_eq!(out.covariance, cov);
        assert_eq!(out.steps, 0);
    }

    #[test]
    fn test_field_free_jacobian_closed_form() {
        // With q = 0 the only Jacobian entries are dx/dtx0 = dy/dty0 = s:
        // C'xx = Cxx + 2 s Cxtx + s² Ctxtx.
        let probe = ZeroField;
        let transport = FixedStepTransport::default();
        let mut m = Matrix5::zeros();
        m[(0, 0)] = 0.04;
        m[(0, 2)] = 0.002;
        m[(2, 0)] = 0.002;
        m[(2, 2)] = 1.0e-4;
        let s = 50.0;
        let out = transport
            .transport(&probe, &start_state(0.0), CovarianceMatrix::new(m), s)
            .unwrap();

        let expected_xx = 0.04 + 2.0 * s * 0.002 + s * s * 1.0e-4;
        assert_relative_eq!(out.covariance[(0, 0)], expected_xx, epsilon = 1e-12);
        assert_relative_eq!(out.covariance[(0, 2)], 0.002 + s * 1.0e-4, epsilon = 1e-12);
        assert_relative_eq!(out.covariance[(2, 2)], 1.0e-4, epsilon = 1e-15);
        assert_eq!(out.steps, 1);
    }

    #[test]
    fn test_transport_preserves_symmetry() {
        let probe = UniformField(nalgebra::Vector3::new(2.0, -15.0, 3.0));
        let transport = FixedStepTransport::default();
        let out = {
            let mut start = start_state(1.0);
            start.tx = 0.2;
            start.ty = -0.1;
            transport
                .transport(&probe, &start, seed_cov(), 80.0)
                .unwrap()
        };
        let m = out.covariance.matrix();
        for i in 0..5 {
            for j in 0..5 {
                assert_relative_eq!(m[(i, j)], m[(j, i)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_scattering_inflates_slope_variances() {
        let probe = UniformField::along_y(-15.0);
        let params = TransportParams::builder()
            .radiation_length(5000.0)
            .build()
            .unwrap();
        let no_scatter = FixedStepTransport::default()
            .transport(&probe, &start_state(1.0), seed_cov(), 100.0)
            .unwrap();
        let scattered = FixedStepTransport::new(params)
            .transport(&probe, &start_state(1.0), seed_cov(), 100.0)
            .unwrap();

        assert!(scattered.covariance[(2, 2)] > no_scatter.covariance[(2, 2)]);
        assert!(scattered.covariance[(3, 3)] > no_scatter.covariance[(3, 3)]);
    }

    #[test]
    fn test_neutral_particle_gets_no_scattering() {
        let probe = ZeroField;
        let params = TransportParams::builder()
            .radiation_length(100.0)
            .build()
            .unwrap();
        let out = FixedStepTransport::new(params)
            .transport(&probe, &start_state(0.0), seed_cov(), 100.0)
            .unwrap();
        // Slope variances unchanged along a neutral straight line.
        assert_relative_eq!(out.covariance[(2, 2)], 1.0e-4, epsilon = 1e-15);
        assert_relative_eq!(out.covariance[(3, 3)], 1.0e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_mass_hypothesis_by_charge_sign() {
        assert_eq!(
            MassHypothesis::ByChargeSign.mass_for(-0.5),
            ELECTRON_MASS
        );
        assert_eq!(MassHypothesis::ByChargeSign.mass_for(0.5), PROTON_MASS);
        assert_eq!(MassHypothesis::Fixed(0.105).mass_for(-0.5), 0.105);
    }

    #[test]
    fn test_step_scales_inversely_with_field() {
        let params = TransportParams::default();
        assert!(params.step_for(40.0) < params.step_for(10.0));
        assert_eq!(params.step_for(0.0), params.max_step);
        // Clamped at both ends.
        assert_eq!(params.step_for(1.0e6), params.min_step);
    }

    #[test]
    fn test_builder_validation() {
        assert!(TransportParams::builder().step(0.0).build().is_err());
        assert!(TransportParams::builder()
            .min_step(2.0)
            .max_step(1.0)
            .build()
            .is_err());
        assert!(TransportParams::builder()
            .radiation_length(-1.0)
            .build()
            .is_err());
        assert!(TransportParams::builder().grow_factor(0.5).build().is_err());
        assert!(TransportParams::builder().build().is_ok());
    }

    #[test]
    fn test_inconsistent_direction_rejected() {
        let probe = UniformField::along_y(-15.0);
        let err = FixedStepTransport::default()
            .transport(&probe, &start_state(1.0), seed_cov(), -50.0)
            .unwrap_err();
        assert!(matches!(err, SwimError::InconsistentDirection { .. }));
    }
}
