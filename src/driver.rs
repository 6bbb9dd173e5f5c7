//! # Adaptive swimming driver
//!
//! Drives repeated half-step Runge-Kutta stepping of the equations of motion,
//! accepting, rejecting and resizing steps against a per-component absolute
//! tolerance until a [`StopCondition`] terminates the swim.
//!
//! ## Overview
//!
//! * [`SwimParams`] — step-size limits, tolerances and budgets, with a
//!   validating builder.
//! * [`StopCondition`] / [`ZStopper`] — two-phase boundary semantics:
//!   `stop_integration` fires as soon as a step reaches or crosses the
//!   target (the driver stops growing the step and refines instead), while
//!   `terminate_integration` fires only once the state is within the
//!   configured accuracy of the target, which is what actually ends the loop.
//!   The distinction prevents accepting a coarse step that merely crosses the
//!   boundary without landing on it.
//! * [`AdaptiveDriver`] — the step state machine, exposed as a lazy, finite,
//!   non-restartable iterator of accepted [`StateVector`]s.
//! * [`Swimmer`] — facade that validates the start state, detects an
//!   inconsistent direction before integrating, short-circuits degenerate
//!   inputs (zero charge, zero field) to the straight-line closed form, and
//!   collects the iterator into a [`Trajectory`].
//!
//! ## State machine
//!
//! ```text
//! Ready ──step──▶ Stepping ──within tolerance──▶ Accepted ──▶ Ready | Done
//!    ▲                │
//!    │                └─────error too large─────▶ Rejected ──▶ Ready | Failed
//!    └──────────────── halve / refine ◀──────────────┘
//! ```
//!
//! `Ready` is initial; `Done` and `Failed` are terminal. A `Failed` driver
//! has already yielded the corresponding [`SwimError`].
//!
//! Every buffer the driver touches is owned by the driver value itself;
//! nothing is shared between calls or threads.

use std::fmt;

use crate::constants::Centimeter;
use crate::derivative::{FixedZDerivative, PathLengthDerivative};
use crate::field::FieldProbe;
use crate::magswim_errors::SwimError;
use crate::state_vector::StateVector;
use crate::stepper::{HalfStepAdvancer, StepAdvancer, UniformAdvancer};
use crate::trajectory::Trajectory;

/// Squared-slope ceiling above which the fixed-coordinate parameterization is
/// considered to have left its domain of validity (the track is turning
/// around in z).
const SLOPE_CAP_SQ: f64 = 1.0e6;

// -------------------------------------------------------------------------------------------------
// Parameters
// -------------------------------------------------------------------------------------------------

/// Configuration of the adaptive driver.
///
/// Defaults are tuned for spectrometer-scale swims (hundreds of centimeters
/// through fields of a few tens of kilogauss). All lengths in centimeters.
#[derive(Debug, Clone)]
pub struct SwimParams {
    /// Initial step size.
    pub h_init: Centimeter,
    /// Minimum step size; falling below it without an accepted step is a
    /// [`SwimError::ToleranceNotMet`] failure.
    pub h_min: Centimeter,
    /// Maximum step size after growth.
    pub h_max: Centimeter,
    /// Step growth factor applied after every accepted step.
    pub grow_factor: f64,
    /// Per-component absolute tolerance on the local error estimate, over
    /// the path-length state `(x, y, z, ux, uy, uz)`.
    pub tolerance: [f64; 6],
    /// Accuracy with which the target z must be reached.
    pub z_accuracy: Centimeter,
    /// Hard limit on the accumulated path length.
    pub max_path_length: Centimeter,
    /// Budget on attempted steps (accepted plus rejected).
    pub max_steps: u64,
}

impl Default for SwimParams {
    fn default() -> Self {
        Self {
            h_init: 1.0,
            h_min: 1.0e-4,
            h_max: 40.0,
            grow_factor: 1.5,
            tolerance: [1.0e-5, 1.0e-5, 1.0e-5, 1.0e-6, 1.0e-6, 1.0e-6],
            z_accuracy: 1.0e-3,
            max_path_length: 800.0,
            max_steps: 10_000,
        }
    }
}

impl SwimParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent builder over the defaults, validated at [`SwimParamsBuilder::build`].
    pub fn builder() -> SwimParamsBuilder {
        SwimParamsBuilder::new()
    }
}

impl fmt::Display for SwimParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Swim parameters")?;
            writeln!(f, "---------------")?;
            writeln!(f, "  h_init          = {:.3e} cm", self.h_init)?;
            writeln!(f, "  h_min           = {:.3e} cm", self.h_min)?;
            writeln!(f, "  h_max           = {:.3e} cm", self.h_max)?;
            writeln!(f, "  grow_factor     = {:.3}", self.grow_factor)?;
            writeln!(f, "  tolerance       = {:?}", self.tolerance)?;
            writeln!(f, "  z_accuracy      = {:.3e} cm", self.z_accuracy)?;
            writeln!(f, "  max_path_length = {:.1} cm", self.max_path_length)?;
            writeln!(f, "  max_steps       = {}", self.max_steps)
        } else {
            write!(
                f,
                "SwimParams(h∈[{:.1e},{:.1e}]cm, grow={:.2}, z_acc={:.1e}cm, s_max={:.0}cm)",
                self.h_min, self.h_max, self.grow_factor, self.z_accuracy, self.max_path_length
            )
        }
    }
}

/// Builder for [`SwimParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct SwimParamsBuilder {
    params: SwimParams,
}

impl SwimParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: SwimParams::default(),
        }
    }

    pub fn h_init(mut self, v: Centimeter) -> Self {
        self.params.h_init = v;
        self
    }
    pub fn h_min(mut self, v: Centimeter) -> Self {
        self.params.h_min = v;
        self
    }
    pub fn h_max(mut self, v: Centimeter) -> Self {
        self.params.h_max = v;
        self
    }
    pub fn grow_factor(mut self, v: f64) -> Self {
        self.params.grow_factor = v;
        self
    }
    pub fn tolerance(mut self, v: [f64; 6]) -> Self {
        self.params.tolerance = v;
        self
    }
    /// Uniform absolute tolerance on the three position components.
    pub fn position_tolerance(mut self, v: f64) -> Self {
        self.params.tolerance[0] = v;
        self.params.tolerance[1] = v;
        self.params.tolerance[2] = v;
        self
    }
    /// Uniform absolute tolerance on the three direction components.
    pub fn direction_tolerance(mut self, v: f64) -> Self {
        self.params.tolerance[3] = v;
        self.params.tolerance[4] = v;
        self.params.tolerance[5] = v;
        self
    }
    pub fn z_accuracy(mut self, v: Centimeter) -> Self {
        self.params.z_accuracy = v;
        self
    }
    pub fn max_path_length(mut self, v: Centimeter) -> Self {
        self.params.max_path_length = v;
        self
    }
    pub fn max_steps(mut self, v: u64) -> Self {
        self.params.max_steps = v;
        self
    }

    /// Finalize and validate.
    ///
    /// Validation rules
    /// -----------------
    /// * `0 < h_min ≤ h_init ≤ h_max`
    /// * `grow_factor > 1.0`
    /// * every tolerance component `> 0`
    /// * `z_accuracy ≥ h_min` (refinement near the boundary must be able to
    ///   land inside the accuracy window with an admissible step)
    /// * `max_path_length > 0`, `max_steps ≥ 1`
    pub fn build(self) -> Result<SwimParams, SwimError> {
        let p = &self.params;
        if !(p.h_min > 0.0 && p.h_min <= p.h_init && p.h_init <= p.h_max) {
            return Err(SwimError::InvalidParameter(
                "require 0 < h_min <= h_init <= h_max".into(),
            ));
        }
        if !(p.grow_factor > 1.0) {
            return Err(SwimError::InvalidParameter(
                "grow_factor must be > 1".into(),
            ));
        }
        if p.tolerance.iter().any(|&t| !(t > 0.0)) {
            return Err(SwimError::InvalidParameter(
                "tolerance components must be > 0".into(),
            ));
        }
        if !(p.z_accuracy >= p.h_min) {
            return Err(SwimError::InvalidParameter(
                "z_accuracy must be at least h_min".into(),
            ));
        }
        if !(p.max_path_length > 0.0) {
            return Err(SwimError::InvalidParameter(
                "max_path_length must be > 0".into(),
            ));
        }
        if p.max_steps == 0 {
            return Err(SwimError::InvalidParameter("max_steps must be >= 1".into()));
        }
        Ok(self.params)
    }
}

// -------------------------------------------------------------------------------------------------
// Stop condition
// -------------------------------------------------------------------------------------------------

/// Two-phase termination test for the adaptive driver.
pub trait StopCondition {
    /// True as soon as `state` has reached or crossed the target; the driver
    /// stops growing the step and refines toward the boundary instead.
    fn stop_integration(&self, state: &StateVector) -> bool;

    /// True only once `state` is within the accuracy tolerance of the target
    /// (or past the hard path-length limit); ends the loop.
    fn terminate_integration(&self, state: &StateVector) -> bool;

    /// Estimate of the path length remaining to the target, used to aim
    /// refinement steps. Sign-free.
    fn distance_to_target(&self, state: &StateVector) -> Centimeter;
}

/// Stop condition targeting a fixed z plane over a path-length swim.
#[derive(Debug, Clone, Copy)]
pub struct ZStopper {
    pub target_z: Centimeter,
    pub accuracy: Centimeter,
    pub max_path_length: Centimeter,
}

impl ZStopper {
    pub fn new(target_z: Centimeter, accuracy: Centimeter, max_path_length: Centimeter) -> Self {
        Self {
            target_z,
            accuracy,
            max_path_length,
        }
    }
}

impl StopCondition for ZStopper {
    fn stop_integration(&self, state: &StateVector) -> bool {
        // Signed distance along the motion; non-positive once the target is
        // reached or crossed.
        let remaining = (self.target_z - state.z) * state.dir_sign;
        remaining <= self.accuracy || state.path_length >= self.max_path_length
    }

    fn terminate_integration(&self, state: &StateVector) -> bool {
        (state.z - self.target_z).abs() <= self.accuracy
            || state.path_length >= self.max_path_length
    }

    fn distance_to_target(&self, state: &StateVector) -> Centimeter {
        let k = (1.0 + state.tx * state.tx + state.ty * state.ty).sqrt();
        ((self.target_z - state.z) * k).abs()
    }
}

// -------------------------------------------------------------------------------------------------
// Driver
// -------------------------------------------------------------------------------------------------

/// Observable state of the driver machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Ready,
    Stepping,
    Accepted,
    Rejected,
    Done,
    Failed,
}

/// Integration statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    /// Right-hand-side evaluations.
    pub rhs_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

/// The adaptive stepping machine, surfaced as an iterator of accepted states.
///
/// Yields `Ok(state)` for every accepted step (the final yielded state is the
/// end state of the swim) and at most one `Err` before fusing. The iterator
/// is finite and non-restartable; collect it with [`Swimmer::swim_to_z`] or
/// consume it directly for streaming access.
pub struct AdaptiveDriver<'a, P: FieldProbe, C: StopCondition> {
    sys: PathLengthDerivative<'a, P>,
    probe: &'a P,
    advancer: HalfStepAdvancer,
    stopper: C,
    params: &'a SwimParams,
    /// Path-length state `(x, y, z, ux, uy, uz)`.
    y: [f64; 6],
    /// Accumulated path length.
    s: f64,
    /// Path length at which the hard budget runs out.
    s_limit: f64,
    /// Current step size.
    h: f64,
    current: StateVector,
    machine: DriverState,
    stats: Stats,
    attempts: u64,
    // Scratch for the in-flight trial step; owned by this driver value.
    y_trial: [f64; 6],
    trial: StateVector,
    trial_within_tol: bool,
    boundary_reject: bool,
}

impl<'a, P: FieldProbe, C: StopCondition> AdaptiveDriver<'a, P, C> {
    pub(crate) fn new(
        probe: &'a P,
        params: &'a SwimParams,
        stopper: C,
        start: StateVector,
    ) -> Self {
        Self {
            sys: PathLengthDerivative::new(probe, start.q),
            probe,
            advancer: HalfStepAdvancer,
            stopper,
            params,
            y: start.to_path_state(),
            s: start.path_length,
            s_limit: start.path_length + params.max_path_length,
            h: params.h_init,
            current: start,
            machine: DriverState::Ready,
            stats: Stats::default(),
            attempts: 0,
            y_trial: [0.0; 6],
            trial: start,
            trial_within_tol: false,
            boundary_reject: false,
        }
    }

    /// Current machine state.
    pub fn state(&self) -> DriverState {
        self.machine
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Current step size [cm].
    pub fn step_size(&self) -> Centimeter {
        self.h
    }

    fn materialize(&self, s: f64, y: &[f64; 6]) -> StateVector {
        let mut sv = self.current;
        sv.update_from_path_state(s, y);
        sv.b = if self.probe.is_zero_field() {
            0.0
        } else {
            self.probe.field(sv.x, sv.y, sv.z).norm()
        };
        sv
    }

    /// Ready: clamp the step against the path-length budget and attempt it.
    fn on_ready(&mut self) -> Option<SwimError> {
        self.attempts += 1;
        if self.attempts > self.params.max_steps {
            self.machine = DriverState::Failed;
            return Some(SwimError::MaxStepsExceeded(self.params.max_steps));
        }
        let remaining_budget = self.s_limit - self.s;
        if remaining_budget > 0.0 {
            self.h = self.h.min(remaining_budget);
        }
        self.machine = DriverState::Stepping;
        None
    }

    /// Stepping: evaluate the trial step and classify it.
    fn on_stepping(&mut self) {
        let err = self
            .advancer
            .advance(&self.sys, self.s, &self.y, self.h, &mut self.y_trial)
            .unwrap_or([0.0; 6]);
        // One full step plus two half steps, four RHS evaluations each.
        self.stats.rhs_evals += 12;

        self.trial = self.materialize(self.s + self.h, &self.y_trial);
        self.trial_within_tol = err
            .iter()
            .zip(self.params.tolerance.iter())
            .all(|(e, tol)| e <= tol);

        if self.stopper.terminate_integration(&self.trial) {
            // The boundary forces acceptance: the trial landed inside the
            // accuracy window (or exhausted the path budget).
            self.machine = DriverState::Accepted;
        } else if self.stopper.stop_integration(&self.trial)
            && !self.stopper.stop_integration(&self.current)
            && self.trial.dir_sign == self.current.dir_sign
        {
            // This step crossed the target without landing on it; refine
            // instead of growing, regardless of the error estimate. A track
            // curling back in z (direction flipped mid-step, or already past
            // the plane) keeps stepping normally until it recrosses the
            // target or runs out of path.
            self.boundary_reject = true;
            self.machine = DriverState::Rejected;
        } else if self.trial_within_tol {
            self.machine = DriverState::Accepted;
        } else {
            self.boundary_reject = false;
            self.machine = DriverState::Rejected;
        }
    }

    /// Accepted: commit the trial, grow the step, query the stop condition.
    fn on_accepted(&mut self) -> Result<StateVector, SwimError> {
        self.y = self.y_trial;
        self.s += self.h;
        self.current = self.trial;
        self.stats.accepted_steps += 1;

        if !self.current.is_finite() {
            self.machine = DriverState::Failed;
            return Err(SwimError::NonFiniteState {
                path_length: self.s,
            });
        }

        if self.stopper.terminate_integration(&self.current) {
            self.machine = DriverState::Done;
        } else {
            self.h = (self.h * self.params.grow_factor).min(self.params.h_max);
            self.machine = DriverState::Ready;
        }
        Ok(self.current)
    }

    /// Rejected: halve (error) or aim at the boundary (crossing), failing
    /// once the step cannot shrink further.
    fn on_rejected(&mut self) -> Option<SwimError> {
        self.stats.rejected_steps += 1;
        if self.boundary_reject {
            let remaining = self.stopper.distance_to_target(&self.current);
            self.h = (0.5 * remaining).clamp(self.params.h_min, self.params.h_max);
            self.machine = DriverState::Ready;
            return None;
        }

        let halved = 0.5 * self.h;
        if halved < self.params.h_min {
            self.machine = DriverState::Failed;
            return Some(SwimError::ToleranceNotMet {
                step: halved,
                min_step: self.params.h_min,
                path_length: self.s,
                partial: Box::default(),
            });
        }
        self.h = halved;
        self.machine = DriverState::Ready;
        None
    }
}

impl<P: FieldProbe, C: StopCondition> Iterator for AdaptiveDriver<'_, P, C> {
    type Item = Result<StateVector, SwimError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.machine {
                DriverState::Done | DriverState::Failed => return None,
                DriverState::Ready => {
                    if let Some(err) = self.on_ready() {
                        return Some(Err(err));
                    }
                }
                DriverState::Stepping => self.on_stepping(),
                DriverState::Accepted => return Some(self.on_accepted()),
                DriverState::Rejected => {
                    if let Some(err) = self.on_rejected() {
                        return Some(Err(err));
                    }
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Swimmer facade
// -------------------------------------------------------------------------------------------------

/// How a completed swim ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwimOutcome {
    /// The end state is within `z_accuracy` of the target plane.
    ReachedTarget,
    /// The hard path-length limit was exhausted before reaching the target.
    ReachedMaxPathLength,
}

/// Result of a completed swim.
#[derive(Debug, Clone)]
pub struct SwimOutput {
    pub trajectory: Trajectory,
    pub outcome: SwimOutcome,
    pub stats: Stats,
}

/// Swims charged particles from a start state to a target z plane.
///
/// One `Swimmer` may serve many calls; every call owns its scratch buffers,
/// so independent swims may run concurrently on separate threads as long as
/// the probe itself is read-only (see [`crate::field`]).
pub struct Swimmer<'a, P> {
    probe: &'a P,
    params: SwimParams,
}

impl<'a, P: FieldProbe> Swimmer<'a, P> {
    pub fn new(probe: &'a P, params: SwimParams) -> Self {
        Self { probe, params }
    }

    pub fn params(&self) -> &SwimParams {
        &self.params
    }

    /// Lazy stream of accepted states toward `target_z`.
    ///
    /// Pre-flight failures (`InvalidStart`, `InconsistentDirection`) surface
    /// here; mid-swim failures are yielded by the iterator. Callers that need
    /// the partial trajectory of a failed swim can collect states until the
    /// `Err`.
    pub fn steps(
        &self,
        start: &StateVector,
        target_z: Centimeter,
    ) -> Result<AdaptiveDriver<'_, P, ZStopper>, SwimError> {
        start.validate()?;
        self.check_direction(start, target_z)?;
        let stopper = ZStopper::new(
            target_z,
            self.params.z_accuracy,
            start.path_length + self.params.max_path_length,
        );
        Ok(AdaptiveDriver::new(self.probe, &self.params, stopper, *start))
    }

    /// Swim to the target z plane and collect the trajectory.
    ///
    /// Arguments
    /// ---------
    /// * `start`: initial state; its frame tag is carried through unchanged.
    /// * `target_z`: target plane in the same frame as `start` [cm].
    ///
    /// Return
    /// ------
    /// * `Ok(SwimOutput)` with the frozen trajectory (first element the start
    ///   state, last the end state at or near the target) and the outcome.
    /// * `Err(SwimError)` on invalid input or numerical failure; a
    ///   `ToleranceNotMet` failure carries the partial trajectory, marked
    ///   incomplete.
    ///
    /// Zero charge or an identically-zero field are not errors: the exact
    /// straight-line closed form is returned without integration.
    pub fn swim_to_z(
        &self,
        start: &StateVector,
        target_z: Centimeter,
    ) -> Result<SwimOutput, SwimError> {
        start.validate()?;

        // Already there.
        if (start.z - target_z).abs() <= self.params.z_accuracy {
            let mut trajectory = Trajectory::with_capacity(1);
            trajectory.push(*start);
            trajectory.freeze();
            return Ok(SwimOutput {
                trajectory,
                outcome: SwimOutcome::ReachedTarget,
                stats: Stats::default(),
            });
        }

        self.check_direction(start, target_z)?;

        // Degenerate-but-valid inputs take the exact straight line.
        if start.q == 0.0 || self.probe.is_zero_field() {
            return Ok(self.straight_line(start, target_z));
        }

        let mut driver = self.steps(start, target_z)?;
        let mut trajectory = Trajectory::with_capacity(32);
        let mut first = *start;
        first.b = self.probe.field(first.x, first.y, first.z).norm();
        trajectory.push(first);

        for item in driver.by_ref() {
            match item {
                Ok(state) => trajectory.push(state),
                Err(SwimError::ToleranceNotMet {
                    step,
                    min_step,
                    path_length,
                    ..
                }) => {
                    return Err(SwimError::ToleranceNotMet {
                        step,
                        min_step,
                        path_length,
                        partial: Box::new(trajectory),
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let outcome = match trajectory.last() {
            Some(last) if (last.z - target_z).abs() <= self.params.z_accuracy => {
                SwimOutcome::ReachedTarget
            }
            _ => SwimOutcome::ReachedMaxPathLength,
        };
        trajectory.freeze();
        Ok(SwimOutput {
            trajectory,
            outcome,
            stats: driver.stats(),
        })
    }

    /// Swim with z itself as the independent variable, in uniform RK4 steps.
    ///
    /// Uses the fixed-coordinate parameterization `(x, y, tx, ty)` with the
    /// [`UniformAdvancer`]: cheaper than the adaptive path-length swim and
    /// physically equivalent to it within tolerance, but only valid while the
    /// motion is monotonic in z. An incompatible pz sign is rejected before
    /// integration; a track that starts turning around mid-swim drives the
    /// slopes out of range and fails with `NonFiniteState` rather than
    /// silently diverging.
    ///
    /// `step` is the uniform step in z [cm]; the last step is shortened to
    /// land exactly on the target.
    pub fn swim_plane(
        &self,
        start: &StateVector,
        target_z: Centimeter,
        step: Centimeter,
    ) -> Result<SwimOutput, SwimError> {
        start.validate()?;
        if !(step > 0.0) {
            return Err(SwimError::InvalidParameter("step must be > 0".into()));
        }

        if (start.z - target_z).abs() <= self.params.z_accuracy {
            let mut trajectory = Trajectory::with_capacity(1);
            trajectory.push(*start);
            trajectory.freeze();
            return Ok(SwimOutput {
                trajectory,
                outcome: SwimOutcome::ReachedTarget,
                stats: Stats::default(),
            });
        }

        self.check_direction(start, target_z)?;
        if start.q == 0.0 || self.probe.is_zero_field() {
            return Ok(self.straight_line(start, target_z));
        }

        let dz = target_z - start.z;
        let n = (dz.abs() / step).ceil().max(1.0) as u64;
        if n > self.params.max_steps {
            return Err(SwimError::MaxStepsExceeded(self.params.max_steps));
        }
        let h = dz / n as f64;

        let sys = FixedZDerivative::new(self.probe, start.q);
        let advancer = UniformAdvancer;
        let mut y = [start.x, start.y, start.tx, start.ty];
        let mut z = start.z;
        let mut current = *start;
        let mut stats = Stats::default();

        let mut trajectory = Trajectory::with_capacity(n as usize + 1);
        current.b = self.probe.field(current.x, current.y, current.z).norm();
        trajectory.push(current);

        for _ in 0..n {
            let mut y_next = [0.0; 4];
            advancer.advance(&sys, z, &y, h, &mut y_next);
            stats.rhs_evals += 4;

            let k = (1.0 + y_next[2] * y_next[2] + y_next[3] * y_next[3]).sqrt();
            if !y_next.iter().all(|v| v.is_finite()) || k * k > SLOPE_CAP_SQ {
                return Err(SwimError::NonFiniteState {
                    path_length: current.path_length,
                });
            }

            y = y_next;
            z += h;
            current.x = y[0];
            current.y = y[1];
            current.tx = y[2];
            current.ty = y[3];
            current.z = z;
            current.path_length += h.abs() * k;
            current.b = self.probe.field(current.x, current.y, current.z).norm();
            stats.accepted_steps += 1;
            trajectory.push(current);
        }

        trajectory.freeze();
        Ok(SwimOutput {
            trajectory,
            outcome: SwimOutcome::ReachedTarget,
            stats,
        })
    }

    /// Fail fast when the target implies a pz sign the start state cannot
    /// have without turning around.
    fn check_direction(&self, start: &StateVector, target_z: Centimeter) -> Result<(), SwimError> {
        let dz = target_z - start.z;
        if dz.abs() <= self.params.z_accuracy {
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

    /// Exact straight-line swim: `x(z) = x0 + tx·(z − z0)`, idem y.
    fn straight_line(&self, start: &StateVector, target_z: Centimeter) -> SwimOutput {
        let k = (1.0 + start.tx * start.tx + start.ty * start.ty).sqrt();
        let mut dz = target_z - start.z;
        let mut outcome = SwimOutcome::ReachedTarget;

        // Honor the hard path-length limit even on the closed form.
        let path = dz.abs() * k;
        if path > self.params.max_path_length {
            dz *= self.params.max_path_length / path;
            outcome = SwimOutcome::ReachedMaxPathLength;
        }

        let mut end = *start;
        end.x = start.x + start.tx * dz;
        end.y = start.y + start.ty * dz;
        end.z = start.z + dz;
        end.path_length = start.path_length + dz.abs() * k;

        let mut trajectory = Trajectory::with_capacity(2);
        trajectory.push(*start);
        trajectory.push(end);
        trajectory.freeze();
        SwimOutput {
            trajectory,
            outcome,
            stats: Stats::default(),
        }
    }
}
