use thiserror::Error;

use crate::trajectory::Trajectory;

/// Errors reported by the swimming and covariance-transport entry points.
///
/// Numerical failures are returned to the caller as explicit results, never
/// masked by clamping or silent defaults. Degenerate-but-valid inputs (zero
/// charge, identically-zero field) are *not* errors: they take a deliberate
/// straight-line path instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwimError {
    /// The step size fell below the configured minimum before any step was
    /// accepted. Integration is aborted; `partial` holds the accepted states
    /// up to the failure and is marked incomplete.
    #[error(
        "tolerance not met: step size {step:.3e} cm fell below the minimum {min_step:.3e} cm at path length {path_length:.3} cm"
    )]
    ToleranceNotMet {
        step: f64,
        min_step: f64,
        path_length: f64,
        partial: Box<Trajectory>,
    },

    /// The requested target implies a pz sign incompatible with the supplied
    /// start state. Detected before integration begins.
    #[error(
        "inconsistent direction: reaching z = {target_z:.3} cm from z = {start_z:.3} cm requires pz sign {required:+}, start state has {actual:+}"
    )]
    InconsistentDirection {
        start_z: f64,
        target_z: f64,
        required: i8,
        actual: i8,
    },

    /// The initial state is missing a required component or contains a NaN.
    #[error("invalid start state: {0}")]
    InvalidStart(String),

    /// The state became non-finite during integration (the fixed-coordinate
    /// parameterization diverges for trajectories that turn around).
    #[error("state became non-finite at path length {path_length:.3} cm")]
    NonFiniteState { path_length: f64 },

    /// The step budget was exhausted before reaching the target.
    #[error("maximum step count {0} exceeded")]
    MaxStepsExceeded(u64),

    /// A configuration builder was given an inconsistent or out-of-range value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
