pub mod constants;
pub mod covariance;
pub mod derivative;
pub mod driver;
pub mod field;
pub mod frame;
pub mod magswim_errors;
pub mod state_vector;
pub mod stepper;
pub mod trajectory;

pub use covariance::{
    AdaptiveTransport, CovarianceMatrix, CovarianceTransport, FixedStepTransport, MassHypothesis,
    TrajectoryTransport, TransportParams, TransportResult,
};
pub use driver::{
    AdaptiveDriver, DriverState, Stats, StopCondition, SwimOutcome, SwimOutput, SwimParams,
    Swimmer, ZStopper,
};
pub use field::{FieldProbe, TeslaField, UniformField, ZeroField};
pub use frame::TiltRotation;
pub use magswim_errors::SwimError;
pub use state_vector::{Frame, StateVector};
pub use trajectory::Trajectory;
