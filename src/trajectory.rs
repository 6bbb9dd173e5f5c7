//! # Swum trajectories
//!
//! A [`Trajectory`] is the ordered sequence of accepted [`StateVector`]s
//! produced by one integration call: the first element is the start state,
//! the last the end state at or near the target. It is appended to while the
//! swim is in flight and frozen when the call completes; a trajectory
//! returned inside a [`crate::magswim_errors::SwimError::ToleranceNotMet`]
//! failure is left unfrozen so callers can tell a partial result apart.

use serde::{Deserialize, Serialize};

use crate::constants::Centimeter;
use crate::state_vector::StateVector;

/// Ordered, immutable-once-built sequence of accepted states from one swim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    states: Vec<StateVector>,
    complete: bool,
}

impl Trajectory {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
            complete: false,
        }
    }

    pub(crate) fn push(&mut self, state: StateVector) {
        debug_assert!(!self.complete, "trajectory is frozen");
        self.states.push(state);
    }

    pub(crate) fn freeze(&mut self) {
        self.complete = true;
    }

    /// Whether the swim that produced this trajectory ran to completion.
    ///
    /// False for the partial trajectory carried by a
    /// [`crate::magswim_errors::SwimError::ToleranceNotMet`] failure.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Start state of the swim.
    pub fn first(&self) -> Option<&StateVector> {
        self.states.first()
    }

    /// End state, at or near the target for a complete trajectory.
    pub fn last(&self) -> Option<&StateVector> {
        self.states.last()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Accepted states in swim order.
    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StateVector> {
        self.states.iter()
    }

    /// Path length accumulated between the first and last state [cm].
    pub fn total_path_length(&self) -> Centimeter {
        match (self.states.first(), self.states.last()) {
            (Some(first), Some(last)) => last.path_length - first.path_length,
            _ => 0.0,
        }
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a StateVector;
    type IntoIter = std::slice::Iter<'a, StateVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

impl std::ops::Index<usize> for Trajectory {
    type Output = StateVector;

    fn index(&self, i: usize) -> &StateVector {
        &self.states[i]
    }
}
