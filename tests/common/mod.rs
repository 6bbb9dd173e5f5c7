use approx::assert_relative_eq;
use magswim::StateVector;

/// Assert that two states agree in position and slopes.
pub fn assert_state_close(actual: &StateVector, expected: &StateVector, epsilon: f64) {
    assert_relative_eq!(actual.x, expected.x, epsilon = epsilon);
    assert_relative_eq!(actual.y, expected.y, epsilon = epsilon);
    assert_relative_eq!(actual.z, expected.z, epsilon = epsilon);
    assert_relative_eq!(actual.tx, expected.tx, epsilon = epsilon);
    assert_relative_eq!(actual.ty, expected.ty, epsilon = epsilon);
}
