//! # Single-step advancers
//!
//! One Runge-Kutta step of the equations of motion. [`UniformAdvancer`] is
//! the classic 4-stage RK4 update with no error output; [`HalfStepAdvancer`]
//! additionally estimates the local error by comparing one full step against
//! two consecutive half steps, which is what the adaptive driver consumes.

use crate::derivative::Ode;

/// Advance a state by one step of size `h`.
pub trait StepAdvancer<const N: usize> {
    /// Advance `y` by `h`, writing the result into `y_out`.
    ///
    /// Returns the per-component absolute local error estimate when the
    /// advancer computes one, `None` otherwise.
    fn advance<S: Ode<N>>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
        y_out: &mut [f64; N],
    ) -> Option<[f64; N]>;

    /// Whether [`StepAdvancer::advance`] produces an error estimate.
    fn computes_error(&self) -> bool {
        false
    }
}

/// Classic 4-stage fourth-order Runge-Kutta update.
///
/// All stage storage is local to the call; nothing is shared across steps or
/// invocations.
pub(crate) fn rk4_step<S: Ode<N>, const N: usize>(
    sys: &S,
    t: f64,
    y: &[f64; N],
    h: f64,
    y_out: &mut [f64; N],
) {
    let mut k1 = [0.0; N];
    let mut k2 = [0.0; N];
    let mut k3 = [0.0; N];
    let mut k4 = [0.0; N];
    let mut y_tmp = [0.0; N];

    sys.eval(t, y, &mut k1);

    for n in 0..N {
        y_tmp[n] = y[n] + 0.5 * h * k1[n];
    }
    sys.eval(t + 0.5 * h, &y_tmp, &mut k2);

    for n in 0..N {
        y_tmp[n] = y[n] + 0.5 * h * k2[n];
    }
    sys.eval(t + 0.5 * h, &y_tmp, &mut k3);

    for n in 0..N {
        y_tmp[n] = y[n] + h * k3[n];
    }
    sys.eval(t + h, &y_tmp, &mut k4);

    for n in 0..N {
        y_out[n] = y[n] + h / 6.0 * (k1[n] + 2.0 * k2[n] + 2.0 * k3[n] + k4[n]);
    }
}

/// Plain RK4 step, no error estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformAdvancer;

impl<const N: usize> StepAdvancer<N> for UniformAdvancer {
    fn advance<S: Ode<N>>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
        y_out: &mut [f64; N],
    ) -> Option<[f64; N]> {
        rk4_step(sys, t, y, h, y_out);
        None
    }
}

/// RK4 step with a half-step local error estimate.
///
/// Performs one full step of size `h` and two consecutive steps of size
/// `h/2` from the same starting state. The two-half-step result is the more
/// accurate and is returned as the solution; the per-component absolute
/// difference between the two results is returned as the local error
/// estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfStepAdvancer;

impl<const N: usize> StepAdvancer<N> for HalfStepAdvancer {
    fn advance<S: Ode<N>>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
        y_out: &mut [f64; N],
    ) -> Option<[f64; N]> {
        let mut y_full = [0.0; N];
        rk4_step(sys, t, y, h, &mut y_full);

        let half = 0.5 * h;
        let mut y_mid = [0.0; N];
        rk4_step(sys, t, y, half, &mut y_mid);
        rk4_step(sys, t + half, &y_mid, half, y_out);

        let mut err = [0.0; N];
        for n in 0..N {
            err[n] = (y_out[n] - y_full[n]).abs();
        }
        Some(err)
    }

    fn computes_error(&self) -> bool {
        true
    }
}
