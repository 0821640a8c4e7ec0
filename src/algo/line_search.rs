//! Backtracking line search.

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, RealField};
use num_traits::Zero;

use crate::core::VectorArray;

/// Options for [`armijo`].
#[derive(Debug, Clone, Copy, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ArmijoOptions<F: RealField + Copy> {
    /// Initial step length. Default: `1.0`.
    alpha_init: F,
    /// Factor by which the step shrinks after a rejected candidate. Default:
    /// `0.5`.
    tau: F,
    /// Sufficient decrease coefficient. Default: `1e-4`.
    beta: F,
    /// Maximum number of backtracking steps. Default: `10`.
    maxiter: usize,
}

impl<F: RealField + Copy> Default for ArmijoOptions<F> {
    fn default() -> Self {
        Self {
            alpha_init: convert(1.0),
            tau: convert(0.5),
            beta: convert(1e-4),
            maxiter: 10,
        }
    }
}

/// Determine a step length along `direction` by Armijo backtracking.
///
/// Starting from `alpha_init`, the candidate step is shrunk by `tau` until
/// `f(starting_point + alpha * direction)` drops below
/// `f(starting_point) + beta * alpha * slope`, where the slope is the
/// directional derivative `grad . direction` clamped to be non-positive
/// (without a gradient, plain decrease is required). `initial_value` avoids
/// re-evaluating `f` at the starting point when the caller already knows it.
///
/// When the iteration budget runs out, the last (smallest) candidate step is
/// returned so that the caller can still make progress.
pub fn armijo<A, F>(
    f: F,
    starting_point: &A,
    direction: &A,
    grad: Option<&A>,
    initial_value: Option<A::Field>,
    options: &ArmijoOptions<A::Field>,
) -> A::Field
where
    A: VectorArray,
    F: Fn(&A) -> A::Field,
{
    let initial_value = initial_value.unwrap_or_else(|| f(starting_point));
    let slope = grad
        .map(|g| g.dot(direction)[(0, 0)].min(A::Field::zero()))
        .unwrap_or_else(A::Field::zero);

    let mut alpha = options.alpha_init;
    for _ in 0..options.maxiter {
        let mut candidate = starting_point.clone();
        candidate.axpy(&[alpha], direction);
        if f(&candidate) <= initial_value + options.beta * alpha * slope {
            return alpha;
        }
        alpha = alpha * options.tau;
    }

    debug!(
        "no sufficient decrease within {} backtracking steps",
        options.maxiter
    );
    alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseArray;
    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    fn quadratic(u: &DenseArray<f64>) -> f64 {
        u.vectors()[0].norm_squared()
    }

    #[test]
    fn full_step_accepted_when_sufficient() {
        let x = DenseArray::from_vectors(vec![dvector![1.0, 1.0]]);
        let direction = DenseArray::from_vectors(vec![dvector![-1.0, -1.0]]);
        let grad = DenseArray::from_vectors(vec![dvector![2.0, 2.0]]);
        let step = armijo(
            quadratic,
            &x,
            &direction,
            Some(&grad),
            None,
            &ArmijoOptions::default(),
        );
        assert_abs_diff_eq!(step, 1.0);
    }

    #[test]
    fn backtracks_on_overshoot() {
        let x = DenseArray::from_vectors(vec![dvector![1.0]]);
        // Stepping by 10 overshoots the minimum of f(x) = x^2 badly.
        let direction = DenseArray::from_vectors(vec![dvector![-10.0]]);
        let grad = DenseArray::from_vectors(vec![dvector![2.0]]);
        let step = armijo(
            quadratic,
            &x,
            &direction,
            Some(&grad),
            None,
            &ArmijoOptions::default(),
        );
        assert!(step < 1.0);
        let mut candidate = x.clone();
        candidate.axpy(&[step], &direction);
        assert!(quadratic(&candidate) < quadratic(&x));
    }

    #[test]
    fn exhausted_budget_returns_smallest_candidate() {
        let x = DenseArray::from_vectors(vec![dvector![1.0]]);
        // An ascent direction can never satisfy the decrease condition.
        let direction = DenseArray::from_vectors(vec![dvector![5.0]]);
        let options = ArmijoOptions::default();
        let step = armijo(quadratic, &x, &direction, None, None, &options);
        assert_abs_diff_eq!(step, 0.5_f64.powi(options.maxiter() as i32));
    }
}
