//! Newton's method for nonlinear operator equations.
//!
//! [`newton`] solves `A(U, mu) = V` for `U`, where `A` is an
//! [`Operator`](crate::core::Operator) providing Jacobian linearizations. In
//! every iteration the Jacobian system is solved for the update direction,
//! a step size is chosen (fixed relaxation or
//! [Armijo line search](crate::algo::line_search)) and the iterate, residual
//! and their norms are refreshed. Termination is checked in a fixed priority
//! order once the minimum iteration count is reached: absolute tolerance,
//! relative tolerance, stagnation, iteration budget. Non-finite norms abort
//! the solve immediately.
//!
//! Failures carry the complete norm histories accumulated so far, so callers
//! can diagnose divergence without re-running the solve.

use getset::{CopyGetters, Setters};
use log::{debug, info};
use nalgebra::{convert, ComplexField, RealField};
use num_traits::{One, Zero};

use thiserror::Error;

use crate::algo::line_search::{armijo, ArmijoOptions};
use crate::core::{InversionError, LinearOperator, Operator, OperatorError, VectorArray};

/// The quantity driving the convergence criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMeasure {
    /// The norm of the residual `V - A(U)`.
    Residual,
    /// The norm of the Newton update, measured against the solution norm for
    /// the relative criterion.
    Update,
}

/// Step size strategy for the Newton update.
#[derive(Debug, Clone, Copy)]
pub enum Relaxation<F: RealField + Copy> {
    /// Scale every update by a fixed factor.
    Fixed(F),
    /// Choose the step by Armijo backtracking on the residual norm.
    LineSearch(ArmijoOptions<F>),
}

/// Options for [`newton`].
#[derive(Debug, Clone, Copy, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NewtonOptions<F: RealField + Copy> {
    /// Minimum number of iterations to perform before any stopping criterion
    /// is checked. Default: `0`.
    miniter: usize,
    /// Fail when this iteration count is reached without convergence.
    /// Default: `100`.
    maxiter: usize,
    /// Finish when the error measure is at or below this threshold. Default:
    /// `0`.
    atol: F,
    /// Finish when the error measure has been reduced by this factor relative
    /// to its initial (residual) or current (solution) scale. Default: `0`.
    rtol: F,
    /// Step size strategy. Default: `Relaxation::Fixed(1)`.
    relax: Relaxation<F>,
    /// Solve the Jacobian systems in the least squares sense. Default:
    /// `false`.
    least_squares: bool,
    /// Finish when the error measure has not been reduced by a factor of
    /// [`stagnation_threshold`](Self::stagnation_threshold) during this many
    /// iterations. Default: `3`.
    stagnation_window: usize,
    /// See [`stagnation_window`](Self::stagnation_window). Default: infinity
    /// (stagnation detection disabled).
    stagnation_threshold: F,
    /// The error measure driving the convergence criteria. Default:
    /// `ErrorMeasure::Residual`.
    error_measure: ErrorMeasure,
    /// Record the intermediate iterates in the returned data. Default:
    /// `false`.
    return_stages: bool,
    /// Record all residual vectors in the returned data. Default: `false`.
    return_residuals: bool,
}

impl<F: RealField + Copy> Default for NewtonOptions<F> {
    fn default() -> Self {
        Self {
            miniter: 0,
            maxiter: 100,
            atol: F::zero(),
            rtol: F::zero(),
            relax: Relaxation::Fixed(F::one()),
            least_squares: false,
            stagnation_window: 3,
            stagnation_threshold: convert(f64::INFINITY),
            error_measure: ErrorMeasure::Residual,
            return_stages: false,
            return_residuals: false,
        }
    }
}

/// Per-iteration diagnostics of a Newton solve, also available on failure.
#[derive(Debug, Clone)]
pub struct NewtonData<A: VectorArray> {
    /// Solution norm after every iteration, starting with the initial guess.
    pub solution_norms: Vec<A::Field>,
    /// Scaled update norm for every iteration. The first entry repeats the
    /// initial solution norm so that the history aligns with the other two.
    pub update_norms: Vec<A::Field>,
    /// Residual norm after every iteration, starting with the initial
    /// residual.
    pub residual_norms: Vec<A::Field>,
    /// The iterate at the start of every iteration, if requested.
    pub stages: Option<A>,
    /// Every residual vector, if requested.
    pub residuals: Option<A>,
}

impl<A: VectorArray> NewtonData<A> {
    fn new() -> Self {
        Self {
            solution_norms: Vec::new(),
            update_norms: Vec::new(),
            residual_norms: Vec::new(),
            stages: None,
            residuals: None,
        }
    }
}

/// The criterion that ended a successful Newton solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonStop {
    /// The error measure dropped below the absolute threshold.
    AbsoluteTolerance,
    /// The error measure dropped below the relative threshold.
    RelativeTolerance,
    /// The error measure stagnated within the configured window.
    Stagnation,
}

/// A converged Newton solve.
#[derive(Debug, Clone)]
pub struct NewtonResult<A: VectorArray> {
    /// The computed solution, a length-1 array.
    pub solution: A,
    /// Which criterion ended the iteration.
    pub stop: NewtonStop,
    /// Number of completed iterations.
    pub iterations: usize,
    /// Per-iteration diagnostics.
    pub data: NewtonData<A>,
}

/// Why a Newton solve failed.
#[derive(Debug, Error)]
pub enum NewtonFailure {
    /// The Jacobian system could not be solved.
    #[error("could not invert jacobian: {0}")]
    JacobianNotInvertible(#[from] InversionError),
    /// Evaluating the operator, its Jacobian or the error product failed.
    #[error("operator evaluation failed: {0}")]
    Operator(#[from] OperatorError),
    /// The iteration budget was exhausted without convergence.
    #[error("failed to converge within {0} iterations")]
    NoConvergence(usize),
    /// A norm became NaN or infinite.
    #[error("non-finite norm encountered")]
    NumericalBreakdown,
}

/// A failed Newton solve, carrying the diagnostics accumulated so far.
#[derive(Debug, Error)]
#[error("newton solver failed after {iterations} iterations: {reason}")]
pub struct NewtonError<A: VectorArray> {
    /// The failure reason.
    pub reason: NewtonFailure,
    /// Number of completed iterations at the time of failure.
    pub iterations: usize,
    /// Partial per-iteration diagnostics.
    pub data: NewtonData<A>,
}

/// Solve `A(U, mu) = V` for `U` with Newton's method.
///
/// `rhs` must be a length-1 array containing `V`. Without an initial guess
/// the iteration starts from the zero vector of the operator's source space.
/// `error_product` supplies the inner product for all norms; the Euclidean
/// inner product is used when it is `None`.
pub fn newton<Op>(
    operator: &Op,
    rhs: &Op::Array,
    initial_guess: Option<&Op::Array>,
    mu: &[<Op::Array as VectorArray>::Field],
    error_product: Option<&dyn LinearOperator<Array = Op::Array>>,
    options: &NewtonOptions<<Op::Array as VectorArray>::Field>,
) -> Result<NewtonResult<Op::Array>, NewtonError<Op::Array>>
where
    Op: Operator,
{
    let mut data = NewtonData::new();
    let mut iterations = 0;
    match newton_loop(
        operator,
        rhs,
        initial_guess,
        mu,
        error_product,
        options,
        &mut data,
        &mut iterations,
    ) {
        Ok((solution, stop)) => Ok(NewtonResult {
            solution,
            stop,
            iterations,
            data,
        }),
        Err(reason) => Err(NewtonError {
            reason,
            iterations,
            data,
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn newton_loop<Op>(
    operator: &Op,
    rhs: &Op::Array,
    initial_guess: Option<&Op::Array>,
    mu: &[<Op::Array as VectorArray>::Field],
    error_product: Option<&dyn LinearOperator<Array = Op::Array>>,
    options: &NewtonOptions<<Op::Array as VectorArray>::Field>,
    data: &mut NewtonData<Op::Array>,
    iteration: &mut usize,
) -> Result<(Op::Array, NewtonStop), NewtonFailure>
where
    Op: Operator,
{
    type Field<Op> = <<Op as Operator>::Array as VectorArray>::Field;

    let mut u = match initial_guess {
        Some(guess) => guess.clone(),
        None => operator.source_zeros(),
    };
    if options.return_stages {
        data.stages = Some(u.empty_like());
    }
    if options.return_residuals {
        data.residuals = Some(rhs.empty_like());
    }

    let mut residual = residual_of(operator, rhs, &u, mu)?;

    let mut solution_norm = product_norm(&u, error_product)?;
    let mut residual_norm = product_norm(&residual, error_product)?;
    data.solution_norms.push(solution_norm);
    data.update_norms.push(solution_norm);
    data.residual_norms.push(residual_norm);

    let mut err = match options.error_measure {
        ErrorMeasure::Residual => residual_norm,
        ErrorMeasure::Update => solution_norm,
    };
    let mut err_scale = err;

    info!("initial residual norm: {:?}", residual_norm);

    loop {
        if *iteration >= options.miniter {
            if err <= options.atol {
                info!("absolute tolerance reached, stopping");
                return Ok((u, NewtonStop::AbsoluteTolerance));
            }
            if err < options.rtol * err_scale {
                info!("prescribed total reduction reached, stopping");
                return Ok((u, NewtonStop::RelativeTolerance));
            }
            let history = match options.error_measure {
                ErrorMeasure::Residual => &data.residual_norms,
                ErrorMeasure::Update => &data.update_norms,
            };
            if history.len() >= options.stagnation_window + 1 {
                let recent = &history[history.len() - options.stagnation_window - 1..];
                let worst = recent
                    .iter()
                    .copied()
                    .fold(Field::<Op>::zero(), |a, b| a.max(b));
                if err > options.stagnation_threshold * worst {
                    info!(
                        "error is stagnating over the last {} iterations, stopping",
                        options.stagnation_window
                    );
                    return Ok((u, NewtonStop::Stagnation));
                }
            }
            if *iteration >= options.maxiter {
                return Err(NewtonFailure::NoConvergence(options.maxiter));
            }
        }

        *iteration += 1;

        if let Some(stages) = &mut data.stages {
            stages.append(&u);
        }
        if let Some(residuals) = &mut data.residuals {
            residuals.append(&residual);
        }

        let jacobian = operator.jacobian(&u, mu)?;
        let update = jacobian.apply_inverse(&residual, options.least_squares)?;

        let step_size = match options.relax {
            Relaxation::Fixed(relax) => relax,
            Relaxation::LineSearch(ls_options) => {
                debug!("determining step size by armijo line search");
                // Evaluation failures reject the trial step.
                let res = |x: &Op::Array| {
                    residual_of(operator, rhs, x, mu)
                        .and_then(|r| product_norm(&r, error_product))
                        .unwrap_or_else(|_| convert(f64::INFINITY))
                };
                let grad = descent_direction(&jacobian, &residual, error_product)?;
                armijo(res, &u, &update, Some(&grad), Some(residual_norm), &ls_options)
            }
        };

        u.axpy(&[step_size], &update);
        residual = residual_of(operator, rhs, &u, mu)?;

        solution_norm = product_norm(&u, error_product)?;
        data.solution_norms.push(solution_norm);
        let update_norm = product_norm(&update, error_product)? * step_size;
        data.update_norms.push(update_norm);
        residual_norm = product_norm(&residual, error_product)?;
        data.residual_norms.push(residual_norm);

        err = match options.error_measure {
            ErrorMeasure::Residual => residual_norm,
            ErrorMeasure::Update => {
                err_scale = solution_norm;
                update_norm
            }
        };

        debug!(
            "iteration {}: residual norm {:?}, total reduction {:?}",
            iteration,
            residual_norm,
            residual_norm / data.residual_norms[0]
        );

        if !residual_norm.is_finite() || !solution_norm.is_finite() {
            return Err(NewtonFailure::NumericalBreakdown);
        }
    }
}

/// Compute `rhs - A(u)`.
fn residual_of<Op: Operator>(
    operator: &Op,
    rhs: &Op::Array,
    u: &Op::Array,
    mu: &[<Op::Array as VectorArray>::Field],
) -> Result<Op::Array, OperatorError> {
    let au = operator.apply(u, mu)?;
    let mut residual = rhs.clone();
    residual.axpy(&[-<Op::Array as VectorArray>::Field::one()], &au);
    Ok(residual)
}

/// Norm of a length-1 array, optionally weighted by an inner-product
/// operator.
fn product_norm<A: VectorArray>(
    u: &A,
    product: Option<&dyn LinearOperator<Array = A>>,
) -> Result<A::Field, OperatorError> {
    match product {
        None => Ok(u.norms()[0]),
        Some(product) => {
            let pu = product.apply(u)?;
            Ok(u.dot(&pu)[(0, 0)].sqrt())
        }
    }
}

/// The negative gradient of the squared residual norm, used as the line
/// search descent reference.
fn descent_direction<J: LinearOperator>(
    jacobian: &J,
    residual: &J::Array,
    error_product: Option<&dyn LinearOperator<Array = J::Array>>,
) -> Result<J::Array, OperatorError> {
    let one = <J::Array as VectorArray>::Field::one();
    let mut grad = match error_product {
        None => {
            let mut grad = jacobian.apply(residual)?;
            grad.axpy(&[one], &jacobian.apply_adjoint(residual)?);
            grad
        }
        Some(product) => {
            let mut grad = jacobian.apply_adjoint(&product.apply(residual)?)?;
            grad.axpy(&[one], &jacobian.apply(&product.apply_adjoint(residual)?)?);
            grad
        }
    };
    grad.scal(-one);
    Ok(grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::{DenseArray, MatrixOperator};
    use crate::testing::{ComponentSquare, MonotoneCubic};
    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    fn options_with_atol(atol: f64) -> NewtonOptions<f64> {
        let mut options = NewtonOptions::default();
        options.set_atol(atol);
        options
    }

    #[test]
    fn linear_operator_converges_in_one_iteration() {
        let a = MatrixOperator::new(dmatrix![2.0, 1.0; 0.0, 4.0]);
        let rhs = DenseArray::from_vectors(vec![dvector![3.0, 8.0]]);

        let result = newton(&a, &rhs, None, &[], None, &options_with_atol(1e-10)).unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.stop, NewtonStop::AbsoluteTolerance);
        assert_abs_diff_eq!(result.solution.vectors()[0][0], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(result.solution.vectors()[0][1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn nonlinear_system_converges() {
        let op = MonotoneCubic::new(3);
        let rhs = DenseArray::from_vectors(vec![dvector![2.0, -2.0, 10.0]]);

        let result = newton(&op, &rhs, None, &[], None, &options_with_atol(1e-12)).unwrap();

        // Roots of u + u^3 = v, component by component.
        let u = &result.solution.vectors()[0];
        for (i, &v) in [2.0, -2.0, 10.0].iter().enumerate() {
            assert_abs_diff_eq!(u[i] + u[i].powi(3), v, epsilon = 1e-10);
        }
    }

    #[test]
    fn singular_jacobian_fails() {
        let op = ComponentSquare::new(2);
        let rhs = DenseArray::from_vectors(vec![dvector![1.0, 1.0]]);

        // The Jacobian at the zero initial guess is the zero matrix.
        let err = newton(&op, &rhs, None, &[], None, &options_with_atol(1e-10)).unwrap_err();
        assert!(matches!(
            err.reason,
            NewtonFailure::JacobianNotInvertible(_)
        ));
        assert_eq!(err.iterations, 1);
    }

    #[test]
    fn maxiter_exhaustion_is_a_failure() {
        let op = MonotoneCubic::new(2);
        let rhs = DenseArray::from_vectors(vec![dvector![5.0, 5.0]]);
        let mut options = options_with_atol(1e-14);
        options.set_maxiter(2);

        let err = newton(&op, &rhs, None, &[], None, &options).unwrap_err();
        assert!(matches!(err.reason, NewtonFailure::NoConvergence(2)));
        assert_eq!(err.data.residual_norms.len(), 3);
    }

    #[test]
    fn stages_history_matches_iteration_count() {
        let op = MonotoneCubic::new(2);
        let rhs = DenseArray::from_vectors(vec![dvector![1.0, 2.0]]);
        let mut options = options_with_atol(1e-12);
        options.set_return_stages(true).set_return_residuals(true);

        let result = newton(&op, &rhs, None, &[], None, &options).unwrap();

        assert_eq!(result.data.stages.as_ref().unwrap().len(), result.iterations);
        assert_eq!(
            result.data.residuals.as_ref().unwrap().len(),
            result.iterations
        );
        assert_eq!(result.data.residual_norms.len(), result.iterations + 1);
    }

    #[test]
    fn line_search_converges_on_cubic() {
        let op = MonotoneCubic::new(3);
        let rhs = DenseArray::from_vectors(vec![dvector![4.0, 1.0, -3.0]]);
        let mut options = options_with_atol(1e-12);
        options.set_relax(Relaxation::LineSearch(ArmijoOptions::default()));

        let result = newton(&op, &rhs, None, &[], None, &options).unwrap();
        let u = &result.solution.vectors()[0];
        for (i, &v) in [4.0, 1.0, -3.0].iter().enumerate() {
            assert_abs_diff_eq!(u[i] + u[i].powi(3), v, epsilon = 1e-10);
        }
    }

    #[test]
    fn damped_updates_still_converge() {
        let op = MonotoneCubic::new(1);
        let rhs = DenseArray::from_vectors(vec![dvector![2.0]]);
        let mut options = options_with_atol(1e-10);
        options.set_relax(Relaxation::Fixed(0.5)).set_maxiter(200);

        let result = newton(&op, &rhs, None, &[], None, &options).unwrap();
        let u = result.solution.vectors()[0][0];
        assert_abs_diff_eq!(u + u.powi(3), 2.0, epsilon = 1e-8);
    }

    #[test]
    fn stagnation_window_stops_the_iteration() {
        let op = MonotoneCubic::new(2);
        let rhs = DenseArray::from_vectors(vec![dvector![1.0, 1.0]]);
        let mut options = NewtonOptions::default();
        // A zero step cannot reduce the residual, so the error stagnates.
        options
            .set_relax(Relaxation::Fixed(0.0))
            .set_stagnation_window(2)
            .set_stagnation_threshold(0.5);

        let result = newton(&op, &rhs, None, &[], None, &options).unwrap();
        assert_eq!(result.stop, NewtonStop::Stagnation);
    }

    #[test]
    fn initial_guess_is_respected() {
        let a = MatrixOperator::new(dmatrix![1.0, 0.0; 0.0, 1.0]);
        let rhs = DenseArray::from_vectors(vec![dvector![1.0, 1.0]]);
        let guess = DenseArray::from_vectors(vec![dvector![1.0, 1.0]]);

        let result = newton(&a, &rhs, Some(&guess), &[], None, &options_with_atol(1e-10)).unwrap();
        // The guess already solves the identity system.
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn error_product_weights_the_norms() {
        let a = MatrixOperator::new(dmatrix![2.0, 0.0; 0.0, 2.0]);
        let rhs = DenseArray::from_vectors(vec![dvector![2.0, 2.0]]);
        let product = MatrixOperator::new(dmatrix![4.0, 0.0; 0.0, 1.0]);

        let result =
            newton(&a, &rhs, None, &[], Some(&product), &options_with_atol(1e-10)).unwrap();
        // Initial residual norm in the weighted inner product:
        // sqrt(4 * 2^2 + 1 * 2^2).
        assert_abs_diff_eq!(result.data.residual_norms[0], 20.0_f64.sqrt(), epsilon = 1e-12);
    }
}
