//! Empirical interpolation greedy search.
//!
//! Given a set of snapshot vectors, [`ei_greedy`] builds interpolation DOFs
//! and a collateral basis such that every snapshot is well approximated by
//! interpolating its values at the chosen DOFs. In every iteration the worst
//! approximated vector is added to the basis, normalized so that its entry at
//! its own DOF equals one, and all remaining vectors are deflated by their
//! interpolation coefficient along the new vector. By construction the
//! interpolation matrix is lower triangular with unit diagonal; the measured
//! deviation from triangularity is reported as a diagnostic.
//!
//! [`ei_greedy_parallel`] runs the same search over a snapshot set
//! distributed across a [`WorkerPool`]. Only one scalar per worker and one
//! vector per accepted DOF cross the pool boundary per iteration, and the
//! selection order is identical to the sequential search.
//!
//! # References
//!
//! \[1\] [An "empirical interpolation" method: application to efficient
//! reduced-basis discretization of partial differential
//! equations](https://doi.org/10.1016/j.crma.2004.08.006)
//!
//! \[2\] [Reduced Basis Approximation for Nonlinear Parametrized Evolution
//! Equations based on Empirical Operator
//! Interpolation](https://doi.org/10.1137/10081157X)

use getset::{CopyGetters, Setters};
use log::{debug, info};
use nalgebra::{ComplexField, RealField};
use num_traits::{One, Zero};

use crate::core::VectorArray;
use crate::pool::WorkerPool;

/// Norm functional used to measure interpolation errors.
pub trait ErrorNorm<A: VectorArray> {
    /// Compute the per-vector error norms of `u`.
    fn norms(&self, u: &A) -> Vec<A::Field>;
}

/// The Euclidean norm, the default error measure of the greedy search.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanNorm;

impl<A: VectorArray> ErrorNorm<A> for EuclideanNorm {
    fn norms(&self, u: &A) -> Vec<A::Field> {
        u.norms()
    }
}

/// Adapter implementing [`ErrorNorm`] for a norm closure.
#[derive(Debug, Clone, Copy)]
pub struct NormFn<F>(pub F);

impl<A, F> ErrorNorm<A> for NormFn<F>
where
    A: VectorArray,
    F: Fn(&A) -> Vec<A::Field>,
{
    fn norms(&self, u: &A) -> Vec<A::Field> {
        (self.0)(u)
    }
}

/// Options for [`ei_greedy`] and [`ei_greedy_parallel`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct EiGreedyOptions<F: RealField + Copy> {
    /// Stop when the largest approximation error is at or below this
    /// threshold. Default: `None`.
    atol: Option<F>,
    /// Stop when the largest approximation error relative to the initial one
    /// is at or below this threshold. Default: `None`.
    rtol: Option<F>,
    /// Stop when this many interpolation DOFs have been selected. Default:
    /// `None` (run until the error tolerances or a degenerate selection stop
    /// the search).
    max_interpolation_dofs: Option<usize>,
}

impl<F: RealField + Copy> Default for EiGreedyOptions<F> {
    fn default() -> Self {
        Self {
            atol: None,
            rtol: None,
            max_interpolation_dofs: None,
        }
    }
}

/// Interpolation data generated by the greedy search.
#[derive(Debug, Clone)]
pub struct EiGreedyResult<A: VectorArray> {
    /// The DOFs at which interpolation takes place, in selection order. No
    /// DOF repeats.
    pub dofs: Vec<usize>,
    /// The collateral basis, one vector per DOF. Vector `i` has value one at
    /// `dofs[i]`.
    pub basis: A,
    /// The largest approximation error before each extension step.
    pub max_errs: Vec<A::Field>,
    /// For each leading principal submatrix of the interpolation matrix, the
    /// largest magnitude strictly above the diagonal. Values near zero
    /// confirm triangularity; larger values indicate numerical degeneracy.
    pub triangularity_errs: Vec<A::Field>,
}

/// Generate interpolation DOFs and a collateral basis for the vectors of `u`
/// by greedy search.
///
/// The array is consumed and deflated in place; pass `u.clone()` to keep the
/// input. The search stops when one of the criteria in `options` fires or
/// when the selection degenerates (a DOF is selected twice, or the worst
/// vector vanishes at its largest entry); degenerate stops return the data
/// accumulated so far.
pub fn ei_greedy<A, N>(u: A, error_norm: N, options: &EiGreedyOptions<A::Field>) -> EiGreedyResult<A>
where
    A: VectorArray,
    N: ErrorNorm<A>,
{
    info!("generating interpolation data for {} vectors", u.len());

    let mut u = u;
    let mut dofs: Vec<usize> = Vec::new();
    let mut basis = u.empty_like();
    let mut max_errs = Vec::new();

    let initial = argmax(&error_norm.norms(&u));
    if let Some((mut max_err_ind, mut max_err)) = initial {
        let initial_max_err = max_err;

        loop {
            if stop_extension(options, dofs.len(), max_err, initial_max_err) {
                break;
            }

            let new_vec = u.vector(max_err_ind);
            let (new_dof, new_vec) = match select_pivot(&dofs, new_vec) {
                Some(pivot) => pivot,
                None => break,
            };
            dofs.push(new_dof);
            basis.append(&new_vec);
            max_errs.push(max_err);

            // Rank-1 deflation: subtracting each vector's value at the new
            // DOF times the new basis vector keeps interpolation exact at
            // all previously chosen DOFs.
            let dof_values = u.dofs(&[new_dof]);
            let coefficients: Vec<_> = (0..u.len()).map(|i| -dof_values[(i, 0)]).collect();
            u.axpy(&coefficients, &new_vec);

            match argmax(&error_norm.norms(&u)) {
                Some((ind, err)) => {
                    max_err_ind = ind;
                    max_err = err;
                }
                None => break,
            }
        }
    }

    finish(dofs, basis, max_errs)
}

/// Worker-private state of the distributed greedy search.
#[derive(Debug)]
struct EiWorkerState<A> {
    shard: A,
    max_err_ind: usize,
}

/// Run the greedy search of [`ei_greedy`] with the snapshot set distributed
/// across `pool`.
///
/// The array is scattered into contiguous per-worker shards; each iteration
/// reduces the worker-local maximum errors to a global one, fetches the worst
/// vector from its owning worker and broadcasts the accepted basis vector so
/// every worker deflates its own shard. Selection order, stopping behavior
/// and diagnostics are identical to the sequential search for any number of
/// workers; [`SequentialPool`](crate::pool::SequentialPool) recovers it
/// exactly.
pub fn ei_greedy_parallel<A, N, P>(
    u: A,
    error_norm: N,
    options: &EiGreedyOptions<A::Field>,
    pool: &P,
) -> EiGreedyResult<A>
where
    A: VectorArray + Send + Sync,
    A::Field: Send + Sync,
    N: ErrorNorm<A> + Sync,
    P: WorkerPool,
{
    info!(
        "generating interpolation data for {} vectors on {} workers",
        u.len(),
        pool.num_workers()
    );

    let mut dofs: Vec<usize> = Vec::new();
    let mut basis = u.empty_like();
    let mut max_errs = Vec::new();

    let mut states = pool.scatter(&u).map(|shard| EiWorkerState {
        shard,
        max_err_ind: 0,
    });
    drop(u);

    let locals = pool.apply(&mut states, |state| local_max(&error_norm, state));
    if let Some((mut owner, mut max_err)) = reduce_max(&locals) {
        let initial_max_err = max_err;

        loop {
            if stop_extension(options, dofs.len(), max_err, initial_max_err) {
                break;
            }

            // Only the owning worker's worst vector crosses the pool
            // boundary.
            let new_vec = pool.apply_only(&mut states, owner, |state| {
                state.shard.vector(state.max_err_ind)
            });
            let (new_dof, new_vec) = match select_pivot(&dofs, new_vec) {
                Some(pivot) => pivot,
                None => break,
            };
            dofs.push(new_dof);
            basis.append(&new_vec);
            max_errs.push(max_err);

            let locals = pool.apply(&mut states, |state| {
                let dof_values = state.shard.dofs(&[new_dof]);
                let coefficients: Vec<_> =
                    (0..state.shard.len()).map(|i| -dof_values[(i, 0)]).collect();
                state.shard.axpy(&coefficients, &new_vec);
                local_max(&error_norm, state)
            });
            match reduce_max(&locals) {
                Some((new_owner, err)) => {
                    owner = new_owner;
                    max_err = err;
                }
                None => break,
            }
        }
    }
    // The shards are dropped here, releasing all worker-side storage.

    finish(dofs, basis, max_errs)
}

/// Check the stopping criteria that end the extension loop without adding a
/// basis vector.
fn stop_extension<F: RealField + Copy>(
    options: &EiGreedyOptions<F>,
    num_dofs: usize,
    max_err: F,
    initial_max_err: F,
) -> bool {
    if let Some(max_dofs) = options.max_interpolation_dofs {
        if num_dofs >= max_dofs {
            info!(
                "maximum of {} interpolation DOFs reached, stopping extension",
                max_dofs
            );
            return true;
        }
    }

    debug!(
        "maximum interpolation error with {} DOFs: {:?}",
        num_dofs, max_err
    );

    if let Some(atol) = options.atol {
        if max_err <= atol {
            info!("absolute error tolerance reached, stopping extension");
            return true;
        }
    }
    if let Some(rtol) = options.rtol {
        if max_err <= rtol * initial_max_err {
            info!("relative error tolerance reached, stopping extension");
            return true;
        }
    }
    false
}

/// Select the interpolation DOF of the worst approximated vector and
/// normalize the vector at it, or detect a degenerate selection.
fn select_pivot<A: VectorArray>(dofs: &[usize], new_vec: A) -> Option<(usize, A)> {
    let (new_dof, _) = new_vec.amax()[0];
    if dofs.contains(&new_dof) {
        info!(
            "DOF {} selected twice for interpolation, stopping extension",
            new_dof
        );
        return None;
    }
    let new_dof_value = new_vec.dofs(&[new_dof])[(0, 0)];
    if new_dof_value == A::Field::zero() {
        info!(
            "DOF {} selected with zero maximum error, stopping extension",
            new_dof
        );
        return None;
    }
    let mut new_vec = new_vec;
    new_vec.scal(A::Field::one() / new_dof_value);
    Some((new_dof, new_vec))
}

/// Position and value of the largest entry; ties resolve to the first.
fn argmax<F: RealField + Copy>(values: &[F]) -> Option<(usize, F)> {
    let mut best: Option<(usize, F)> = None;
    for (i, &value) in values.iter().enumerate() {
        match best {
            None => best = Some((i, value)),
            Some((_, b)) if value > b => best = Some((i, value)),
            _ => {}
        }
    }
    best
}

/// Reduce worker-local maxima to the globally worst worker. Earlier workers
/// win ties, matching the first-occurrence rule of [`argmax`].
fn reduce_max<F: RealField + Copy>(locals: &[Option<F>]) -> Option<(usize, F)> {
    let mut best: Option<(usize, F)> = None;
    for (worker, local) in locals.iter().enumerate() {
        if let Some(err) = *local {
            match best {
                Some((_, b)) if err > b => best = Some((worker, err)),
                None => best = Some((worker, err)),
                _ => {}
            }
        }
    }
    best
}

/// Recompute a worker's local maximum error, remembering the offending
/// vector's position within the shard.
fn local_max<A, N>(error_norm: &N, state: &mut EiWorkerState<A>) -> Option<A::Field>
where
    A: VectorArray,
    N: ErrorNorm<A>,
{
    argmax(&error_norm.norms(&state.shard)).map(|(ind, err)| {
        state.max_err_ind = ind;
        err
    })
}

/// Evaluate the triangularity diagnostic and assemble the result.
fn finish<A: VectorArray>(dofs: Vec<usize>, basis: A, max_errs: Vec<A::Field>) -> EiGreedyResult<A> {
    // Entry (i, j) of the interpolation matrix is basis vector j evaluated
    // at dofs[i]; the greedy construction makes it lower triangular up to
    // round-off.
    let matrix = basis.dofs(&dofs).transpose();
    let mut triangularity_errs = Vec::with_capacity(dofs.len());
    for d in 1..=dofs.len() {
        let mut worst = A::Field::zero();
        for i in 0..d {
            for j in (i + 1)..d {
                worst = worst.max(matrix[(i, j)].abs());
            }
        }
        triangularity_errs.push(worst);
    }

    if let Some(err) = triangularity_errs.last() {
        info!(
            "interpolation matrix deviates from lower triangularity by {:?}",
            err
        );
    }

    EiGreedyResult {
        dofs,
        basis,
        max_errs,
        triangularity_errs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseArray;
    use crate::pool::{RayonPool, SequentialPool};
    use approx::assert_abs_diff_eq;
    use nalgebra::{dvector, DVector};

    fn disjoint_dominant() -> DenseArray<f64> {
        DenseArray::from_vectors(vec![
            dvector![5.0, 0.1, 0.0, 0.2, 0.0],
            dvector![0.0, 0.3, 4.0, 0.0, 0.1],
            dvector![0.1, 0.0, 0.2, 0.0, 3.0],
        ])
    }

    fn smooth_family(count: usize, dim: usize) -> DenseArray<f64> {
        let vectors = (0..count)
            .map(|k| {
                let center = k as f64 / count as f64;
                DVector::from_fn(dim, |i, _| {
                    let x = i as f64 / (dim - 1) as f64;
                    (-(x - center) * (x - center) / 0.05).exp()
                })
            })
            .collect::<Vec<_>>();
        DenseArray::from_vectors(vectors)
    }

    #[test]
    fn selects_distinct_dofs_with_triangular_matrix() {
        let mut options = EiGreedyOptions::default();
        options.set_atol(Some(1e-10)).set_max_interpolation_dofs(Some(3));
        let result = ei_greedy(disjoint_dominant(), EuclideanNorm, &options);

        assert_eq!(result.dofs.len(), 3);
        assert_eq!(result.basis.len(), 3);
        let mut sorted = result.dofs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3, "interpolation DOFs must be distinct");
        assert_abs_diff_eq!(*result.triangularity_errs.last().unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn basis_vectors_are_normalized_at_their_dof() {
        let result = ei_greedy(smooth_family(8, 32), EuclideanNorm, &EiGreedyOptions::default());
        let values = result.basis.dofs(&result.dofs);
        for i in 0..result.dofs.len() {
            assert_abs_diff_eq!(values[(i, i)], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn max_errs_are_non_increasing() {
        let result = ei_greedy(smooth_family(10, 40), EuclideanNorm, &EiGreedyOptions::default());
        assert!(!result.max_errs.is_empty());
        for window in result.max_errs.windows(2) {
            assert!(window[0] >= window[1]);
        }
    }

    #[test]
    fn single_dof_budget_selects_exactly_one() {
        let mut options = EiGreedyOptions::default();
        options
            .set_atol(Some(0.0))
            .set_rtol(Some(0.0))
            .set_max_interpolation_dofs(Some(1));
        let result = ei_greedy(disjoint_dominant(), EuclideanNorm, &options);
        assert_eq!(result.dofs.len(), 1);
        assert_eq!(result.basis.len(), 1);
    }

    #[test]
    fn empty_input_stops_gracefully() {
        let result = ei_greedy(DenseArray::<f64>::empty(7), EuclideanNorm, &EiGreedyOptions::default());
        assert!(result.dofs.is_empty());
        assert!(result.basis.is_empty());
        assert!(result.max_errs.is_empty());
        assert!(result.triangularity_errs.is_empty());
    }

    #[test]
    fn zero_dof_budget_returns_empty_basis() {
        let mut options = EiGreedyOptions::default();
        options.set_max_interpolation_dofs(Some(0));
        let result = ei_greedy(smooth_family(4, 16), EuclideanNorm, &options);
        assert!(result.dofs.is_empty());
        assert!(result.basis.is_empty());
    }

    #[test]
    fn degenerate_selection_stops_instead_of_repeating() {
        // Two colinear vectors: after the first deflation the residuals
        // vanish and the next pivot would repeat or be zero.
        let u = DenseArray::from_vectors(vec![
            dvector![2.0, 1.0, 0.5],
            dvector![4.0, 2.0, 1.0],
        ]);
        let result = ei_greedy(u, EuclideanNorm, &EiGreedyOptions::default());
        assert_eq!(result.dofs.len(), 1);
    }

    #[test]
    fn custom_error_norm_is_used() {
        let weighted = NormFn(|u: &DenseArray<f64>| -> Vec<f64> {
            u.vectors().iter().map(|v| v.amax()).collect()
        });
        let result = ei_greedy(smooth_family(6, 24), weighted, &EiGreedyOptions::default());
        assert_eq!(result.dofs.len(), result.basis.len());
    }

    #[test]
    fn parallel_matches_sequential_selection() {
        let u = smooth_family(12, 48);
        let mut options = EiGreedyOptions::default();
        options.set_rtol(Some(1e-8));

        let sequential = ei_greedy(u.clone(), EuclideanNorm, &options);
        let pool_of_one = ei_greedy_parallel(u.clone(), EuclideanNorm, &options, &SequentialPool);
        let threaded = ei_greedy_parallel(
            u,
            EuclideanNorm,
            &options,
            &RayonPool::with_workers(4).unwrap(),
        );

        assert_eq!(sequential.dofs, pool_of_one.dofs);
        assert_eq!(sequential.dofs, threaded.dofs);
        assert_eq!(sequential.max_errs.len(), threaded.max_errs.len());
        for (a, b) in sequential.max_errs.iter().zip(&threaded.max_errs) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn parallel_empty_input_stops_gracefully() {
        let result = ei_greedy_parallel(
            DenseArray::<f64>::empty(5),
            EuclideanNorm,
            &EiGreedyOptions::default(),
            &RayonPool::with_workers(2).unwrap(),
        );
        assert!(result.dofs.is_empty());
        assert!(result.basis.is_empty());
    }
}
