//! Empirical interpolation of model operators.
//!
//! [`interpolate_operators`] is the convenience entry point tying the basis
//! generation algorithms to a [`Model`]: it evaluates the named operators on
//! solution snapshots for a sample of parameter values (optionally
//! distributed across a [`WorkerPool`]), feeds the evaluations to
//! [`ei_greedy`](crate::algo::ei) or [`deim`](crate::algo::deim), and wraps
//! every named operator into an [`EmpiricalInterpolatedOperator`] sharing the
//! generated interpolation data.
//!
//! Note that one *common* collateral basis is built for all named operators.
//! Operators with very different ranges are better interpolated separately.

use std::collections::BTreeMap;

use getset::{CopyGetters, Setters};
use log::info;
use nalgebra::{linalg::LU, DMatrix, RealField};
use thiserror::Error;

use crate::algo::deim::{deim, DeimOptions};
use crate::algo::ei::{ei_greedy_parallel, EiGreedyOptions, ErrorNorm};
use crate::core::{
    InversionError, LinearOperator, Model, Operator, OperatorError, VectorArray,
};
use crate::pool::WorkerPool;

/// An operator approximated by empirical interpolation.
///
/// Applying the operator evaluates the wrapped exact operator, restricts the
/// result to the interpolation DOFs, solves the interpolation system and
/// expands the coefficients through the collateral basis. The Jacobian and
/// adjoint of the interpolated operator are not provided.
#[derive(Debug, Clone)]
pub struct EmpiricalInterpolatedOperator<Op: Operator> {
    operator: Op,
    dofs: Vec<usize>,
    basis: Op::Array,
    triangular: bool,
    interpolation_matrix: DMatrix<<Op::Array as VectorArray>::Field>,
}

impl<Op: Operator> EmpiricalInterpolatedOperator<Op> {
    /// Wrap `operator` with interpolation data as produced by
    /// [`ei_greedy`](crate::algo::ei::ei_greedy) (`triangular`) or
    /// [`deim`](crate::algo::deim::deim) (not `triangular`).
    pub fn new(operator: Op, dofs: Vec<usize>, basis: Op::Array, triangular: bool) -> Self {
        assert_eq!(
            dofs.len(),
            basis.len(),
            "one collateral basis vector per interpolation DOF"
        );
        let interpolation_matrix = basis.dofs(&dofs).transpose();
        Self {
            operator,
            dofs,
            basis,
            triangular,
            interpolation_matrix,
        }
    }

    /// The wrapped exact operator.
    pub fn operator(&self) -> &Op {
        &self.operator
    }

    /// The interpolation DOFs.
    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    /// The collateral basis.
    pub fn basis(&self) -> &Op::Array {
        &self.basis
    }

    /// Solve the interpolation system for vectors of DOF values, one row per
    /// vector. Returns the coefficient rows for
    /// [`lincomb`](VectorArray::lincomb).
    fn interpolation_coefficients(
        &self,
        values: &DMatrix<<Op::Array as VectorArray>::Field>,
    ) -> Result<DMatrix<<Op::Array as VectorArray>::Field>, InversionError> {
        let rhs = values.transpose();
        let solution = if self.triangular {
            self.interpolation_matrix
                .solve_lower_triangular(&rhs)
                .ok_or(InversionError::Singular)?
        } else {
            LU::new(self.interpolation_matrix.clone())
                .solve(&rhs)
                .ok_or(InversionError::Singular)?
        };
        Ok(solution.transpose())
    }
}

impl<Op: Operator> Operator for EmpiricalInterpolatedOperator<Op> {
    type Array = Op::Array;
    type Jacobian = Op::Jacobian;

    fn apply(
        &self,
        u: &Self::Array,
        mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Array, OperatorError> {
        let evaluation = self.operator.apply(u, mu)?;
        if self.dofs.is_empty() {
            return Ok(self.basis.lincomb(&DMatrix::zeros(evaluation.len(), 0)));
        }
        let values = evaluation.dofs(&self.dofs);
        let coefficients = self.interpolation_coefficients(&values)?;
        Ok(self.basis.lincomb(&coefficients))
    }

    fn jacobian(
        &self,
        _u: &Self::Array,
        _mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Jacobian, OperatorError> {
        Err(OperatorError::Unsupported)
    }

    fn source_zeros(&self) -> Self::Array {
        self.operator.source_zeros()
    }
}

/// Which basis generation algorithm [`interpolate_operators`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EiAlgorithm {
    /// The greedy search of [`ei_greedy`](crate::algo::ei::ei_greedy),
    /// producing a triangular interpolation matrix.
    EiGreedy,
    /// The POD-based [`deim`](crate::algo::deim::deim).
    Deim,
}

/// Options for [`interpolate_operators`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct InterpolationOptions<F: RealField + Copy> {
    /// Absolute error tolerance of the basis generation. Default: `None`.
    atol: Option<F>,
    /// Relative error tolerance of the basis generation. Default: `None`.
    rtol: Option<F>,
    /// Maximum number of interpolation DOFs (EI-Greedy) or POD modes (DEIM).
    /// Default: `None`.
    max_interpolation_dofs: Option<usize>,
    /// The basis generation algorithm. Default: [`EiAlgorithm::EiGreedy`].
    alg: EiAlgorithm,
}

impl<F: RealField + Copy> Default for InterpolationOptions<F> {
    fn default() -> Self {
        Self {
            atol: None,
            rtol: None,
            max_interpolation_dofs: None,
            alg: EiAlgorithm::EiGreedy,
        }
    }
}

/// Error returned from [`interpolate_operators`].
#[derive(Debug, Error)]
pub enum InterpolationError {
    /// A requested operator name is unknown to the model.
    #[error("model has no operator named `{0}`")]
    UnknownOperator(String),
    /// Snapshot computation or operator evaluation failed.
    #[error("{0}")]
    Operator(#[from] OperatorError),
}

/// Interpolation data shared by all interpolated operators of a model.
#[derive(Debug, Clone)]
pub struct InterpolationData<A: VectorArray> {
    /// The DOFs at which the operators are evaluated.
    pub dofs: Vec<usize>,
    /// The common collateral basis.
    pub basis: A,
    /// Greedy search error sequence (empty for DEIM).
    pub max_errs: Vec<A::Field>,
    /// Greedy triangularity diagnostic (empty for DEIM).
    pub triangularity_errs: Vec<A::Field>,
    /// POD singular values (empty for EI-Greedy).
    pub svals: Vec<A::Field>,
}

/// A model with some of its operators replaced by interpolated counterparts.
#[derive(Debug)]
pub struct InterpolatedModel<'m, M: Model> {
    model: &'m M,
    operators: BTreeMap<String, EmpiricalInterpolatedOperator<M::Op>>,
}

impl<'m, M: Model> InterpolatedModel<'m, M> {
    /// Compute the solution snapshot of the underlying model.
    pub fn solve(
        &self,
        mu: &[<M::Array as VectorArray>::Field],
    ) -> Result<M::Array, OperatorError> {
        self.model.solve(mu)
    }

    /// Look up an interpolated operator by name.
    pub fn operator(&self, name: &str) -> Option<&EmpiricalInterpolatedOperator<M::Op>> {
        self.operators.get(name)
    }

    /// Names of the interpolated operators.
    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    /// The underlying model.
    pub fn original(&self) -> &'m M {
        self.model
    }
}

/// Replace the named operators of `model` by empirically interpolated
/// counterparts.
///
/// Every operator in `operator_names` is evaluated on the solution snapshot
/// of `model` for every entry of `parameter_sample`; the snapshot sweep is
/// distributed across `pool` and a failure on any worker aborts the whole
/// run. The accumulated evaluations drive the basis generation algorithm
/// selected in `options` (the greedy search also runs on `pool`; DEIM
/// gathers the evaluations first). `product` is the POD inner product and
/// has no effect for EI-Greedy, `error_norm` has no effect for DEIM.
///
/// All named operators share one collateral basis. The returned
/// [`InterpolationData`] contains the shared data plus the diagnostics of
/// the chosen algorithm.
///
/// # Panics
///
/// Panics when `operator_names` or `parameter_sample` is empty.
#[allow(clippy::type_complexity)]
pub fn interpolate_operators<'m, M, N, P>(
    model: &'m M,
    operator_names: &[&str],
    parameter_sample: &[Vec<<M::Array as VectorArray>::Field>],
    error_norm: N,
    product: Option<&dyn LinearOperator<Array = M::Array>>,
    options: &InterpolationOptions<<M::Array as VectorArray>::Field>,
    pool: &P,
) -> Result<(InterpolatedModel<'m, M>, InterpolationData<M::Array>), InterpolationError>
where
    M: Model + Sync,
    M::Op: Clone + Sync,
    M::Array: Send + Sync,
    <M::Array as VectorArray>::Field: Send + Sync,
    N: ErrorNorm<M::Array> + Sync,
    P: WorkerPool,
{
    assert!(!operator_names.is_empty(), "no operators to interpolate");
    assert!(!parameter_sample.is_empty(), "empty parameter sample");

    let operators = operator_names
        .iter()
        .map(|name| {
            model
                .operator(name)
                .ok_or_else(|| InterpolationError::UnknownOperator(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "computing {} operator evaluations on {} solution snapshots",
        operator_names.len(),
        parameter_sample.len()
    );
    let results = pool.map(
        parameter_sample.to_vec(),
        |mu| -> Result<M::Array, OperatorError> {
            let snapshot = model.solve(&mu)?;
            let mut evaluations: Option<M::Array> = None;
            for operator in &operators {
                let evaluation = operator.apply(&snapshot, &mu)?;
                match &mut evaluations {
                    None => evaluations = Some(evaluation),
                    Some(evaluations) => evaluations.append(&evaluation),
                }
            }
            evaluations.ok_or(OperatorError::InvalidDimensionality)
        },
    );

    let mut evaluations: Option<M::Array> = None;
    for result in results {
        let evaluation = result?;
        match &mut evaluations {
            None => evaluations = Some(evaluation),
            Some(evaluations) => evaluations.append(&evaluation),
        }
    }
    let evaluations = evaluations.ok_or(OperatorError::InvalidDimensionality)?;

    let (dofs, basis, max_errs, triangularity_errs, svals) = match options.alg {
        EiAlgorithm::EiGreedy => {
            let mut ei_options = EiGreedyOptions::default();
            ei_options
                .set_atol(options.atol)
                .set_rtol(options.rtol)
                .set_max_interpolation_dofs(options.max_interpolation_dofs);
            let result = ei_greedy_parallel(evaluations, error_norm, &ei_options, pool);
            (
                result.dofs,
                result.basis,
                result.max_errs,
                result.triangularity_errs,
                Vec::new(),
            )
        }
        EiAlgorithm::Deim => {
            let mut deim_options = DeimOptions::default();
            deim_options
                .set_modes(options.max_interpolation_dofs)
                .set_atol(options.atol)
                .set_rtol(options.rtol);
            let result = deim(&evaluations, product, &deim_options)?;
            (result.dofs, result.basis, Vec::new(), Vec::new(), result.svals)
        }
    };

    let triangular = options.alg == EiAlgorithm::EiGreedy;
    let interpolated = operator_names
        .iter()
        .zip(&operators)
        .map(|(name, operator)| {
            (
                name.to_string(),
                EmpiricalInterpolatedOperator::new(
                    (*operator).clone(),
                    dofs.clone(),
                    basis.clone(),
                    triangular,
                ),
            )
        })
        .collect();

    let data = InterpolationData {
        dofs,
        basis,
        max_errs,
        triangularity_errs,
        svals,
    };
    Ok((
        InterpolatedModel {
            model,
            operators: interpolated,
        },
        data,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::ei::EuclideanNorm;
    use crate::dense::DenseArray;
    use crate::pool::{RayonPool, SequentialPool};
    use crate::testing::ReactionModel;
    use approx::assert_abs_diff_eq;

    fn sample() -> Vec<Vec<f64>> {
        (0..10).map(|k| vec![0.5 + 0.25 * k as f64]).collect()
    }

    #[test]
    fn interpolated_operator_reproduces_snapshot_evaluations() {
        let model = ReactionModel::new(24);
        let (interpolated, data) = interpolate_operators(
            &model,
            &["reaction"],
            &sample(),
            EuclideanNorm,
            None,
            &InterpolationOptions::default(),
            &SequentialPool,
        )
        .unwrap();

        assert_eq!(data.dofs.len(), data.basis.len());
        let operator = interpolated.operator("reaction").unwrap();
        for mu in sample() {
            let snapshot = model.solve(&mu).unwrap();
            let exact = Operator::apply(model.operator("reaction").unwrap(), &snapshot, &mu).unwrap();
            let approximated = operator.apply(&snapshot, &mu).unwrap();
            let mut diff = exact.clone();
            diff.axpy(&[-1.0], &approximated);
            assert_abs_diff_eq!(diff.norms()[0], 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn deim_variant_produces_square_interpolation_data() {
        let model = ReactionModel::new(16);
        let mut options = InterpolationOptions::default();
        options.set_alg(EiAlgorithm::Deim).set_max_interpolation_dofs(Some(4));
        let (interpolated, data) = interpolate_operators(
            &model,
            &["reaction"],
            &sample(),
            EuclideanNorm,
            None,
            &options,
            &SequentialPool,
        )
        .unwrap();

        assert!(!data.svals.is_empty());
        assert!(data.max_errs.is_empty());
        assert_eq!(data.dofs.len(), data.basis.len());
        assert!(data.dofs.len() <= 4);
        assert!(interpolated.operator("reaction").is_some());
    }

    #[test]
    fn unknown_operator_name_is_an_error() {
        let model = ReactionModel::new(8);
        let err = interpolate_operators(
            &model,
            &["diffusion"],
            &sample(),
            EuclideanNorm,
            None,
            &InterpolationOptions::default(),
            &SequentialPool,
        )
        .unwrap_err();
        assert!(matches!(err, InterpolationError::UnknownOperator(_)));
    }

    #[test]
    fn pool_distribution_matches_sequential_interpolation() {
        let model = ReactionModel::new(20);
        let mut options = InterpolationOptions::default();
        options.set_rtol(Some(1e-7));

        let (_, sequential) = interpolate_operators(
            &model,
            &["reaction"],
            &sample(),
            EuclideanNorm,
            None,
            &options,
            &SequentialPool,
        )
        .unwrap();
        let (_, distributed) = interpolate_operators(
            &model,
            &["reaction"],
            &sample(),
            EuclideanNorm,
            None,
            &options,
            &RayonPool::with_workers(3).unwrap(),
        )
        .unwrap();

        assert_eq!(sequential.dofs, distributed.dofs);
    }

    #[test]
    fn shared_basis_is_used_for_all_operators() {
        let model = ReactionModel::new(12);
        let (interpolated, data) = interpolate_operators(
            &model,
            &["reaction", "mass"],
            &sample(),
            EuclideanNorm,
            None,
            &InterpolationOptions::default(),
            &SequentialPool,
        )
        .unwrap();

        let reaction = interpolated.operator("reaction").unwrap();
        let mass = interpolated.operator("mass").unwrap();
        assert_eq!(reaction.dofs(), mass.dofs());
        assert_eq!(reaction.dofs(), &data.dofs[..]);
    }
}
