use thiserror::Error;

use super::array::VectorArray;

/// Error encountered while evaluating an operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// The number or dimension of the given vectors does not match the
    /// operator's source or range space.
    #[error("invalid dimensionality")]
    InvalidDimensionality,
    /// An invalid value (NaN, positive or negative infinity) occurred.
    #[error("invalid value encountered")]
    InvalidValue,
    /// The requested operation is not provided by this operator.
    #[error("operation is not supported by this operator")]
    Unsupported,
    /// A linear system embedded in the evaluation could not be solved.
    #[error("{0}")]
    Inversion(#[from] InversionError),
    /// A custom error specific to the operator.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// Error encountered while solving a linear system at the linear-algebra
/// boundary.
#[derive(Debug, Error)]
pub enum InversionError {
    /// The system matrix is singular (or numerically rank deficient).
    #[error("linear system is singular")]
    Singular,
    /// The system is under- or over-determined and least squares mode was not
    /// requested.
    #[error("linear system is not square; use least squares mode")]
    NotSquare,
    /// The operator does not support inversion at all.
    #[error("inversion is not supported by this operator")]
    Unsupported,
}

/// A linear mapping between vector arrays, as produced by
/// [`Operator::jacobian`] or used as an inner-product weight.
pub trait LinearOperator {
    /// The vector array type the operator acts on.
    type Array: VectorArray;

    /// Apply the operator to every vector of `u`.
    fn apply(&self, u: &Self::Array) -> Result<Self::Array, OperatorError>;

    /// Apply the adjoint of the operator to every vector of `v`.
    fn apply_adjoint(&self, v: &Self::Array) -> Result<Self::Array, OperatorError>;

    /// Solve `A u = v` for every vector of `v`.
    ///
    /// With `least_squares` the system is solved in the minimum-residual
    /// sense; otherwise the operator must be invertible and the call fails
    /// with [`InversionError`] when it is not.
    fn apply_inverse(
        &self,
        v: &Self::Array,
        least_squares: bool,
    ) -> Result<Self::Array, InversionError>;
}

/// A possibly nonlinear, possibly parametric mapping between vector arrays.
///
/// Parameter values are passed as a plain ordered slice; the empty slice
/// denotes a non-parametric evaluation. Operators are stateless across calls
/// except as dictated by the parameter values.
pub trait Operator {
    /// The vector array type the operator acts on.
    type Array: VectorArray;

    /// The linear operator type returned by [`jacobian`](Self::jacobian).
    type Jacobian: LinearOperator<Array = Self::Array>;

    /// Evaluate the operator on every vector of `u` for the parameter values
    /// `mu`.
    fn apply(
        &self,
        u: &Self::Array,
        mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Array, OperatorError>;

    /// Compute the Jacobian linearization at `u` for the parameter values
    /// `mu`.
    fn jacobian(
        &self,
        u: &Self::Array,
        mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Jacobian, OperatorError>;

    /// Apply the adjoint of the operator to every vector of `v`. Nonlinear
    /// operators typically do not provide this.
    fn apply_adjoint(
        &self,
        v: &Self::Array,
        mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Array, OperatorError> {
        let _ = (v, mu);
        Err(OperatorError::Unsupported)
    }

    /// Return a length-1 array containing the zero vector of the source
    /// space.
    fn source_zeros(&self) -> Self::Array;
}
