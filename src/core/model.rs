use super::array::VectorArray;
use super::operator::{Operator, OperatorError};

/// A discretized system exposing named operators and a solve capability.
///
/// This is the contract consumed by
/// [`interpolate_operators`](crate::interpolation::interpolate_operators):
/// the orchestrator asks the model for solution snapshots at given parameter
/// values and for the operators it is supposed to interpolate. How the model
/// computes its solution is entirely up to the implementation.
pub trait Model {
    /// The vector array type of the solution space.
    type Array: VectorArray;

    /// The type of the model's operators.
    type Op: Operator<Array = Self::Array>;

    /// Compute the solution snapshot for the parameter values `mu`.
    fn solve(
        &self,
        mu: &[<Self::Array as VectorArray>::Field],
    ) -> Result<Self::Array, OperatorError>;

    /// Look up an operator by name.
    fn operator(&self, name: &str) -> Option<&Self::Op>;
}
