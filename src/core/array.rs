use std::fmt::Debug;
use std::ops::Range;

use nalgebra::{DMatrix, RealField};

/// The contract for ordered collections of vectors living in a common space.
///
/// A vector array is the unit of data all basis-generation algorithms operate
/// on: a snapshot set, a residual set, or a collateral basis. Implementations
/// decide how vectors are stored (dense, distributed, backed by an external
/// solver); the algorithms only rely on the operations below.
///
/// All vectors of an array share the same space dimension ([`dim`](Self::dim))
/// and degree-of-freedom indices are valid within `0..dim`. Cloning an array
/// yields an independent snapshot of its vectors.
pub trait VectorArray: Clone + Debug {
    /// Type of the scalar, usually f32 or f64.
    type Field: RealField + Copy;

    /// Number of vectors in the array.
    fn len(&self) -> usize;

    /// Determine whether the array contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the underlying vector space.
    fn dim(&self) -> usize;

    /// Create a new empty array in the same space.
    fn empty_like(&self) -> Self;

    /// Return a length-1 array containing a copy of the vector at `index`.
    fn vector(&self, index: usize) -> Self;

    /// Return a new array containing copies of the vectors in `range`.
    fn slice(&self, range: Range<usize>) -> Self;

    /// Append copies of all vectors of `other` to this array.
    fn append(&mut self, other: &Self);

    /// Remove all vectors starting at position `new_len`.
    fn truncate(&mut self, new_len: usize);

    /// Compute the Euclidean norm of every vector.
    fn norms(&self) -> Vec<Self::Field>;

    /// Multiply every vector by `alpha` in place.
    fn scal(&mut self, alpha: Self::Field);

    /// Add `alphas[i] * x` to the `i`-th vector in place.
    ///
    /// `x` must either contain a single vector, which is broadcast to every
    /// vector of this array, or have the same length as this array, in which
    /// case vectors are paired by position. `alphas` must have one entry per
    /// vector of this array.
    fn axpy(&mut self, alphas: &[Self::Field], x: &Self);

    /// Extract the named degrees of freedom as a dense matrix with one row
    /// per vector and one column per entry of `indices`.
    fn dofs(&self, indices: &[usize]) -> DMatrix<Self::Field>;

    /// Return, for every vector, the index and value of its entry with the
    /// largest magnitude. Ties resolve to the smallest index.
    fn amax(&self) -> Vec<(usize, Self::Field)>;

    /// Form linear combinations of the vectors in this array.
    ///
    /// Row `i` of `coefficients` holds the coefficients of the `i`-th output
    /// vector, so the result has `coefficients.nrows()` vectors and
    /// `coefficients.ncols()` must equal [`len`](Self::len).
    fn lincomb(&self, coefficients: &DMatrix<Self::Field>) -> Self;

    /// Compute all pairwise inner products, one row per vector of this array
    /// and one column per vector of `other`.
    fn dot(&self, other: &Self) -> DMatrix<Self::Field>;
}
