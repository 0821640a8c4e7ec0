//! Dense, nalgebra-backed implementations of the core contracts.
//!
//! [`DenseArray`] stores every vector as an owned [`DVector`] and is the
//! default backend for tests, examples and small to medium problems.
//! [`MatrixOperator`] wraps a dense matrix and implements both
//! [`LinearOperator`] and [`Operator`] (its Jacobian is the matrix itself).

use std::ops::Range;

use nalgebra::{convert, ComplexField, DMatrix, DVector, RealField};
use num_traits::{One, Zero};

use crate::core::{InversionError, LinearOperator, Operator, OperatorError, VectorArray};

/// A vector array backed by a list of owned dense vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray<F: RealField + Copy> {
    dim: usize,
    vectors: Vec<DVector<F>>,
}

impl<F: RealField + Copy> DenseArray<F> {
    /// Create an empty array of vectors of dimension `dim`.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Create an array of `len` zero vectors of dimension `dim`.
    pub fn zeros(dim: usize, len: usize) -> Self {
        Self {
            dim,
            vectors: (0..len).map(|_| DVector::zeros(dim)).collect(),
        }
    }

    /// Create an array from existing vectors.
    ///
    /// All vectors **must** have the same dimension and at least one vector
    /// must be given (use [`empty`](Self::empty) otherwise, which knows its
    /// space without inspecting a vector).
    pub fn from_vectors(vectors: Vec<DVector<F>>) -> Self {
        assert!(!vectors.is_empty(), "use DenseArray::empty for empty arrays");
        let dim = vectors[0].len();
        assert!(
            vectors.iter().all(|v| v.len() == dim),
            "all vectors must share the same dimension"
        );
        Self { dim, vectors }
    }

    /// Append a single vector.
    pub fn push(&mut self, vector: DVector<F>) {
        assert_eq!(vector.len(), self.dim, "vector dimension mismatch");
        self.vectors.push(vector);
    }

    /// Access the stored vectors.
    pub fn vectors(&self) -> &[DVector<F>] {
        &self.vectors
    }

    fn as_columns(&self) -> DMatrix<F> {
        DMatrix::from_fn(self.dim, self.vectors.len(), |i, j| self.vectors[j][i])
    }

    fn from_columns(dim: usize, columns: DMatrix<F>) -> Self {
        let vectors = (0..columns.ncols())
            .map(|j| DVector::from_fn(dim, |i, _| columns[(i, j)]))
            .collect();
        Self { dim, vectors }
    }
}

impl<F: RealField + Copy> VectorArray for DenseArray<F> {
    type Field = F;

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn empty_like(&self) -> Self {
        Self::empty(self.dim)
    }

    fn vector(&self, index: usize) -> Self {
        Self {
            dim: self.dim,
            vectors: vec![self.vectors[index].clone()],
        }
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            dim: self.dim,
            vectors: self.vectors[range].to_vec(),
        }
    }

    fn append(&mut self, other: &Self) {
        assert_eq!(other.dim, self.dim, "appended vectors live in another space");
        self.vectors.extend(other.vectors.iter().cloned());
    }

    fn truncate(&mut self, new_len: usize) {
        self.vectors.truncate(new_len);
    }

    fn norms(&self) -> Vec<F> {
        self.vectors.iter().map(|v| v.norm()).collect()
    }

    fn scal(&mut self, alpha: F) {
        for v in &mut self.vectors {
            *v *= alpha;
        }
    }

    fn axpy(&mut self, alphas: &[F], x: &Self) {
        assert_eq!(alphas.len(), self.vectors.len(), "one coefficient per vector");
        assert!(
            x.len() == 1 || x.len() == self.len(),
            "x must contain one vector or as many as self"
        );
        for (i, v) in self.vectors.iter_mut().enumerate() {
            let xv = if x.len() == 1 { &x.vectors[0] } else { &x.vectors[i] };
            v.axpy(alphas[i], xv, F::one());
        }
    }

    fn dofs(&self, indices: &[usize]) -> DMatrix<F> {
        DMatrix::from_fn(self.vectors.len(), indices.len(), |i, j| {
            self.vectors[i][indices[j]]
        })
    }

    fn amax(&self) -> Vec<(usize, F)> {
        self.vectors
            .iter()
            .map(|v| {
                let mut best = (0, F::zero());
                for (i, &value) in v.iter().enumerate() {
                    if i == 0 || value.abs() > best.1.abs() {
                        best = (i, value);
                    }
                }
                best
            })
            .collect()
    }

    fn lincomb(&self, coefficients: &DMatrix<F>) -> Self {
        assert_eq!(
            coefficients.ncols(),
            self.vectors.len(),
            "one coefficient column per vector"
        );
        let vectors = (0..coefficients.nrows())
            .map(|i| {
                let mut out = DVector::zeros(self.dim);
                for (j, v) in self.vectors.iter().enumerate() {
                    out.axpy(coefficients[(i, j)], v, F::one());
                }
                out
            })
            .collect();
        Self {
            dim: self.dim,
            vectors,
        }
    }

    fn dot(&self, other: &Self) -> DMatrix<F> {
        assert_eq!(other.dim, self.dim, "inner products across different spaces");
        DMatrix::from_fn(self.vectors.len(), other.vectors.len(), |i, j| {
            self.vectors[i].dot(&other.vectors[j])
        })
    }
}

/// A linear operator given by a dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOperator<F: RealField + Copy> {
    matrix: DMatrix<F>,
}

impl<F: RealField + Copy> MatrixOperator<F> {
    /// Wrap a dense matrix.
    pub fn new(matrix: DMatrix<F>) -> Self {
        Self { matrix }
    }

    /// Create the identity operator on a space of dimension `dim`.
    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim, dim),
        }
    }

    /// Access the wrapped matrix.
    pub fn matrix(&self) -> &DMatrix<F> {
        &self.matrix
    }
}

impl<F: RealField + Copy> LinearOperator for MatrixOperator<F> {
    type Array = DenseArray<F>;

    fn apply(&self, u: &DenseArray<F>) -> Result<DenseArray<F>, OperatorError> {
        if u.dim() != self.matrix.ncols() {
            return Err(OperatorError::InvalidDimensionality);
        }
        let result = &self.matrix * u.as_columns();
        Ok(DenseArray::from_columns(self.matrix.nrows(), result))
    }

    fn apply_adjoint(&self, v: &DenseArray<F>) -> Result<DenseArray<F>, OperatorError> {
        if v.dim() != self.matrix.nrows() {
            return Err(OperatorError::InvalidDimensionality);
        }
        let result = self.matrix.tr_mul(&v.as_columns());
        Ok(DenseArray::from_columns(self.matrix.ncols(), result))
    }

    fn apply_inverse(
        &self,
        v: &DenseArray<F>,
        least_squares: bool,
    ) -> Result<DenseArray<F>, InversionError> {
        let rhs = v.as_columns();
        let solution = if least_squares {
            let svd = self.matrix.clone().svd(true, true);
            svd.solve(&rhs, convert(f64::EPSILON))
                .map_err(|_| InversionError::Singular)?
        } else {
            if !self.matrix.is_square() {
                return Err(InversionError::NotSquare);
            }
            nalgebra::linalg::LU::new(self.matrix.clone())
                .solve(&rhs)
                .ok_or(InversionError::Singular)?
        };
        Ok(DenseArray::from_columns(self.matrix.ncols(), solution))
    }
}

impl<F: RealField + Copy> Operator for MatrixOperator<F> {
    type Array = DenseArray<F>;
    type Jacobian = MatrixOperator<F>;

    fn apply(&self, u: &DenseArray<F>, _mu: &[F]) -> Result<DenseArray<F>, OperatorError> {
        LinearOperator::apply(self, u)
    }

    fn jacobian(&self, _u: &DenseArray<F>, _mu: &[F]) -> Result<Self::Jacobian, OperatorError> {
        Ok(self.clone())
    }

    fn apply_adjoint(&self, v: &DenseArray<F>, _mu: &[F]) -> Result<DenseArray<F>, OperatorError> {
        LinearOperator::apply_adjoint(self, v)
    }

    fn source_zeros(&self) -> DenseArray<F> {
        DenseArray::zeros(self.matrix.ncols(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    fn sample() -> DenseArray<f64> {
        DenseArray::from_vectors(vec![
            dvector![1.0, 2.0, -3.0],
            dvector![0.0, -5.0, 4.0],
        ])
    }

    #[test]
    fn norms_and_amax() {
        let u = sample();
        let norms = u.norms();
        assert_abs_diff_eq!(norms[0], 14.0_f64.sqrt());
        assert_abs_diff_eq!(norms[1], 41.0_f64.sqrt());
        assert_eq!(u.amax(), vec![(2, -3.0), (1, -5.0)]);
    }

    #[test]
    fn axpy_broadcasts_single_vector() {
        let mut u = sample();
        let x = DenseArray::from_vectors(vec![dvector![1.0, 1.0, 1.0]]);
        u.axpy(&[2.0, -1.0], &x);
        assert_eq!(u.vectors()[0], dvector![3.0, 4.0, -1.0]);
        assert_eq!(u.vectors()[1], dvector![-1.0, -6.0, 3.0]);
    }

    #[test]
    fn dofs_extracts_rows_per_vector() {
        let u = sample();
        let d = u.dofs(&[2, 0]);
        assert_eq!(d, dmatrix![-3.0, 1.0; 4.0, 0.0]);
    }

    #[test]
    fn lincomb_combines_rows() {
        let u = sample();
        let combined = u.lincomb(&dmatrix![1.0, 1.0; 2.0, 0.0]);
        assert_eq!(combined.vectors()[0], dvector![1.0, -3.0, 1.0]);
        assert_eq!(combined.vectors()[1], dvector![2.0, 4.0, -6.0]);
    }

    #[test]
    fn matrix_operator_round_trip() {
        let a = MatrixOperator::new(dmatrix![2.0, 0.0; 1.0, 3.0]);
        let u = DenseArray::from_vectors(vec![dvector![1.0, -1.0]]);
        let v = LinearOperator::apply(&a, &u).unwrap();
        assert_eq!(v.vectors()[0], dvector![2.0, -2.0]);
        let back = a.apply_inverse(&v, false).unwrap();
        assert_abs_diff_eq!(back.vectors()[0][0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back.vectors()[0][1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_fails_inversion() {
        let a = MatrixOperator::new(dmatrix![1.0, 1.0; 1.0, 1.0]);
        let v = DenseArray::from_vectors(vec![dvector![1.0, 0.0]]);
        assert!(matches!(
            a.apply_inverse(&v, false),
            Err(InversionError::Singular)
        ));
    }

    #[test]
    fn least_squares_solves_rectangular_system() {
        let a = MatrixOperator::new(dmatrix![1.0, 0.0; 0.0, 1.0; 1.0, 1.0]);
        let v = DenseArray::from_vectors(vec![dvector![1.0, 1.0, 2.0]]);
        assert!(matches!(
            a.apply_inverse(&v, false),
            Err(InversionError::NotSquare)
        ));
        let x = a.apply_inverse(&v, true).unwrap();
        assert_abs_diff_eq!(x.vectors()[0][0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.vectors()[0][1], 1.0, epsilon = 1e-12);
    }
}
