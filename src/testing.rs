//! Test operators and models useful for debugging and smoke testing.
//!
//! [`MonotoneCubic`] is recommended for first tests of the Newton solver: it
//! is smooth, strictly monotone and has a well conditioned Jacobian
//! everywhere. [`ComponentSquare`] provides a singular Jacobian at the
//! origin. [`ReactionModel`] is a small parametric model for exercising
//! operator interpolation.

#![allow(unused)]

use nalgebra::{DMatrix, DVector};

use crate::core::{Model, Operator, OperatorError, VectorArray};
use crate::dense::{DenseArray, MatrixOperator};

fn diagonal(entries: DVector<f64>) -> MatrixOperator<f64> {
    MatrixOperator::new(DMatrix::from_diagonal(&entries))
}

/// The componentwise map `A(u)_i = u_i + u_i^3`.
///
/// Strictly monotone with Jacobian `diag(1 + 3 u_i^2)`, so Newton's method
/// converges from any starting point.
#[derive(Debug, Clone, Copy)]
pub struct MonotoneCubic {
    dim: usize,
}

impl MonotoneCubic {
    /// Initializes the operator on a space of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "dim must be greater than zero");
        Self { dim }
    }
}

impl Operator for MonotoneCubic {
    type Array = DenseArray<f64>;
    type Jacobian = MatrixOperator<f64>;

    fn apply(&self, u: &DenseArray<f64>, _mu: &[f64]) -> Result<DenseArray<f64>, OperatorError> {
        if u.dim() != self.dim {
            return Err(OperatorError::InvalidDimensionality);
        }
        let vectors = u
            .vectors()
            .iter()
            .map(|v| v.map(|x| x + x.powi(3)))
            .collect();
        Ok(DenseArray::from_vectors(vectors))
    }

    fn jacobian(
        &self,
        u: &DenseArray<f64>,
        _mu: &[f64],
    ) -> Result<MatrixOperator<f64>, OperatorError> {
        if u.dim() != self.dim || u.len() != 1 {
            return Err(OperatorError::InvalidDimensionality);
        }
        Ok(diagonal(u.vectors()[0].map(|x| 1.0 + 3.0 * x * x)))
    }

    fn source_zeros(&self) -> DenseArray<f64> {
        DenseArray::zeros(self.dim, 1)
    }
}

/// The componentwise map `A(u)_i = u_i^2`.
///
/// Its Jacobian `diag(2 u_i)` is singular at the origin, which makes it a
/// convenient failure case for Newton's method started from the zero guess.
#[derive(Debug, Clone, Copy)]
pub struct ComponentSquare {
    dim: usize,
}

impl ComponentSquare {
    /// Initializes the operator on a space of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "dim must be greater than zero");
        Self { dim }
    }
}

impl Operator for ComponentSquare {
    type Array = DenseArray<f64>;
    type Jacobian = MatrixOperator<f64>;

    fn apply(&self, u: &DenseArray<f64>, _mu: &[f64]) -> Result<DenseArray<f64>, OperatorError> {
        if u.dim() != self.dim {
            return Err(OperatorError::InvalidDimensionality);
        }
        let vectors = u.vectors().iter().map(|v| v.map(|x| x * x)).collect();
        Ok(DenseArray::from_vectors(vectors))
    }

    fn jacobian(
        &self,
        u: &DenseArray<f64>,
        _mu: &[f64],
    ) -> Result<MatrixOperator<f64>, OperatorError> {
        if u.dim() != self.dim || u.len() != 1 {
            return Err(OperatorError::InvalidDimensionality);
        }
        Ok(diagonal(u.vectors()[0].map(|x| 2.0 * x)))
    }

    fn source_zeros(&self) -> DenseArray<f64> {
        DenseArray::zeros(self.dim, 1)
    }
}

/// The parametric componentwise map `A(u, mu)_i = mu_0 * u_i^p`.
///
/// The first parameter value scales the output; without parameters the scale
/// is one.
#[derive(Debug, Clone, Copy)]
pub struct PowerReaction {
    dim: usize,
    exponent: i32,
}

impl PowerReaction {
    /// Initializes the operator on a space of dimension `dim` with the given
    /// exponent.
    pub fn new(dim: usize, exponent: i32) -> Self {
        assert!(dim > 0, "dim must be greater than zero");
        assert!(exponent > 0, "exponent must be positive");
        Self { dim, exponent }
    }

    fn scale(mu: &[f64]) -> f64 {
        mu.first().copied().unwrap_or(1.0)
    }
}

impl Operator for PowerReaction {
    type Array = DenseArray<f64>;
    type Jacobian = MatrixOperator<f64>;

    fn apply(&self, u: &DenseArray<f64>, mu: &[f64]) -> Result<DenseArray<f64>, OperatorError> {
        if u.dim() != self.dim {
            return Err(OperatorError::InvalidDimensionality);
        }
        let scale = Self::scale(mu);
        let vectors = u
            .vectors()
            .iter()
            .map(|v| v.map(|x| scale * x.powi(self.exponent)))
            .collect();
        Ok(DenseArray::from_vectors(vectors))
    }

    fn jacobian(
        &self,
        u: &DenseArray<f64>,
        mu: &[f64],
    ) -> Result<MatrixOperator<f64>, OperatorError> {
        if u.dim() != self.dim || u.len() != 1 {
            return Err(OperatorError::InvalidDimensionality);
        }
        let scale = Self::scale(mu);
        let exponent = self.exponent;
        Ok(diagonal(
            u.vectors()[0].map(|x| scale * exponent as f64 * x.powi(exponent - 1)),
        ))
    }

    fn source_zeros(&self) -> DenseArray<f64> {
        DenseArray::zeros(self.dim, 1)
    }
}

/// A small parametric model with an exponential solution profile and two
/// reaction operators.
///
/// The solution snapshot for parameter `mu` is `u_i = exp(-mu_0 * x_i)` on
/// the uniform grid `x_i = i / (n - 1)`. The model exposes the operators
/// `"reaction"` (cubic) and `"mass"` (linear), both instances of
/// [`PowerReaction`].
#[derive(Debug, Clone)]
pub struct ReactionModel {
    dim: usize,
    reaction: PowerReaction,
    mass: PowerReaction,
}

impl ReactionModel {
    /// Initializes the model on a grid with `dim` points.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 1, "dim must be greater than one");
        Self {
            dim,
            reaction: PowerReaction::new(dim, 3),
            mass: PowerReaction::new(dim, 1),
        }
    }
}

impl Model for ReactionModel {
    type Array = DenseArray<f64>;
    type Op = PowerReaction;

    fn solve(&self, mu: &[f64]) -> Result<DenseArray<f64>, OperatorError> {
        let rate = mu.first().copied().unwrap_or(1.0);
        let n = self.dim;
        let snapshot = DVector::from_fn(n, |i, _| {
            let x = i as f64 / (n - 1) as f64;
            (-rate * x).exp()
        });
        Ok(DenseArray::from_vectors(vec![snapshot]))
    }

    fn operator(&self, name: &str) -> Option<&PowerReaction> {
        match name {
            "reaction" => Some(&self.reaction),
            "mass" => Some(&self.mass),
            _ => None,
        }
    }
}
