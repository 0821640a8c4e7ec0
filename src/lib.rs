#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Romkit
//!
//! Building blocks for model order reduction written entirely in Rust:
//! empirical interpolation (EI-Greedy and DEIM), proper orthogonal
//! decomposition and a globally convergent Newton solver, all operating on
//! abstract vector collections and operators.
//!
//! The algorithms never touch a concrete discretization. They consume their
//! data through the [`VectorArray`] and [`Operator`]/[`LinearOperator`]
//! contracts, so any backend that can copy vectors, take norms, extract
//! degrees of freedom and form linear combinations can drive them. A dense,
//! nalgebra-backed reference backend is provided in [`dense`].
//!
//! ## Empirical interpolation
//!
//! Given a family of snapshot vectors, the greedy search selects
//! interpolation DOFs and a collateral basis so that every snapshot is well
//! approximated by interpolating its values at the selected DOFs:
//!
//! ```rust
//! use nalgebra::DVector;
//! use romkit::algo::ei::{ei_greedy, EiGreedyOptions, EuclideanNorm};
//! use romkit::{DenseArray, VectorArray};
//!
//! // A smooth family of exponential profiles.
//! let vectors: Vec<_> = (1..=8)
//!     .map(|k| DVector::from_fn(32, |i, _| (-(i as f64 / 31.0) * k as f64).exp()))
//!     .collect();
//! let snapshots = DenseArray::from_vectors(vectors);
//!
//! let mut options = EiGreedyOptions::default();
//! options.set_max_interpolation_dofs(Some(4));
//!
//! let result = ei_greedy(snapshots, EuclideanNorm, &options);
//! assert_eq!(result.dofs.len(), result.basis.len());
//! assert!(result.dofs.len() <= 4);
//! ```
//!
//! The same search runs distributed: scatter the snapshots across a
//! [`WorkerPool`](pool::WorkerPool) with
//! [`ei_greedy_parallel`](algo::ei::ei_greedy_parallel) and only one scalar
//! per worker and one vector per accepted DOF cross the pool boundary per
//! iteration. The selection is identical to the sequential search.
//!
//! ## Newton's method
//!
//! [`newton`](algo::newton::newton) solves `A(U, mu) = V` for operators
//! providing Jacobian linearizations:
//!
//! ```rust
//! use nalgebra::{dmatrix, dvector};
//! use romkit::algo::newton::{newton, NewtonOptions};
//! use romkit::{DenseArray, MatrixOperator};
//!
//! let a = MatrixOperator::new(dmatrix![2.0, 0.0; 0.0, 4.0]);
//! let rhs = DenseArray::from_vectors(vec![dvector![2.0, 8.0]]);
//!
//! let mut options = NewtonOptions::default();
//! options.set_atol(1e-12);
//!
//! let result = newton(&a, &rhs, None, &[], None, &options).unwrap();
//! // A linear problem is solved by a single Newton step.
//! assert_eq!(result.iterations, 1);
//! ```
//!
//! Failures (a singular Jacobian, exhaustion of the iteration budget,
//! non-finite norms) are typed results carrying the full per-iteration norm
//! histories for diagnosis.
//!
//! ## Operator interpolation
//!
//! [`interpolate_operators`](interpolation::interpolate_operators) ties it
//! together for a [`Model`]: it evaluates named operators on solution
//! snapshots over a parameter sample, generates interpolation data with
//! EI-Greedy or DEIM and returns the model with the operators replaced by
//! [`EmpiricalInterpolatedOperator`]s sharing one collateral basis.

pub mod algo;
mod core;
pub mod dense;
pub mod interpolation;
pub mod pool;

pub use core::*;
pub use dense::{DenseArray, MatrixOperator};
pub use interpolation::{
    interpolate_operators, EiAlgorithm, EmpiricalInterpolatedOperator, InterpolatedModel,
};
pub use pool::{RayonPool, SequentialPool, WorkerLocal, WorkerPool};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
