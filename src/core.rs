//! Core abstractions and types for romkit.
//!
//! The algorithms in [`algo`](crate::algo) and
//! [`interpolation`](crate::interpolation) consume their data exclusively
//! through the contracts defined here: [`VectorArray`] for collections of
//! vectors, [`Operator`]/[`LinearOperator`] for discretized mappings and
//! [`Model`] for systems exposing named operators and a solve capability.
//! Reference implementations backed by nalgebra live in
//! [`dense`](crate::dense).

mod array;
mod model;
mod operator;

pub use array::*;
pub use model::*;
pub use operator::*;
