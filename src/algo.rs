//! The collection of implemented algorithms.
//!
//! * [EI-Greedy](ei) -- Greedy generation of interpolation DOFs and a
//!   triangular collateral basis, sequentially or distributed across a
//!   worker pool.
//! * [DEIM](deim) -- POD-based interpolation data with a square
//!   interpolation matrix.
//! * [POD](pod) -- Proper orthogonal decomposition by the method of
//!   snapshots.
//! * [Newton](newton) -- Newton's method with fixed relaxation or Armijo
//!   line search.
//! * [Line search](line_search) -- Armijo backtracking.

pub mod deim;
pub mod ei;
pub mod line_search;
pub mod newton;
pub mod pod;

pub use deim::{DeimOptions, DeimResult};
pub use ei::{EiGreedyOptions, EiGreedyResult, ErrorNorm, EuclideanNorm, NormFn};
pub use line_search::ArmijoOptions;
pub use newton::{NewtonData, NewtonError, NewtonOptions, NewtonResult};
pub use pod::PodOptions;
