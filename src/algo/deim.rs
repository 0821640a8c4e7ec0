//! Discrete empirical interpolation (DEIM).
//!
//! Unlike the greedy search in [`ei`](crate::algo::ei), DEIM first compresses
//! the snapshot set with [`pod`](crate::algo::pod::pod) and then selects one
//! interpolation DOF per POD mode in a single pass: each mode is
//! approximated by interpolation through the DOFs chosen so far and the DOF
//! of the largest residual entry becomes the mode's interpolation point. The
//! resulting interpolation matrix is square and invertible by construction,
//! but not triangular.
//!
//! # References
//!
//! \[1\] [Nonlinear Model Reduction via Discrete Empirical
//! Interpolation](https://doi.org/10.1137/090766498)

use getset::{CopyGetters, Setters};
use log::{debug, info};
use nalgebra::{linalg::LU, RealField};
use num_traits::One;

use crate::algo::pod::{pod, PodOptions};
use crate::core::{InversionError, LinearOperator, OperatorError, VectorArray};

/// Options for [`deim`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct DeimOptions<F: RealField + Copy> {
    /// Dimension of the collateral basis, i.e. the number of POD modes.
    /// Default: `None` (determined by the POD tolerances).
    modes: Option<usize>,
    /// Absolute POD singular value tolerance. Default: `None`.
    atol: Option<F>,
    /// Relative POD singular value tolerance. Default: `None` (the POD
    /// default applies).
    rtol: Option<F>,
}

impl<F: RealField + Copy> Default for DeimOptions<F> {
    fn default() -> Self {
        Self {
            modes: None,
            atol: None,
            rtol: None,
        }
    }
}

/// Interpolation data generated by DEIM.
#[derive(Debug, Clone)]
pub struct DeimResult<A: VectorArray> {
    /// The DOFs at which interpolation takes place, one per collateral basis
    /// vector.
    pub dofs: Vec<usize>,
    /// The collateral basis: the leading POD modes of the input, truncated to
    /// the number of DOFs actually chosen.
    pub basis: A,
    /// The POD singular values of the input.
    pub svals: Vec<A::Field>,
}

/// Generate interpolation DOFs and a collateral basis for the vectors of `u`
/// using the DEIM algorithm.
///
/// `product` is the inner product used by the POD stage. Each POD mode
/// contributes exactly one interpolation point; if the selection degenerates
/// (a DOF repeats), the basis is truncated to the DOFs chosen so far and the
/// accumulated data is returned.
pub fn deim<A>(
    u: &A,
    product: Option<&dyn LinearOperator<Array = A>>,
    options: &DeimOptions<A::Field>,
) -> Result<DeimResult<A>, OperatorError>
where
    A: VectorArray,
{
    info!("generating interpolation data for {} vectors", u.len());

    let mut pod_options = PodOptions::default();
    pod_options.set_modes(options.modes).set_atol(options.atol);
    if let Some(rtol) = options.rtol {
        pod_options.set_rtol(rtol);
    }
    let (mut basis, svals) = pod(u, product, &pod_options)?;

    let mut dofs: Vec<usize> = Vec::new();
    for i in 0..basis.len() {
        debug!("choosing interpolation point for basis vector {}", i);

        let vec = basis.vector(i);
        let residual = if dofs.is_empty() {
            vec
        } else {
            // Interpolate the new mode through the DOFs chosen so far and
            // keep what the earlier modes cannot reproduce.
            let matrix = basis.slice(0..dofs.len()).dofs(&dofs).transpose();
            let values = vec.dofs(&dofs).transpose();
            let coefficients = LU::new(matrix)
                .solve(&values)
                .ok_or(InversionError::Singular)?;
            let interpolated = basis.slice(0..dofs.len()).lincomb(&coefficients.transpose());
            let mut residual = vec;
            residual.axpy(&[-A::Field::one()], &interpolated);
            residual
        };

        let (new_dof, _) = residual.amax()[0];
        if dofs.contains(&new_dof) {
            info!(
                "DOF {} selected twice for interpolation, stopping selection",
                new_dof
            );
            break;
        }
        dofs.push(new_dof);
    }

    if dofs.len() < basis.len() {
        basis.truncate(dofs.len());
    }

    Ok(DeimResult { dofs, basis, svals })
}
