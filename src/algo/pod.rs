//! Proper orthogonal decomposition by the method of snapshots.
//!
//! The Gram matrix of the snapshot set (optionally weighted by an
//! inner-product operator) is eigendecomposed and the dominant eigenvectors
//! are lifted back into the snapshot space, producing an orthonormal basis
//! ordered by decreasing singular value. Used stand-alone or as the first
//! stage of [`deim`](crate::algo::deim::deim).

use std::cmp::Ordering;

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, ComplexField, DMatrix, RealField};
use num_traits::Zero;

use crate::core::{LinearOperator, OperatorError, VectorArray};

/// Options for [`pod`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct PodOptions<F: RealField + Copy> {
    /// Maximum number of modes to compute. Default: `None` (no limit).
    modes: Option<usize>,
    /// Discard modes with singular value at or below this absolute threshold.
    /// Default: `None`.
    atol: Option<F>,
    /// Discard modes with singular value at or below this threshold relative
    /// to the largest singular value. Default: `4e-8`, which suppresses
    /// numerically zero modes.
    rtol: F,
}

impl<F: RealField + Copy> Default for PodOptions<F> {
    fn default() -> Self {
        Self {
            modes: None,
            atol: None,
            rtol: convert(4e-8),
        }
    }
}

/// Compute a truncated orthogonal basis of the span of `u`.
///
/// Returns the modes, ordered by decreasing singular value, together with the
/// singular values themselves. The modes are orthonormal with respect to the
/// Euclidean inner product, or to the one induced by `product` if given.
pub fn pod<A>(
    u: &A,
    product: Option<&dyn LinearOperator<Array = A>>,
    options: &PodOptions<A::Field>,
) -> Result<(A, Vec<A::Field>), OperatorError>
where
    A: VectorArray,
{
    if u.is_empty() || options.modes == Some(0) {
        return Ok((u.empty_like(), Vec::new()));
    }

    let gram = match product {
        None => u.dot(u),
        Some(product) => u.dot(&product.apply(u)?),
    };

    let eig = nalgebra::linalg::SymmetricEigen::new(gram);
    let mut order: Vec<usize> = (0..u.len()).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut selected: Vec<(usize, A::Field)> = Vec::new();
    let mut cutoff = None;
    for &index in &order {
        if let Some(modes) = options.modes {
            if selected.len() >= modes {
                break;
            }
        }
        let eigenvalue = eig.eigenvalues[index];
        if eigenvalue <= A::Field::zero() {
            break;
        }
        let sval = eigenvalue.sqrt();
        let cutoff = *cutoff.get_or_insert_with(|| {
            let relative = options.rtol * sval;
            match options.atol {
                Some(atol) => relative.max(atol),
                None => relative,
            }
        });
        if sval <= cutoff {
            break;
        }
        selected.push((index, sval));
    }

    debug!(
        "selected {} of {} possible modes",
        selected.len(),
        u.len()
    );

    // Lift the eigenvectors back into the snapshot space, scaled to unit
    // norm: mode_r = (1 / sval_r) * sum_j evec[j, r] * u_j.
    let coefficients = DMatrix::from_fn(selected.len(), u.len(), |r, j| {
        let (index, sval) = selected[r];
        eig.eigenvectors[(j, index)] / sval
    });
    let modes = u.lincomb(&coefficients);
    let svals = selected.into_iter().map(|(_, sval)| sval).collect();

    Ok((modes, svals))
}
