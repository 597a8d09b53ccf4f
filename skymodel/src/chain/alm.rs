//! Harmonic coefficients as stored in chain archives.
//!
//! Archives store real-valued coefficients packed per channel in `(ℓ, m)`
//! order with index `ℓ² + ℓ + m` for `−ℓ ≤ m ≤ ℓ`. Negative `m` slots hold
//! the imaginary parts scaled by √2, positive slots the real parts.

use std::f64::consts::SQRT_2;

use ndarray::Array2;
use skypix::{Alm, Complex64};

use super::{invalid, ChainError};

/// Unpacks real packed coefficients of shape `(channels, (lmax+1)²)` into
/// one complex [`Alm`] per channel.
pub fn unpack_commander_alms(data: &Array2<f64>, lmax: usize) -> Result<Vec<Alm>, ChainError> {
    let required = (lmax + 1) * (lmax + 1);
    if data.ncols() < required {
        return Err(invalid(
            "alm",
            format!(
                "{} packed coefficients cannot hold lmax {lmax} (needs {required})",
                data.ncols()
            ),
        ));
    }
    Ok(data
        .rows()
        .into_iter()
        .map(|row| {
            let mut alm = Alm::zeros(lmax);
            for l in 0..=lmax {
                let center = l * l + l;
                alm.set(l, 0, Complex64::new(row[center], 0.0));
                for m in 1..=l {
                    let value = Complex64::new(row[center + m], row[center - m]) / SQRT_2;
                    alm.set(l, m, value);
                }
            }
            alm
        })
        .collect())
}
