//! Gaussian beam smoothing through a harmonic round trip.

use log::debug;
use ndarray::Array2;

use crate::error::PixelizationError;
use crate::harmonics::{alm_to_map, map_to_alm};
use crate::ring::npix_to_nside;

/// Default number of Jacobi refinement passes used when analyzing a map.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Convolves `map` with a Gaussian beam of full width `fwhm` radians.
///
/// A zero width returns the map unchanged. Otherwise the map is analyzed to
/// `lmax = 3·nside − 1`, multiplied by the beam window and re-synthesized.
/// With `polarized` the three channels are treated as `(I, Q, U)`.
pub fn smooth(
    map: &Array2<f64>,
    fwhm: f64,
    polarized: bool,
    iterations: usize,
) -> Result<Array2<f64>, PixelizationError> {
    if fwhm == 0.0 {
        return Ok(map.clone());
    }
    let nside = npix_to_nside(map.ncols())?;
    let lmax = 3 * nside as usize - 1;
    debug!(
        "smoothing {} channel(s) at nside {nside} with fwhm {:.3} arcmin",
        map.nrows(),
        fwhm.to_degrees() * 60.0
    );
    let alms = map_to_alm(map.view(), lmax, polarized, iterations)?;
    alm_to_map(&alms, nside, lmax, fwhm, polarized)
}
