//! Resolution changes between RING maps.
//!
//! HEALPix pixels are hierarchical, so every pixel center at a finer
//! resolution falls inside exactly one pixel of any coarser resolution.
//! Degrading averages the children of each coarse pixel; upgrading copies
//! the parent value into each child.

use ndarray::Array2;

use crate::error::PixelizationError;
use crate::ring::{ang2pix, check_nside, npix_to_nside, nside_to_npix, pixel_centers};

/// Re-pixelizes every channel of `map` to `nside_out`.
pub fn ud_grade(map: &Array2<f64>, nside_out: u32) -> Result<Array2<f64>, PixelizationError> {
    check_nside(nside_out)?;
    let nside_in = npix_to_nside(map.ncols())?;
    if nside_in == nside_out {
        return Ok(map.clone());
    }
    let n_channels = map.nrows();
    let npix_out = nside_to_npix(nside_out);

    if nside_out < nside_in {
        let mut sums = Array2::<f64>::zeros((n_channels, npix_out));
        let mut counts = vec![0usize; npix_out];
        for (pix, (theta, phi)) in pixel_centers(nside_in).into_iter().enumerate() {
            let parent = ang2pix(nside_out, theta, phi);
            counts[parent] += 1;
            for c in 0..n_channels {
                sums[[c, parent]] += map[[c, pix]];
            }
        }
        for (p, &count) in counts.iter().enumerate() {
            for c in 0..n_channels {
                sums[[c, p]] /= count as f64;
            }
        }
        Ok(sums)
    } else {
        let mut out = Array2::<f64>::zeros((n_channels, npix_out));
        for (pix, (theta, phi)) in pixel_centers(nside_out).into_iter().enumerate() {
            let parent = ang2pix(nside_in, theta, phi);
            for c in 0..n_channels {
                out[[c, pix]] = map[[c, parent]];
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_same_resolution_is_identity() {
        let map = Array2::from_shape_fn((3, nside_to_npix(4)), |(c, p)| (c * 1000 + p) as f64);
        assert_eq!(ud_grade(&map, 4).unwrap(), map);
    }

    #[test]
    fn test_degrade_preserves_mean() {
        let map = Array2::from_shape_fn((1, nside_to_npix(16)), |(_, p)| (p % 7) as f64);
        let coarse = ud_grade(&map, 4).unwrap();
        assert_eq!(coarse.ncols(), nside_to_npix(4));
        assert_relative_eq!(coarse.mean().unwrap(), map.mean().unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_upgrade_then_degrade_roundtrip() {
        let map = Array2::from_shape_fn((2, nside_to_npix(2)), |(c, p)| (c as f64 + 1.0) * p as f64);
        let fine = ud_grade(&map, 8).unwrap();
        assert_eq!(fine.dim(), (2, nside_to_npix(8)));
        let back = ud_grade(&fine, 2).unwrap();
        for (a, b) in map.iter().zip(back.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_target() {
        let map = Array2::zeros((1, nside_to_npix(4)));
        assert!(ud_grade(&map, 3).is_err());
    }
}
