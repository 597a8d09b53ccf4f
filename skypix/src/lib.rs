//! Spherical pixelization support for the sky model.
//!
//! Provides the HEALPix RING scheme (pixel geometry, angle/pixel conversions,
//! disc queries), spin-0 and spin-2 spherical harmonic transforms, Gaussian
//! beam smoothing and resolution up/down-grading.
//!
//! Maps are `ndarray::Array2<f64>` with shape `(channels, npix)` where the
//! channel axis is either intensity only or `(I, Q, U)`.

pub mod error;
pub mod geometry;
pub mod harmonics;
pub mod regrid;
pub mod ring;
pub mod smoothing;

pub use error::PixelizationError;
pub use geometry::{ang2vec, angular_distance, lonlat_to_vec, vec2ang};
pub use harmonics::{alm_to_map, gaussian_beam, map_to_alm, Alm};
pub use regrid::ud_grade;
pub use ring::{
    ang2pix, is_valid_nside, npix_to_nside, nside_to_npix, pix2ang, pix2vec, pixel_area,
    query_disc, resolution,
};
pub use smoothing::smooth;

/// Complex coefficient type used by [`Alm`].
pub use rustfft::num_complex::Complex64;
