use thiserror::Error;

/// Errors raised by pixelization, transform and regridding routines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PixelizationError {
    #[error("invalid nside {0}: must be a power of two between 1 and 2^29")]
    InvalidNside(u32),

    #[error("pixel count {0} does not correspond to a valid HEALPix resolution")]
    InvalidPixelCount(usize),

    #[error("expected {expected} channels, found {found}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("no harmonic coefficients supplied")]
    EmptyAlm,

    #[error("harmonic coefficient array of length {len} does not match lmax {lmax}")]
    AlmSizeMismatch { len: usize, lmax: usize },
}
