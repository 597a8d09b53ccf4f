//! Numerical building blocks for bandpass integration.

pub mod interp;
pub mod quadrature;

pub use interp::{BilinearInterpolator, InterpolationError, LinearInterpolator};
pub use quadrature::trapezoid;
