//! Unit-vector geometry on the sphere.
//!
//! Colatitude `theta` is measured from the north pole in `[0, π]`, longitude
//! `phi` in `[0, 2π)`. Galactic/equatorial `(lon, lat)` pairs are taken in
//! degrees at the public boundary.

use std::f64::consts::{FRAC_PI_2, TAU};

/// Unit vector for colatitude/longitude in radians.
pub fn ang2vec(theta: f64, phi: f64) -> [f64; 3] {
    let sin_theta = theta.sin();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), theta.cos()]
}

/// Colatitude and longitude (radians) of a vector. The vector need not be normalized.
pub fn vec2ang(v: [f64; 3]) -> (f64, f64) {
    let rho = v[0].hypot(v[1]);
    let theta = rho.atan2(v[2]);
    let mut phi = v[1].atan2(v[0]);
    if phi < 0.0 {
        phi += TAU;
    }
    (theta, phi)
}

/// Unit vector for a longitude/latitude pair given in degrees.
pub fn lonlat_to_vec(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
    ang2vec(FRAC_PI_2 - lat_deg.to_radians(), lon_deg.to_radians())
}

/// Great-circle distance between two unit vectors, in radians.
///
/// Uses `atan2(|a × b|, a · b)` which stays accurate for both tiny and
/// near-antipodal separations.
pub fn angular_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let cross = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    let cross_norm = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    cross_norm.atan2(dot)
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
