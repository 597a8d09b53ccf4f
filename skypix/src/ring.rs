//! HEALPix RING scheme.
//!
//! Pixels are numbered along iso-latitude rings from the north pole to the
//! south pole, and eastwards within each ring. For a given `nside` there are
//! `4·nside − 1` rings:
//! - rings `1..nside` form the north polar cap, ring `i` holding `4i` pixels
//! - rings `nside..=3·nside` form the equatorial belt, `4·nside` pixels each
//! - rings above `3·nside` mirror the north cap
//!
//! Every pixel covers the same solid angle `4π / (12·nside²)`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::error::PixelizationError;
use crate::geometry::{dot, vec2ang};

/// Largest resolution representable with 64-bit pixel indices.
pub const MAX_NSIDE: u32 = 1 << 29;

/// Whether `nside` is a power of two within the supported range.
pub fn is_valid_nside(nside: u32) -> bool {
    nside > 0 && nside <= MAX_NSIDE && nside.is_power_of_two()
}

/// Checks `nside`, returning it unchanged on success.
pub fn check_nside(nside: u32) -> Result<u32, PixelizationError> {
    if is_valid_nside(nside) {
        Ok(nside)
    } else {
        Err(PixelizationError::InvalidNside(nside))
    }
}

/// Total pixel count `12·nside²`.
pub fn nside_to_npix(nside: u32) -> usize {
    let n = nside as usize;
    12 * n * n
}

/// Inverse of [`nside_to_npix`], rejecting counts that are not a valid resolution.
pub fn npix_to_nside(npix: usize) -> Result<u32, PixelizationError> {
    if npix == 0 || npix % 12 != 0 {
        return Err(PixelizationError::InvalidPixelCount(npix));
    }
    let n2 = npix / 12;
    let n = isqrt(n2);
    if n * n != n2 || n > MAX_NSIDE as usize || !is_valid_nside(n as u32) {
        return Err(PixelizationError::InvalidPixelCount(npix));
    }
    Ok(n as u32)
}

/// Solid angle of one pixel in steradians.
pub fn pixel_area(nside: u32) -> f64 {
    4.0 * PI / nside_to_npix(nside) as f64
}

/// Characteristic pixel size `sqrt(pixel_area)` in radians.
pub fn resolution(nside: u32) -> f64 {
    pixel_area(nside).sqrt()
}

/// Number of iso-latitude rings.
pub fn ring_count(nside: u32) -> usize {
    4 * nside as usize - 1
}

/// Layout of one iso-latitude ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// Index of the first pixel in the ring
    pub start: usize,
    /// Number of pixels in the ring
    pub n_pixels: usize,
    /// cos(theta) of the ring
    pub z: f64,
    /// sin(theta) of the ring, computed without cancellation near the poles
    pub sin_theta: f64,
    /// Longitude of the first pixel center
    pub phi0: f64,
}

impl Ring {
    /// Longitude of pixel `j` within the ring.
    pub fn phi(&self, j: usize) -> f64 {
        self.phi0 + TAU * j as f64 / self.n_pixels as f64
    }

    pub fn theta(&self) -> f64 {
        self.sin_theta.atan2(self.z)
    }
}

/// Geometry of ring `i` (1-based, `1..=4·nside−1`).
pub fn ring_info(nside: u32, i: usize) -> Ring {
    let n = nside as usize;
    let nf = nside as f64;
    let npix = nside_to_npix(nside);
    let ncap = 2 * n * (n - 1);

    if i < n {
        let tmp = (i * i) as f64 / (3.0 * nf * nf);
        Ring {
            start: 2 * i * (i - 1),
            n_pixels: 4 * i,
            z: 1.0 - tmp,
            sin_theta: (tmp * (2.0 - tmp)).sqrt(),
            phi0: PI / (4.0 * i as f64),
        }
    } else if i <= 3 * n {
        let z = 4.0 / 3.0 - 2.0 * i as f64 / (3.0 * nf);
        let phi0 = if (i + n) % 2 == 1 {
            0.0
        } else {
            PI / (4.0 * nf)
        };
        Ring {
            start: ncap + (i - n) * 4 * n,
            n_pixels: 4 * n,
            z,
            sin_theta: ((1.0 - z) * (1.0 + z)).sqrt(),
            phi0,
        }
    } else {
        let k = 4 * n - i;
        let tmp = (k * k) as f64 / (3.0 * nf * nf);
        Ring {
            start: npix - 2 * k * (k + 1),
            n_pixels: 4 * k,
            z: tmp - 1.0,
            sin_theta: (tmp * (2.0 - tmp)).sqrt(),
            phi0: PI / (4.0 * k as f64),
        }
    }
}

/// All rings of the scheme, north to south.
pub fn rings(nside: u32) -> Vec<Ring> {
    (1..=ring_count(nside))
        .map(|i| ring_info(nside, i))
        .collect()
}

/// Ring number (1-based) containing `pix`.
fn pix2ring(nside: u32, pix: usize) -> usize {
    let n = nside as usize;
    let npix = nside_to_npix(nside);
    let ncap = 2 * n * (n - 1);

    if pix < ncap {
        (1 + isqrt(1 + 2 * pix)) / 2
    } else if pix < npix - ncap {
        (pix - ncap) / (4 * n) + n
    } else {
        let ip = npix - pix;
        4 * n - (1 + isqrt(2 * ip - 1)) / 2
    }
}

/// Colatitude and longitude (radians) of the center of `pix`.
pub fn pix2ang(nside: u32, pix: usize) -> (f64, f64) {
    let ring = ring_info(nside, pix2ring(nside, pix));
    (ring.theta(), ring.phi(pix - ring.start))
}

/// Unit vector to the center of `pix`.
pub fn pix2vec(nside: u32, pix: usize) -> [f64; 3] {
    let ring = ring_info(nside, pix2ring(nside, pix));
    let phi = ring.phi(pix - ring.start);
    [
        ring.sin_theta * phi.cos(),
        ring.sin_theta * phi.sin(),
        ring.z,
    ]
}

/// Pixel containing the direction (colatitude, longitude) in radians.
pub fn ang2pix(nside: u32, theta: f64, phi: f64) -> usize {
    ang2pix_z_phi(nside, theta.cos(), phi)
}

/// Pixel containing the direction of a (not necessarily normalized) vector.
pub fn vec2pix(nside: u32, v: [f64; 3]) -> usize {
    let (theta, phi) = vec2ang(v);
    ang2pix(nside, theta, phi)
}

fn ang2pix_z_phi(nside: u32, z: f64, phi: f64) -> usize {
    let n = nside as i64;
    let nf = nside as f64;
    let za = z.abs();
    let tt = phi.rem_euclid(TAU) / FRAC_PI_2;

    if za <= 2.0 / 3.0 {
        let temp1 = nf * (0.5 + tt);
        let temp2 = nf * z * 0.75;
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ir = n + 1 + jp - jm;
        let kshift = 1 - (ir & 1);
        let ip = (jp + jm - n + kshift + 1) / 2;
        let ip = ip.rem_euclid(4 * n);
        let ncap = 2 * n * (n - 1);
        (ncap + (ir - 1) * 4 * n + ip) as usize
    } else {
        let tp = tt - tt.floor();
        let tmp = nf * (3.0 * (1.0 - za)).sqrt();
        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;
        let ir = jp + jm + 1;
        let ip = ((tt * ir as f64) as i64).rem_euclid(4 * ir);
        if z > 0.0 {
            (2 * ir * (ir - 1) + ip) as usize
        } else {
            let npix = 12 * n * n;
            (npix - 2 * ir * (ir + 1) + ip) as usize
        }
    }
}

/// Pixels whose centers lie within `radius` radians of `center`.
///
/// Returned indices are sorted ascending. Candidates are generated per ring
/// from the longitude half-width of the disc and then confirmed against the
/// exact angular separation.
pub fn query_disc(nside: u32, center: [f64; 3], radius: f64) -> Vec<usize> {
    let norm = dot(center, center).sqrt();
    let c = [center[0] / norm, center[1] / norm, center[2] / norm];
    let (theta_c, phi_c) = vec2ang(c);
    let cos_r = radius.min(PI).cos();
    let sin_theta_c = theta_c.sin();

    let mut pixels = Vec::new();
    for ring in rings(nside) {
        let theta = ring.theta();
        if (theta - theta_c).abs() > radius {
            continue;
        }
        let step = TAU / ring.n_pixels as f64;
        let denom = ring.sin_theta * sin_theta_c;
        let half_width = if denom <= 1e-15 {
            PI
        } else {
            let cos_dphi = (cos_r - ring.z * c[2]) / denom;
            if cos_dphi <= -1.0 {
                PI
            } else {
                cos_dphi.min(1.0).acos()
            }
        };

        if half_width + step >= PI {
            for j in 0..ring.n_pixels {
                push_if_inside(&mut pixels, &ring, j, c, cos_r);
            }
            continue;
        }

        let lo = ((phi_c - half_width - ring.phi0) / step).floor() as i64 - 1;
        let hi = ((phi_c + half_width - ring.phi0) / step).ceil() as i64 + 1;
        let nr = ring.n_pixels as i64;
        for k in lo..=hi {
            let j = k.rem_euclid(nr) as usize;
            push_if_inside(&mut pixels, &ring, j, c, cos_r);
        }
    }
    pixels.sort_unstable();
    pixels.dedup();
    pixels
}

fn push_if_inside(pixels: &mut Vec<usize>, ring: &Ring, j: usize, center: [f64; 3], cos_r: f64) {
    let phi = ring.phi(j);
    let v = [
        ring.sin_theta * phi.cos(),
        ring.sin_theta * phi.sin(),
        ring.z,
    ];
    if dot(v, center) >= cos_r {
        pixels.push(ring.start + j);
    }
}

/// Pixel center directions as (colatitude, longitude) for every pixel.
pub fn pixel_centers(nside: u32) -> Vec<(f64, f64)> {
    let mut centers = Vec::with_capacity(nside_to_npix(nside));
    for ring in rings(nside) {
        let theta = ring.theta();
        for j in 0..ring.n_pixels {
            centers.push((theta, ring.phi(j)));
        }
    }
    centers
}

fn isqrt(v: usize) -> usize {
    let mut r = (v as f64).sqrt() as usize;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ang2vec, angular_distance};
    use approx::assert_relative_eq;

    #[test]
    fn test_nside_validation() {
        assert!(is_valid_nside(1));
        assert!(is_valid_nside(64));
        assert!(is_valid_nside(MAX_NSIDE));
        assert!(!is_valid_nside(0));
        assert!(!is_valid_nside(3));
        assert!(!is_valid_nside(48));
        assert!(check_nside(12).is_err());
    }

    #[test]
    fn test_npix_nside_conversions() {
        assert_eq!(nside_to_npix(1), 12);
        assert_eq!(nside_to_npix(64), 49152);
        assert_eq!(npix_to_nside(49152).unwrap(), 64);
        assert_eq!(npix_to_nside(12).unwrap(), 1);
        assert!(npix_to_nside(13).is_err());
        assert!(npix_to_nside(12 * 9).is_err());
        assert!(npix_to_nside(0).is_err());
    }

    #[test]
    fn test_rings_tile_every_pixel_once() {
        for nside in [1u32, 2, 4, 8] {
            let mut expected_start = 0;
            for ring in rings(nside) {
                assert_eq!(ring.start, expected_start);
                expected_start += ring.n_pixels;
            }
            assert_eq!(expected_start, nside_to_npix(nside));
        }
    }

    #[test]
    fn test_ring_z_is_symmetric() {
        let nside = 8;
        let all = rings(nside);
        let nr = all.len();
        for i in 0..nr {
            assert_relative_eq!(all[i].z, -all[nr - 1 - i].z, epsilon = 1e-14);
            assert_relative_eq!(all[i].sin_theta.powi(2) + all[i].z.powi(2), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_pix2ang_ang2pix_roundtrip() {
        for nside in [1u32, 2, 4, 16, 32] {
            for pix in 0..nside_to_npix(nside) {
                let (theta, phi) = pix2ang(nside, pix);
                assert_eq!(ang2pix(nside, theta, phi), pix, "nside {nside} pix {pix}");
            }
        }
    }

    #[test]
    fn test_nside1_known_centers() {
        // First ring of nside=1: z = 2/3, phi = pi/4 + k*pi/2
        let (theta, phi) = pix2ang(1, 0);
        assert_relative_eq!(theta.cos(), 2.0 / 3.0, epsilon = 1e-14);
        assert_relative_eq!(phi, PI / 4.0, epsilon = 1e-14);

        // Equator ring of nside=1 starts at phi = 0
        let (theta, phi) = pix2ang(1, 4);
        assert_relative_eq!(theta, FRAC_PI_2, epsilon = 1e-14);
        assert_relative_eq!(phi, 0.0, epsilon = 1e-14);

        let (theta, _) = pix2ang(1, 11);
        assert_relative_eq!(theta.cos(), -2.0 / 3.0, epsilon = 1e-14);
    }

    #[test]
    fn test_query_disc_matches_brute_force() {
        let nside = 16;
        let centers = [
            ang2vec(0.3, 1.0),
            ang2vec(FRAC_PI_2, 0.0),
            ang2vec(PI - 0.05, 5.5),
            ang2vec(0.0, 0.0),
        ];
        for center in centers {
            for radius in [0.05, 0.2, 0.7] {
                let found = query_disc(nside, center, radius);
                let expected: Vec<usize> = (0..nside_to_npix(nside))
                    .filter(|&p| angular_distance(pix2vec(nside, p), center) <= radius)
                    .collect();
                assert_eq!(found, expected, "radius {radius}");
            }
        }
    }

    #[test]
    fn test_query_disc_whole_sphere() {
        let all = query_disc(4, [0.0, 0.0, 1.0], PI);
        assert_eq!(all.len(), nside_to_npix(4));
    }

    #[test]
    fn test_pixel_area_sums_to_sphere() {
        let nside = 32;
        assert_relative_eq!(
            pixel_area(nside) * nside_to_npix(nside) as f64,
            4.0 * PI,
            epsilon = 1e-12
        );
        assert_relative_eq!(resolution(nside), pixel_area(nside).sqrt());
    }
}
