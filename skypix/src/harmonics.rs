//! Spherical harmonic synthesis and analysis on the RING grid.
//!
//! Coefficients are stored in the healpy ordering, `m`-major:
//! `index(l, m) = m·(2·lmax + 1 − m)/2 + l` for `0 ≤ m ≤ l ≤ lmax`.
//!
//! # Transforms
//!
//! Synthesis evaluates, ring by ring, the Fourier coefficients
//! `F_m(θ) = Σ_l a_lm b_l λ_lm(θ)` and folds them onto the ring with one
//! inverse FFT. Analysis is the adjoint: a forward FFT per ring followed by
//! quadrature weights `4π/npix`, optionally refined with Jacobi iterations.
//!
//! Polarized transforms map `(T, E, B)` to `(I, Q, U)` using the spin-2
//! functions `F1`/`F2` of the HEALPix conventions.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::PixelizationError;
use crate::ring::{check_nside, npix_to_nside, nside_to_npix, rings, Ring};

/// Triangular array of complex harmonic coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Alm {
    lmax: usize,
    data: Vec<Complex64>,
}

impl Alm {
    /// Number of coefficients stored for `lmax`.
    pub fn size(lmax: usize) -> usize {
        (lmax + 1) * (lmax + 2) / 2
    }

    pub fn zeros(lmax: usize) -> Self {
        Self {
            lmax,
            data: vec![Complex64::new(0.0, 0.0); Self::size(lmax)],
        }
    }

    /// Wraps healpy-ordered coefficients.
    pub fn from_vec(lmax: usize, data: Vec<Complex64>) -> Result<Self, PixelizationError> {
        if data.len() != Self::size(lmax) {
            return Err(PixelizationError::AlmSizeMismatch {
                len: data.len(),
                lmax,
            });
        }
        Ok(Self { lmax, data })
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn index(&self, l: usize, m: usize) -> usize {
        m * (2 * self.lmax + 1 - m) / 2 + l
    }

    pub fn get(&self, l: usize, m: usize) -> Complex64 {
        self.data[self.index(l, m)]
    }

    pub fn set(&mut self, l: usize, m: usize, value: Complex64) {
        let idx = self.index(l, m);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    fn add_assign(&mut self, other: &Alm) {
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += *b;
        }
    }

    /// Copy truncated (or zero-padded) to a different `lmax`.
    pub fn truncated(&self, lmax: usize) -> Alm {
        let mut out = Alm::zeros(lmax);
        let common = lmax.min(self.lmax);
        for m in 0..=common {
            for l in m..=common {
                out.set(l, m, self.get(l, m));
            }
        }
        out
    }
}

/// Gaussian beam window `b_l` for spin 0 or spin 2 fields.
///
/// `fwhm` is in radians; a zero width gives a unit window.
pub fn gaussian_beam(lmax: usize, fwhm: f64, spin: usize) -> Vec<f64> {
    let sigma = fwhm / (8.0 * 2f64.ln()).sqrt();
    let s2 = (spin * spin) as f64;
    (0..=lmax)
        .map(|l| {
            if l < spin {
                0.0
            } else {
                let ll = (l * (l + 1)) as f64;
                (-0.5 * sigma * sigma * (ll - s2)).exp()
            }
        })
        .collect()
}

/// Normalized associated Legendre functions `λ_lm(cos θ)` for one ring,
/// stored with the same layout as [`Alm`].
fn legendre_table(lmax: usize, z: f64, sin_theta: f64) -> Vec<f64> {
    let mut table = vec![0.0; Alm::size(lmax)];
    let idx = |l: usize, m: usize| m * (2 * lmax + 1 - m) / 2 + l;

    let mut lambda_mm = 1.0 / (4.0 * PI).sqrt();
    for m in 0..=lmax {
        if m > 0 {
            let mf = m as f64;
            lambda_mm *= -((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * sin_theta;
        }
        table[idx(m, m)] = lambda_mm;
        if m == lmax {
            break;
        }
        let mf = m as f64;
        let mut prev2 = lambda_mm;
        let mut prev1 = z * (2.0 * mf + 3.0).sqrt() * lambda_mm;
        table[idx(m + 1, m)] = prev1;
        for l in (m + 2)..=lmax {
            let lf = l as f64;
            let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
            let b = (((lf - 1.0) * (lf - 1.0) - mf * mf) / (4.0 * (lf - 1.0) * (lf - 1.0) - 1.0))
                .sqrt();
            let current = a * (z * prev1 - b * prev2);
            table[idx(l, m)] = current;
            prev2 = prev1;
            prev1 = current;
        }
    }
    table
}

/// Spin-2 functions `(F1, F2)` for one ring, derived from the `λ_lm` table.
fn spin2_tables(lmax: usize, z: f64, sin_theta: f64, lambda: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let size = Alm::size(lmax);
    let mut f1 = vec![0.0; size];
    let mut f2 = vec![0.0; size];
    let idx = |l: usize, m: usize| m * (2 * lmax + 1 - m) / 2 + l;
    let s2 = sin_theta * sin_theta;

    for m in 0..=lmax {
        let mf = m as f64;
        for l in m.max(2)..=lmax {
            let lf = l as f64;
            let norm = 2.0 / ((lf - 1.0) * lf * (lf + 1.0) * (lf + 2.0)).sqrt();
            let lam = lambda[idx(l, m)];
            let lam_prev = if l > m { lambda[idx(l - 1, m)] } else { 0.0 };
            let coupling = ((2.0 * lf + 1.0) / (2.0 * lf - 1.0) * (lf * lf - mf * mf)).sqrt();

            f1[idx(l, m)] = norm
                * (-((lf - mf * mf) / s2 + 0.5 * lf * (lf - 1.0)) * lam
                    + coupling * z / s2 * lam_prev);
            f2[idx(l, m)] = norm * (mf / s2) * (-(lf - 1.0) * z * lam + coupling * lam_prev);
        }
    }
    (f1, f2)
}

fn fft_plans(ring_list: &[Ring], inverse: bool) -> HashMap<usize, Arc<dyn Fft<f64>>> {
    let mut planner = FftPlanner::<f64>::new();
    let mut plans = HashMap::new();
    for ring in ring_list {
        plans.entry(ring.n_pixels).or_insert_with(|| {
            if inverse {
                planner.plan_fft_inverse(ring.n_pixels)
            } else {
                planner.plan_fft_forward(ring.n_pixels)
            }
        });
    }
    plans
}

/// Folds per-`m` ring coefficients onto pixel values of one ring.
fn synthesize_ring(ring: &Ring, fm: &[Complex64], fft: &Arc<dyn Fft<f64>>) -> Vec<f64> {
    let nr = ring.n_pixels;
    let mut buffer = vec![Complex64::new(0.0, 0.0); nr];
    for (m, value) in fm.iter().enumerate() {
        let weight = if m == 0 { 1.0 } else { 2.0 };
        let phase = Complex64::from_polar(1.0, m as f64 * ring.phi0);
        buffer[m % nr] += *value * phase * weight;
    }
    fft.process(&mut buffer);
    buffer.into_iter().map(|c| c.re).collect()
}

/// Phase-corrected Fourier coefficients `G_m` of one ring, `m = 0..=mmax`.
fn analyze_ring(
    ring: &Ring,
    values: &[f64],
    mmax: usize,
    fft: &Arc<dyn Fft<f64>>,
) -> Vec<Complex64> {
    let nr = ring.n_pixels;
    let mut buffer: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft.process(&mut buffer);
    (0..=mmax)
        .map(|m| buffer[m % nr] * Complex64::from_polar(1.0, -(m as f64) * ring.phi0))
        .collect()
}

/// Synthesizes a map from harmonic coefficients.
///
/// With `polarized` the three coefficient sets are `(T, E, B)` and the
/// output channels `(I, Q, U)`; otherwise every set is transformed as an
/// independent spin-0 field. The Gaussian beam `fwhm` (radians) is applied
/// in harmonic space.
pub fn alm_to_map(
    alms: &[Alm],
    nside: u32,
    lmax: usize,
    fwhm: f64,
    polarized: bool,
) -> Result<Array2<f64>, PixelizationError> {
    check_nside(nside)?;
    if alms.is_empty() {
        return Err(PixelizationError::EmptyAlm);
    }
    if polarized && alms.len() != 3 {
        return Err(PixelizationError::ChannelMismatch {
            expected: 3,
            found: alms.len(),
        });
    }
    let lmax = alms.iter().map(Alm::lmax).fold(lmax, usize::min);
    let alms: Vec<Alm> = alms.iter().map(|a| a.truncated(lmax)).collect();
    let beam0 = gaussian_beam(lmax, fwhm, 0);
    let beam2 = gaussian_beam(lmax, fwhm, 2);

    let ring_list = rings(nside);
    let plans = fft_plans(&ring_list, true);
    let n_channels = alms.len();

    let ring_values: Vec<Vec<Vec<f64>>> = ring_list
        .par_iter()
        .map(|ring| {
            let lambda = legendre_table(lmax, ring.z, ring.sin_theta);
            let fft = &plans[&ring.n_pixels];
            let mut channels = Vec::with_capacity(n_channels);

            let spin0_channels = if polarized { 1 } else { n_channels };
            for alm in alms.iter().take(spin0_channels) {
                let fm: Vec<Complex64> = (0..=lmax)
                    .map(|m| {
                        (m..=lmax).fold(Complex64::new(0.0, 0.0), |acc, l| {
                            let i = alm.index(l, m);
                            acc + alm.data[i] * (beam0[l] * lambda[i])
                        })
                    })
                    .collect();
                channels.push(synthesize_ring(ring, &fm, fft));
            }

            if polarized {
                let (f1, f2) = spin2_tables(lmax, ring.z, ring.sin_theta, &lambda);
                let (e, b) = (&alms[1], &alms[2]);
                let i_unit = Complex64::new(0.0, 1.0);
                let mut qm = Vec::with_capacity(lmax + 1);
                let mut um = Vec::with_capacity(lmax + 1);
                for m in 0..=lmax {
                    let mut q = Complex64::new(0.0, 0.0);
                    let mut u = Complex64::new(0.0, 0.0);
                    for l in m.max(2)..=lmax {
                        let i = e.index(l, m);
                        let ae = e.data[i] * beam2[l];
                        let ab = b.data[i] * beam2[l];
                        q -= ae * f1[i] + i_unit * ab * f2[i];
                        u -= ab * f1[i] - i_unit * ae * f2[i];
                    }
                    qm.push(q);
                    um.push(u);
                }
                channels.push(synthesize_ring(ring, &qm, fft));
                channels.push(synthesize_ring(ring, &um, fft));
            }
            channels
        })
        .collect();

    let mut map = Array2::zeros((n_channels, nside_to_npix(nside)));
    for (ring, channels) in ring_list.iter().zip(ring_values) {
        for (c, values) in channels.into_iter().enumerate() {
            for (j, v) in values.into_iter().enumerate() {
                map[[c, ring.start + j]] = v;
            }
        }
    }
    Ok(map)
}

/// One quadrature pass of the adjoint transform.
fn analyze_once(
    map: ArrayView2<f64>,
    nside: u32,
    lmax: usize,
    polarized: bool,
) -> Vec<Alm> {
    let n_channels = map.nrows();
    let ring_list = rings(nside);
    let plans = fft_plans(&ring_list, false);
    let omega = 4.0 * PI / nside_to_npix(nside) as f64;

    let empty = || vec![Alm::zeros(lmax); n_channels];
    ring_list
        .par_iter()
        .fold(empty, |mut acc, ring| {
            let fft = &plans[&ring.n_pixels];
            let lambda = legendre_table(lmax, ring.z, ring.sin_theta);
            let range = ring.start..ring.start + ring.n_pixels;
            let gm: Vec<Vec<Complex64>> = map
                .axis_iter(Axis(0))
                .map(|row| {
                    let values: Vec<f64> = row.slice(ndarray::s![range.clone()]).to_vec();
                    analyze_ring(ring, &values, lmax, fft)
                })
                .collect();

            let spin0_channels = if polarized { 1 } else { n_channels };
            for (c, g) in gm.iter().enumerate().take(spin0_channels) {
                for m in 0..=lmax {
                    for l in m..=lmax {
                        let i = acc[c].index(l, m);
                        acc[c].data[i] += g[m] * (omega * lambda[i]);
                    }
                }
            }

            if polarized {
                let (f1, f2) = spin2_tables(lmax, ring.z, ring.sin_theta, &lambda);
                let i_unit = Complex64::new(0.0, 1.0);
                for m in 0..=lmax {
                    let (gq, gu) = (gm[1][m], gm[2][m]);
                    for l in m.max(2)..=lmax {
                        let i = acc[1].index(l, m);
                        acc[1].data[i] -= (gq * f1[i] + i_unit * gu * f2[i]) * omega;
                        acc[2].data[i] -= (gu * f1[i] - i_unit * gq * f2[i]) * omega;
                    }
                }
            }
            acc
        })
        .reduce(empty, |mut a, b| {
            for (x, y) in a.iter_mut().zip(&b) {
                x.add_assign(y);
            }
            a
        })
}

/// Estimates harmonic coefficients of a map by pixel quadrature.
///
/// `iterations` Jacobi refinement passes reduce the quadrature error by
/// re-analyzing the residual `map − alm_to_map(alm)`.
pub fn map_to_alm(
    map: ArrayView2<f64>,
    lmax: usize,
    polarized: bool,
    iterations: usize,
) -> Result<Vec<Alm>, PixelizationError> {
    let nside = npix_to_nside(map.ncols())?;
    if polarized && map.nrows() != 3 {
        return Err(PixelizationError::ChannelMismatch {
            expected: 3,
            found: map.nrows(),
        });
    }

    let mut alms = analyze_once(map, nside, lmax, polarized);
    for _ in 0..iterations {
        let model = alm_to_map(&alms, nside, lmax, 0.0, polarized)?;
        let residual = &map - &model;
        let correction = analyze_once(residual.view(), nside, lmax, polarized);
        for (a, c) in alms.iter_mut().zip(&correction) {
            a.add_assign(c);
        }
    }
    Ok(alms)
}
