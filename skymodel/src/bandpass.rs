//! Instrument bandpasses and bandpass-integrated SED scaling.
//!
//! A [`Bandpass`] stores a detector response sampled on strictly increasing
//! frequencies, normalized to unit trapezoidal integral in the
//! Rayleigh-Jeans convention. A single-sample bandpass is a delta response.
//!
//! # Integration strategy
//!
//! The scaling factor `∫ b(ν) f(ν; ν₀, θ) dν` depends on the spectral
//! parameters θ. Let `d` be the number of parameters that vary across
//! pixels:
//! - `d = 0`: one quadrature per polarization channel
//! - `d = 1`: a 1D table over the observed parameter range, linearly
//!   interpolated per pixel
//! - `d = 2`: a 2D table, bilinearly interpolated per pixel
//! - `d > 2`: unsupported

use log::debug;
use ndarray::{Array2, Zip};
use thiserror::Error;

use crate::algo::quadrature::{trapezoid, trapezoid_product};
use crate::algo::{BilinearInterpolator, InterpolationError, LinearInterpolator};
use crate::components::parameters::SpectralParameter;
use crate::sed::SedModel;
use crate::units::{cmb_to_rj, rj_to_intensity, Dimension, Frequency, FrequencyExt, Unit, UnitError};

#[derive(Debug, Error)]
pub enum BandpassError {
    #[error("bandpass has {freqs} frequencies but {weights} weights")]
    LengthMismatch { freqs: usize, weights: usize },

    #[error("bandpass has no samples")]
    Empty,

    #[error("bandpass frequencies must be strictly increasing and positive")]
    NotAscending,

    #[error("bandpass weights must be non-negative and finite")]
    NegativeWeight,

    #[error("bandpass integrates to zero")]
    ZeroIntegral,

    #[error(
        "bandpass integration supports at most two spatially varying spectral parameters, found {0}"
    )]
    UnsupportedParameterDimensionality(usize),

    #[error("interpolation table error: {0}")]
    Interpolation(#[from] InterpolationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bandpass {
    freqs_ghz: Vec<f64>,
    weights: Vec<f64>,
}

impl Bandpass {
    /// Validates and normalizes a Rayleigh-Jeans convention response.
    pub fn new(freqs_ghz: Vec<f64>, weights: Vec<f64>) -> Result<Self, BandpassError> {
        if freqs_ghz.len() != weights.len() {
            return Err(BandpassError::LengthMismatch {
                freqs: freqs_ghz.len(),
                weights: weights.len(),
            });
        }
        if freqs_ghz.is_empty() {
            return Err(BandpassError::Empty);
        }
        if freqs_ghz.iter().any(|f| !(f.is_finite() && *f > 0.0))
            || freqs_ghz.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(BandpassError::NotAscending);
        }
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(BandpassError::NegativeWeight);
        }

        let norm = if freqs_ghz.len() == 1 {
            weights[0]
        } else {
            trapezoid(&freqs_ghz, &weights)
        };
        if norm <= 0.0 {
            return Err(BandpassError::ZeroIntegral);
        }
        let weights = weights.into_iter().map(|w| w / norm).collect();
        Ok(Self { freqs_ghz, weights })
    }

    /// Uniform response over `freqs_ghz`.
    pub fn top_hat(freqs_ghz: Vec<f64>) -> Result<Self, BandpassError> {
        let weights = vec![1.0; freqs_ghz.len()];
        Self::new(freqs_ghz, weights)
    }

    /// Builds a response from dimensioned frequencies, in any scale.
    pub fn from_frequencies(
        freqs: &[Frequency],
        weights: Vec<f64>,
    ) -> Result<Self, BandpassError> {
        let freqs_ghz = freqs.iter().map(|f| f.as_gigahertz()).collect();
        Self::new(freqs_ghz, weights)
    }

    /// Converts a response defined for intensity (Jy/sr) into the
    /// Rayleigh-Jeans convention by weighting with `ν²`.
    pub fn from_intensity_response(
        freqs_ghz: Vec<f64>,
        response: Vec<f64>,
    ) -> Result<Self, BandpassError> {
        let weights = freqs_ghz
            .iter()
            .zip(&response)
            .map(|(f, r)| r * f * f)
            .collect();
        Self::new(freqs_ghz, weights)
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs_ghz
    }

    pub fn frequencies(&self) -> Vec<Frequency> {
        self.freqs_ghz
            .iter()
            .map(|&ghz| Frequency::from_gigahertz(ghz))
            .collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.freqs_ghz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs_ghz.is_empty()
    }

    pub fn is_delta(&self) -> bool {
        self.freqs_ghz.len() == 1
    }

    /// `∫ b(ν) y(ν) dν` for samples `y` taken at the bandpass frequencies.
    pub fn integrate(&self, values: &[f64]) -> f64 {
        if self.is_delta() {
            values[0]
        } else {
            trapezoid_product(&self.freqs_ghz, &self.weights, values)
        }
    }

    /// `∫ b(ν) f(ν) dν` for a function of frequency.
    pub fn integrate_fn<F: Fn(f64) -> f64>(&self, f: F) -> f64 {
        let values: Vec<f64> = self.freqs_ghz.iter().map(|&nu| f(nu)).collect();
        self.integrate(&values)
    }

    /// Normalized response at `freq_ghz`, linear between samples and zero outside.
    pub fn weight_at(&self, freq_ghz: f64) -> f64 {
        let n = self.freqs_ghz.len();
        if n == 1 || freq_ghz < self.freqs_ghz[0] || freq_ghz > self.freqs_ghz[n - 1] {
            return 0.0;
        }
        let i = self.freqs_ghz.partition_point(|&f| f <= freq_ghz).min(n - 1).max(1);
        let (f0, f1) = (self.freqs_ghz[i - 1], self.freqs_ghz[i]);
        let t = (freq_ghz - f0) / (f1 - f0);
        self.weights[i - 1] * (1.0 - t) + self.weights[i] * t
    }

    /// Band-averaged conversion from emission in `from` (a Rayleigh-Jeans
    /// brightness unit) to `to`.
    ///
    /// For a delta bandpass this equals the single-frequency conversion.
    pub fn coefficient(&self, from: Unit, to: Unit) -> Result<f64, UnitError> {
        if from.dimension() == to.dimension() {
            return Ok(from.scale() / to.scale());
        }
        if from.dimension() != Dimension::BrightnessRj {
            return Err(UnitError::UnsupportedConversion { from, to });
        }
        let per_kelvin = match to.dimension() {
            Dimension::BrightnessCmb => 1.0 / self.integrate_fn(cmb_to_rj),
            Dimension::Intensity => self.integrate_fn(rj_to_intensity),
            _ => return Err(UnitError::UnsupportedConversion { from, to }),
        };
        Ok(from.scale() * per_kelvin / to.scale())
    }
}

/// Tabulation nodes spanning `[lo, hi]`; a degenerate range gives one node.
fn grid_nodes(lo: f64, hi: f64, n_points: usize) -> Vec<f64> {
    if hi <= lo || n_points < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (n_points - 1) as f64;
    (0..n_points)
        .map(|i| if i + 1 == n_points { hi } else { lo + step * i as f64 })
        .collect()
}

/// Bandpass-integrated scaling factors for an SED model.
///
/// `freq_ref` has shape `(channels, 1)` and `params` follow
/// [`SedModel::parameter_names`]. Returns shape `(channels, 1)` when no
/// parameter varies across pixels and `(channels, n_pixels)` otherwise.
pub fn integrate_sed(
    bandpass: &Bandpass,
    model: SedModel,
    freq_ref: &Array2<f64>,
    params: &[&SpectralParameter],
    n_pixels: usize,
    grid_points: usize,
) -> Result<Array2<f64>, BandpassError> {
    let n_channels = freq_ref.nrows();
    let varying: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_spatially_varying())
        .map(|(i, _)| i)
        .collect();

    let integrate_at = |c: usize, values: &[f64]| -> f64 {
        let nu_ref = freq_ref[[c, 0]];
        bandpass.integrate_fn(|nu| model.scaling(nu, nu_ref, values))
    };
    let constants = |c: usize| -> Vec<f64> { params.iter().map(|p| p.get(c, 0)).collect() };

    match varying.len() {
        0 => Ok(Array2::from_shape_fn((n_channels, 1), |(c, _)| {
            integrate_at(c, &constants(c))
        })),
        1 => {
            let k = varying[0];
            debug!(
                "bandpass integration: 1D table over '{}' with up to {grid_points} nodes",
                model.parameter_names()[k]
            );
            let mut tables = Vec::with_capacity(n_channels);
            for c in 0..n_channels {
                let (lo, hi) = params[k].range(c);
                let nodes = grid_nodes(lo, hi, grid_points);
                let mut values = constants(c);
                let table: Vec<f64> = nodes
                    .iter()
                    .map(|&x| {
                        values[k] = x;
                        integrate_at(c, &values)
                    })
                    .collect();
                tables.push(LinearInterpolator::new(nodes, table)?);
            }
            let mut out = Array2::zeros((n_channels, n_pixels));
            Zip::indexed(&mut out).par_for_each(|(c, p), v| {
                *v = tables[c].interpolate(params[k].get(c, p));
            });
            Ok(out)
        }
        2 => {
            let (kx, ky) = (varying[0], varying[1]);
            debug!(
                "bandpass integration: 2D table over '{}' and '{}'",
                model.parameter_names()[kx],
                model.parameter_names()[ky]
            );
            let mut tables = Vec::with_capacity(n_channels);
            for c in 0..n_channels {
                let (x_lo, x_hi) = params[kx].range(c);
                let (y_lo, y_hi) = params[ky].range(c);
                let x_nodes = grid_nodes(x_lo, x_hi, grid_points);
                let y_nodes = grid_nodes(y_lo, y_hi, grid_points);
                let base = constants(c);
                let data = Array2::from_shape_fn((y_nodes.len(), x_nodes.len()), |(iy, ix)| {
                    let mut values = base.clone();
                    values[kx] = x_nodes[ix];
                    values[ky] = y_nodes[iy];
                    integrate_at(c, &values)
                });
                tables.push(BilinearInterpolator::new(x_nodes, y_nodes, data)?);
            }
            let mut out = Array2::zeros((n_channels, n_pixels));
            Zip::indexed(&mut out).par_for_each(|(c, p), v| {
                *v = tables[c].interpolate(params[kx].get(c, p), params[ky].get(c, p));
            });
            Ok(out)
        }
        d => Err(BandpassError::UnsupportedParameterDimensionality(d)),
    }
}
