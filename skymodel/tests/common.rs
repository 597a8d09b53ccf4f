//! Common utilities for skymodel integration tests

#![allow(dead_code)]

use ndarray::{Array2, ArrayView2};
use skymodel::chain::{ChainArchive, ChainError, ParameterValue};
use skymodel::MemoryChain;
use test_helpers::{npix, random_values, seeded_rng};

/// Harmonic band limit of the coefficients stored in fixture chains
pub const FIXTURE_LMAX: usize = 8;

/// Packed real coefficients `(channels, (lmax+1)²)` with a decaying spectrum.
pub fn packed_alms(seed: u64, channels: usize, lmax: usize) -> Array2<f64> {
    let mut rng = seeded_rng(seed);
    let mut packed = random_values(&mut rng, channels, (lmax + 1) * (lmax + 1), -1.0, 1.0);
    for mut row in packed.rows_mut() {
        for (i, v) in row.iter_mut().enumerate() {
            let l = (i as f64).sqrt().floor();
            *v *= 50.0 / (1.0 + l);
        }
    }
    packed
}

/// An archive with `cmb` stored as harmonic coefficients and `dust` stored
/// as pixel maps, both at native resolution `nside`, holding `n_samples`
/// samples.
pub fn cmb_dust_chain(nside: u32, n_samples: usize) -> MemoryChain {
    let n = npix(nside);
    let mut chain = MemoryChain::new()
        .with_parameter("cmb", "nside", ParameterValue::Integer(nside as i64))
        .with_parameter("cmb", "fwhm", ParameterValue::Float(0.0))
        .with_parameter("cmb", "unit", ParameterValue::Text("uK_cmb".into()))
        .with_parameter("cmb", "nu_ref", ParameterValue::Array(vec![100e9, 100e9, 100e9]))
        .with_parameter("dust", "nside", ParameterValue::Integer(nside as i64))
        .with_parameter("dust", "fwhm", ParameterValue::Float(10.0))
        .with_parameter("dust", "unit", ParameterValue::Text("uK_RJ".into()))
        .with_parameter("dust", "nu_ref", ParameterValue::Array(vec![545e9, 353e9, 353e9]));

    for s in 0..n_samples {
        let mut rng = seeded_rng(1000 + s as u64);
        chain.set_sample_item(s, "cmb", "amp_alm", packed_alms(s as u64, 1, FIXTURE_LMAX));
        chain.set_sample_item(s, "cmb", "amp_lmax", Array2::from_elem((1, 1), FIXTURE_LMAX as f64));
        chain.set_sample_item(s, "dust", "amp_map", random_values(&mut rng, 3, n, 1.0, 300.0));
        chain.set_sample_item(s, "dust", "beta_map", random_values(&mut rng, 1, n, 1.45, 1.65));
        chain.set_sample_item(s, "dust", "T_map", Array2::from_elem((1, n), 19.5));
    }
    chain
}

/// Archive that fails every component read with an error distinct from
/// [`ChainError::Format`].
pub struct PoisonedChain;

impl PoisonedChain {
    fn poison(what: &str) -> ChainError {
        ChainError::InvalidValue {
            key: what.to_string(),
            reason: "poisoned archive was read".into(),
        }
    }
}

impl ChainArchive for PoisonedChain {
    fn has_parameter_group(&self) -> bool {
        false
    }

    fn list_components(&self) -> Result<Vec<String>, ChainError> {
        Err(Self::poison("components"))
    }

    fn get_parameter(&self, component: &str, field: &str) -> Result<ParameterValue, ChainError> {
        Err(Self::poison(&format!("{component}/{field}")))
    }

    fn list_samples(&self) -> Result<Vec<String>, ChainError> {
        Err(Self::poison("samples"))
    }

    fn get_sample_item(
        &self,
        sample: &str,
        component: &str,
        item: &str,
    ) -> Result<Array2<f64>, ChainError> {
        Err(Self::poison(&format!("{sample}/{component}/{item}")))
    }
}

/// Largest absolute element-wise difference.
pub fn max_abs_diff(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
