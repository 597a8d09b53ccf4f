//! Spectral energy distributions of the physical emission mechanisms.
//!
//! Each model returns a dimensionless scaling `f(ν; ν₀, θ)` that takes an
//! amplitude at the reference frequency `ν₀` to the emission at `ν`, in
//! Rayleigh-Jeans brightness units. Every model satisfies `f(ν₀; ν₀, θ) = 1`
//! except [`SedModel::Cmb`], whose amplitude is a thermodynamic temperature;
//! there `f(ν) = g(ν)` and the unit reconciliation `K_CMB → K_RJ` at `ν`
//! recovers the amplitude.
//!
//! # Models
//!
//! | model                 | parameters  | scaling                                                 |
//! |-----------------------|-------------|---------------------------------------------------------|
//! | `Cmb`                 | –           | `g(ν)`                                                  |
//! | `PowerLaw`            | `beta`      | `(ν/ν₀)^β`                                              |
//! | `ModifiedBlackBody`   | `beta`, `T` | `(ν/ν₀)^(β+1) · (e^{hν₀/kT} − 1)/(e^{hν/kT} − 1)`        |
//! | `LinearOpticallyThin` | `Te`        | `(ν₀/ν)² · g_ff(ν, Tₑ)/g_ff(ν₀, Tₑ)`                     |
//! | `RadioPowerLaw`       | `alpha`     | `(ν/ν₀)^(α−2)`                                          |

use std::f64::consts::{E, PI};
use std::fmt;

use crate::units::{cmb_to_rj, SI};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SedModel {
    /// CMB blackbody anisotropies
    Cmb,
    /// Synchrotron power law
    PowerLaw,
    /// Thermal dust modified blackbody
    ModifiedBlackBody,
    /// Free-free emission in the optically thin limit
    LinearOpticallyThin,
    /// Radio point sources, power law in flux density
    RadioPowerLaw,
}

impl SedModel {
    /// Ordered names of the spectral parameters the model consumes.
    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            SedModel::Cmb => &[],
            SedModel::PowerLaw => &["beta"],
            SedModel::ModifiedBlackBody => &["beta", "T"],
            SedModel::LinearOpticallyThin => &["Te"],
            SedModel::RadioPowerLaw => &["alpha"],
        }
    }

    /// Dimensionless scaling at `freq_ghz` for parameter values ordered as
    /// [`parameter_names`](Self::parameter_names).
    ///
    /// Non-finite results are possible for unphysical inputs and must be
    /// checked by the caller.
    pub fn scaling(&self, freq_ghz: f64, freq_ref_ghz: f64, params: &[f64]) -> f64 {
        let ratio = freq_ghz / freq_ref_ghz;
        match self {
            SedModel::Cmb => cmb_to_rj(freq_ghz),
            SedModel::PowerLaw => ratio.powf(params[0]),
            SedModel::ModifiedBlackBody => {
                let (beta, temperature) = (params[0], params[1]);
                let x = planck_x(freq_ghz, temperature);
                let x_ref = planck_x(freq_ref_ghz, temperature);
                ratio.powf(beta + 1.0) * x_ref.exp_m1() / x.exp_m1()
            }
            SedModel::LinearOpticallyThin => {
                let te = params[0];
                let gaunt = gaunt_factor(freq_ghz, te);
                let gaunt_ref = gaunt_factor(freq_ref_ghz, te);
                (gaunt / gaunt_ref) / (ratio * ratio)
            }
            SedModel::RadioPowerLaw => ratio.powf(params[0] - 2.0),
        }
    }
}

impl fmt::Display for SedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SedModel::Cmb => "BlackBodyCMB",
            SedModel::PowerLaw => "PowerLaw",
            SedModel::ModifiedBlackBody => "ModifiedBlackBody",
            SedModel::LinearOpticallyThin => "LinearOpticallyThin",
            SedModel::RadioPowerLaw => "AGNPowerLaw",
        };
        write!(f, "{name}")
    }
}

/// `hν / kT` for a frequency in GHz and temperature in K.
fn planck_x(freq_ghz: f64, temperature: f64) -> f64 {
    SI::PLANCK_CONSTANT * freq_ghz * SI::GHZ / (SI::BOLTZMANN_CONSTANT * temperature)
}

/// Free-free Gaunt factor approximation (Draine 2011, eq. 10.9).
pub fn gaunt_factor(freq_ghz: f64, electron_temperature: f64) -> f64 {
    let t4 = electron_temperature / 1e4;
    let arg = 5.960 - 3f64.sqrt() / PI * (freq_ghz * t4.powf(-1.5)).ln();
    (arg.exp() + E).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [SedModel; 4] = [
        SedModel::PowerLaw,
        SedModel::ModifiedBlackBody,
        SedModel::LinearOpticallyThin,
        SedModel::RadioPowerLaw,
    ];

    fn typical_params(model: SedModel) -> Vec<f64> {
        match model {
            SedModel::Cmb => vec![],
            SedModel::PowerLaw => vec![-3.1],
            SedModel::ModifiedBlackBody => vec![1.56, 19.5],
            SedModel::LinearOpticallyThin => vec![7000.0],
            SedModel::RadioPowerLaw => vec![-0.7],
        }
    }

    #[test]
    fn test_unity_at_reference_frequency() {
        for model in ALL {
            for freq_ref in [0.408, 30.0, 545.0] {
                let s = model.scaling(freq_ref, freq_ref, &typical_params(model));
                assert_relative_eq!(s, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_parameter_names_match_arity() {
        for model in ALL {
            assert_eq!(model.parameter_names().len(), typical_params(model).len());
        }
        assert!(SedModel::Cmb.parameter_names().is_empty());
    }

    #[test]
    fn test_power_law() {
        let s = SedModel::PowerLaw.scaling(60.0, 30.0, &[-3.0]);
        assert_relative_eq!(s, 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_radio_power_law_in_brightness_temperature() {
        // Flux density index 0 becomes ν^-2 in brightness temperature
        let s = SedModel::RadioPowerLaw.scaling(60.0, 30.0, &[0.0]);
        assert_relative_eq!(s, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_modified_blackbody_rayleigh_jeans_limit() {
        // For hν << kT the blackbody term cancels and the law is (ν/ν₀)^β
        let s = SedModel::ModifiedBlackBody.scaling(2.0, 1.0, &[1.5, 1e5]);
        assert_relative_eq!(s, 2f64.powf(1.5), max_relative = 1e-4);
    }

    #[test]
    fn test_modified_blackbody_peaks_and_falls() {
        let params = [1.5, 20.0];
        let at_545 = SedModel::ModifiedBlackBody.scaling(545.0, 545.0, &params);
        let at_3000 = SedModel::ModifiedBlackBody.scaling(3000.0, 545.0, &params);
        let at_30000 = SedModel::ModifiedBlackBody.scaling(30000.0, 545.0, &params);
        assert_relative_eq!(at_545, 1.0, epsilon = 1e-12);
        assert!(at_30000 < at_3000);
        assert!(at_30000.is_finite());
    }

    #[test]
    fn test_free_free_is_nearly_nu_minus_two() {
        let s = SedModel::LinearOpticallyThin.scaling(80.0, 40.0, &[7000.0]);
        // Gaunt factor decreases slowly, steepening the law slightly beyond -2
        assert!(s < 0.25);
        assert!(s > 0.2);
    }

    #[test]
    fn test_gaunt_factor_value() {
        // ln(exp(5.960 - √3/π ln(30 · 0.7^-1.5)) + e) at 30 GHz, 7000 K
        let expected = ((5.960 - 3f64.sqrt() / PI * (30.0 * 0.7f64.powf(-1.5)).ln()).exp() + E).ln();
        assert_relative_eq!(gaunt_factor(30.0, 7000.0), expected, epsilon = 1e-12);
        assert!(gaunt_factor(30.0, 7000.0) > 3.0);
    }

    #[test]
    fn test_cmb_scaling_is_rj_factor() {
        assert_relative_eq!(SedModel::Cmb.scaling(100.0, 1.0, &[]), cmb_to_rj(100.0));
    }
}
