//! Spectral line emission.
//!
//! A line component's amplitude is a velocity-integrated intensity (K km/s)
//! in the first listed transition. Other transitions scale it by fixed
//! ratios. At a single frequency a line is only visible when the frequency
//! matches a transition. Requested in line-intensity units it is returned as
//! is; in any brightness unit it is averaged over a channel of configured
//! velocity width `Δv`, giving `r/Δv` kelvin per K km/s. Integrated over a
//! bandpass, each transition contributes `r·b(νᵢ)·νᵢ/c` kelvin of
//! Rayleigh-Jeans brightness per K km/s.

use std::fmt;

use crate::bandpass::Bandpass;
use crate::units::{Unit, SI};

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralLine {
    pub label: String,
    pub freq_ghz: f64,
    /// Intensity relative to the reference transition
    pub ratio: f64,
}

impl SpectralLine {
    pub fn new(label: impl Into<String>, freq_ghz: f64, ratio: f64) -> Self {
        Self {
            label: label.into(),
            freq_ghz,
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineModel {
    lines: Vec<SpectralLine>,
}

impl LineModel {
    pub fn new(lines: Vec<SpectralLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[SpectralLine] {
        &self.lines
    }

    /// Rest frequency of the reference transition.
    pub fn reference_frequency(&self) -> Option<f64> {
        self.lines.first().map(|line| line.freq_ghz)
    }

    /// Sum of the ratios of transitions within `tolerance · νᵢ` of `freq_ghz`.
    pub fn delta_scaling(&self, freq_ghz: f64, tolerance: f64) -> f64 {
        self.lines
            .iter()
            .filter(|line| (freq_ghz - line.freq_ghz).abs() <= tolerance * line.freq_ghz)
            .map(|line| line.ratio)
            .sum()
    }

    /// Rayleigh-Jeans brightness seen through `bandpass` per unit
    /// velocity-integrated intensity, in K per K km/s.
    pub fn bandpass_scaling(&self, bandpass: &Bandpass) -> f64 {
        self.lines
            .iter()
            .map(|line| {
                let weight = if bandpass.is_delta() {
                    0.0
                } else {
                    bandpass.weight_at(line.freq_ghz)
                };
                line.ratio * weight * line.freq_ghz / SI::SPEED_OF_LIGHT_KM_S
            })
            .sum()
    }
}

impl fmt::Display for LineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self
            .lines
            .iter()
            .map(|line| format!("{} ({} GHz, x{})", line.label, line.freq_ghz, line.ratio))
            .collect();
        write!(f, "Line[{}]", labels.join(", "))
    }
}

/// Brightness temperature unit matching the scale of a line-intensity unit.
pub fn brightness_unit(line_unit: Unit) -> Option<Unit> {
    match line_unit {
        Unit::KelvinKmPerSecond => Some(Unit::KelvinRj),
        Unit::MicroKelvinKmPerSecond => Some(Unit::MicroKelvinRj),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn co_ladder() -> LineModel {
        LineModel::new(vec![
            SpectralLine::new("CO(1-0)", 115.271, 1.0),
            SpectralLine::new("CO(2-1)", 230.538, 0.6),
            SpectralLine::new("CO(3-2)", 345.796, 0.3),
        ])
    }

    #[test]
    fn test_delta_matches_transitions_only() {
        let model = co_ladder();
        assert_eq!(model.reference_frequency(), Some(115.271));
        assert_eq!(model.delta_scaling(115.271, 1e-6), 1.0);
        assert_eq!(model.delta_scaling(230.538, 1e-6), 0.6);
        assert_eq!(model.delta_scaling(100.0, 1e-6), 0.0);
        assert_eq!(model.delta_scaling(115.3, 1e-6), 0.0);
        assert_eq!(model.delta_scaling(115.3, 1e-3), 1.0);
    }

    #[test]
    fn test_bandpass_scaling() {
        let model = co_ladder();
        let freqs: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 2.0).collect();
        let bp = Bandpass::top_hat(freqs).unwrap();
        let expected = 115.271 / 40.0 / SI::SPEED_OF_LIGHT_KM_S;
        assert_relative_eq!(model.bandpass_scaling(&bp), expected, max_relative = 1e-12);

        let out_of_band = Bandpass::top_hat(vec![30.0, 40.0, 50.0]).unwrap();
        assert_eq!(model.bandpass_scaling(&out_of_band), 0.0);
    }

    #[test]
    fn test_brightness_unit() {
        assert_eq!(
            brightness_unit(Unit::MicroKelvinKmPerSecond),
            Some(Unit::MicroKelvinRj)
        );
        assert_eq!(brightness_unit(Unit::MicroKelvinRj), None);
    }
}
