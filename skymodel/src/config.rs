//! Numerical settings for emission evaluation.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tunable parameters shared by every component evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Grid nodes per spatially varying spectral parameter in bandpass tables
    pub interpolation_points: usize,
    /// Point-source kernel truncation radius in units of the beam FWHM
    pub n_fwhm: f64,
    /// Relative tolerance for matching a frequency to a spectral line
    pub line_tolerance: f64,
    /// Velocity width in km/s of the channel a single-frequency line
    /// evaluation stands for when converting to brightness
    pub line_channel_width: f64,
    /// Jacobi refinement passes used when smoothing in harmonic space
    pub smoothing_iterations: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            interpolation_points: 100,
            n_fwhm: 2.0,
            line_tolerance: 1e-6,
            line_channel_width: 1.0,
            smoothing_iterations: skypix::smoothing::DEFAULT_ITERATIONS,
        }
    }
}

impl EvaluationConfig {
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
