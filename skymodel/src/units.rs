//! Physical units and pure conversion functions.
//!
//! Every map and parameter carries an explicit [`Unit`] tag. Conversions
//! between dimensions that depend on observing frequency (brightness
//! temperature, intensity, flux density) take an [`Equivalency`] that
//! supplies the frequency and, for flux densities, the beam solid angle.
//!
//! # Conventions
//!
//! - Rayleigh-Jeans brightness: `I_ν = 2 k ν² T_RJ / c²`
//! - CMB thermodynamic brightness: `T_RJ = g(x) · T_CMB`, with
//!   `g(x) = x² eˣ / (eˣ − 1)²` and `x = hν / (k T₀)`
//! - Flux density in a beam of solid angle Ω: `S_ν = I_ν · Ω`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uom::si::frequency::{gigahertz, hertz};

/// Observing and reference frequencies
pub type Frequency = uom::si::f64::Frequency;

/// Extension trait for the frequency scales used by archives and instruments
pub trait FrequencyExt {
    fn from_hertz(hz: f64) -> Self;

    fn as_hertz(&self) -> f64;

    fn from_gigahertz(ghz: f64) -> Self;

    /// Frequency in GHz, the scale every SED and conversion in this crate takes
    fn as_gigahertz(&self) -> f64;
}

impl FrequencyExt for Frequency {
    fn from_hertz(hz: f64) -> Self {
        Frequency::new::<hertz>(hz)
    }

    fn as_hertz(&self) -> f64 {
        self.get::<hertz>()
    }

    fn from_gigahertz(ghz: f64) -> Self {
        Frequency::new::<gigahertz>(ghz)
    }

    fn as_gigahertz(&self) -> f64 {
        self.get::<gigahertz>()
    }
}

/// Physical constants in SI units.
pub struct SI {}

impl SI {
    /// Planck's constant, J s
    pub const PLANCK_CONSTANT: f64 = 6.62607015e-34;

    /// Boltzmann's constant, J/K
    pub const BOLTZMANN_CONSTANT: f64 = 1.380649e-23;

    /// Speed of light in vacuum, m/s
    pub const SPEED_OF_LIGHT: f64 = 2.99792458e8;

    /// Speed of light in vacuum, km/s
    pub const SPEED_OF_LIGHT_KM_S: f64 = 2.99792458e5;

    /// CMB monopole temperature, K
    pub const T_CMB: f64 = 2.7255;

    /// 1 Jansky in W m⁻² Hz⁻¹
    pub const JANSKY: f64 = 1e-26;

    /// Hz per GHz
    pub const GHZ: f64 = 1e9;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("unsupported unit conversion from {from} to {to}")]
    UnsupportedConversion { from: Unit, to: Unit },

    #[error("unrecognized unit '{0}'")]
    UnknownUnit(String),

    #[error("conversion frequency must be positive and finite, got {0} GHz")]
    InvalidFrequency(f64),
}

/// Physical dimension of a unit. Units of the same dimension differ only
/// by a constant scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    BrightnessRj,
    BrightnessCmb,
    Intensity,
    FluxDensity,
    LineIntensity,
    Temperature,
    Dimensionless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    KelvinRj,
    MilliKelvinRj,
    MicroKelvinRj,
    KelvinCmb,
    MilliKelvinCmb,
    MicroKelvinCmb,
    JanskyPerSteradian,
    MegaJanskyPerSteradian,
    MilliJanskyPerSteradian,
    Jansky,
    MilliJansky,
    KelvinKmPerSecond,
    MicroKelvinKmPerSecond,
    Kelvin,
    Dimensionless,
}

impl Unit {
    pub fn dimension(&self) -> Dimension {
        use Unit::*;
        match self {
            KelvinRj | MilliKelvinRj | MicroKelvinRj => Dimension::BrightnessRj,
            KelvinCmb | MilliKelvinCmb | MicroKelvinCmb => Dimension::BrightnessCmb,
            JanskyPerSteradian | MegaJanskyPerSteradian | MilliJanskyPerSteradian => {
                Dimension::Intensity
            }
            Jansky | MilliJansky => Dimension::FluxDensity,
            KelvinKmPerSecond | MicroKelvinKmPerSecond => Dimension::LineIntensity,
            Kelvin => Dimension::Temperature,
            Dimensionless => Dimension::Dimensionless,
        }
    }

    /// Size of the unit relative to the base unit of its dimension
    /// (K, Jy/sr, Jy, K km/s, K, 1).
    pub fn scale(&self) -> f64 {
        use Unit::*;
        match self {
            KelvinRj | KelvinCmb | KelvinKmPerSecond | Kelvin => 1.0,
            MilliKelvinRj | MilliKelvinCmb => 1e-3,
            MicroKelvinRj | MicroKelvinCmb | MicroKelvinKmPerSecond => 1e-6,
            JanskyPerSteradian | Jansky | Dimensionless => 1.0,
            MegaJanskyPerSteradian => 1e6,
            MilliJanskyPerSteradian | MilliJansky => 1e-3,
        }
    }

    /// Whether the unit measures sky signal and can be an emission output unit.
    pub fn is_signal(&self) -> bool {
        matches!(
            self.dimension(),
            Dimension::BrightnessRj
                | Dimension::BrightnessCmb
                | Dimension::Intensity
                | Dimension::FluxDensity
        )
    }

    /// Rayleigh-Jeans unit of the same scale as a CMB unit; other units map to themselves.
    pub fn rayleigh_jeans_equivalent(&self) -> Unit {
        match self {
            Unit::KelvinCmb => Unit::KelvinRj,
            Unit::MilliKelvinCmb => Unit::MilliKelvinRj,
            Unit::MicroKelvinCmb => Unit::MicroKelvinRj,
            other => *other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        use Unit::*;
        match self {
            KelvinRj => "K_RJ",
            MilliKelvinRj => "mK_RJ",
            MicroKelvinRj => "uK_RJ",
            KelvinCmb => "K_CMB",
            MilliKelvinCmb => "mK_CMB",
            MicroKelvinCmb => "uK_CMB",
            JanskyPerSteradian => "Jy/sr",
            MegaJanskyPerSteradian => "MJy/sr",
            MilliJanskyPerSteradian => "mJy/sr",
            Jansky => "Jy",
            MilliJansky => "mJy",
            KelvinKmPerSecond => "K km/s",
            MicroKelvinKmPerSecond => "uK km/s",
            Kelvin => "K",
            Dimensionless => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Unit::Dimensionless {
            write!(f, "dimensionless")
        } else {
            write!(f, "{}", self.symbol())
        }
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    /// Parses the unit strings found in chain archives. Bare `uK`/`mK` mean
    /// Rayleigh-Jeans brightness; `K` alone is a physical temperature.
    /// Jansky prefixes are case-sensitive (`MJy` is mega, `mJy` milli).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .replace('µ', "u")
            .replace("μ", "u");
        let jansky = match normalized.as_str() {
            "Jy/sr" | "jy/sr" => Some(Unit::JanskyPerSteradian),
            "MJy/sr" => Some(Unit::MegaJanskyPerSteradian),
            "mJy/sr" => Some(Unit::MilliJanskyPerSteradian),
            "Jy" | "jy" => Some(Unit::Jansky),
            "mJy" => Some(Unit::MilliJansky),
            _ => None,
        };
        if let Some(unit) = jansky {
            return Ok(unit);
        }
        let unit = match normalized.to_ascii_lowercase().as_str() {
            "k_rj" | "krj" => Unit::KelvinRj,
            "mk_rj" | "mkrj" | "mk" => Unit::MilliKelvinRj,
            "uk_rj" | "ukrj" | "uk" => Unit::MicroKelvinRj,
            "k_cmb" | "kcmb" => Unit::KelvinCmb,
            "mk_cmb" | "mkcmb" => Unit::MilliKelvinCmb,
            "uk_cmb" | "ukcmb" => Unit::MicroKelvinCmb,
            "kkm/s" => Unit::KelvinKmPerSecond,
            "ukkm/s" => Unit::MicroKelvinKmPerSecond,
            "k" => Unit::Kelvin,
            "" | "dimensionless" => Unit::Dimensionless,
            _ => return Err(UnitError::UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.symbol().to_string()
    }
}

/// Physical context needed to relate different signal dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Equivalency {
    /// Only same-dimension scalings are allowed
    None,
    /// Brightness temperature and intensity at a given frequency
    Spectral { freq_ghz: f64 },
    /// As `Spectral`, additionally relating flux density through a beam solid angle
    Beam { freq_ghz: f64, beam_area_sr: f64 },
}

impl Equivalency {
    fn freq_ghz(&self) -> Option<f64> {
        match self {
            Equivalency::None => None,
            Equivalency::Spectral { freq_ghz } | Equivalency::Beam { freq_ghz, .. } => {
                Some(*freq_ghz)
            }
        }
    }
}

/// Dimensionless `x = hν / (k T₀)` at a frequency in GHz.
pub fn cmb_x(freq_ghz: f64) -> f64 {
    SI::PLANCK_CONSTANT * freq_ghz * SI::GHZ / (SI::BOLTZMANN_CONSTANT * SI::T_CMB)
}

/// Factor `g(ν)` taking a CMB thermodynamic temperature to Rayleigh-Jeans brightness.
pub fn cmb_to_rj(freq_ghz: f64) -> f64 {
    let x = cmb_x(freq_ghz);
    let em1 = x.exp_m1();
    x * x * x.exp() / (em1 * em1)
}

/// Jy/sr per K_RJ at a frequency in GHz.
pub fn rj_to_intensity(freq_ghz: f64) -> f64 {
    let nu = freq_ghz * SI::GHZ;
    2.0 * SI::BOLTZMANN_CONSTANT * nu * nu / (SI::SPEED_OF_LIGHT * SI::SPEED_OF_LIGHT) / SI::JANSKY
}

/// Base units of `dimension` per K_RJ. `from`/`to` only label the error.
fn per_kelvin_rj(
    dimension: Dimension,
    equivalency: Equivalency,
    from: Unit,
    to: Unit,
) -> Result<f64, UnitError> {
    let unsupported = UnitError::UnsupportedConversion { from, to };
    let freq_ghz = || -> Result<f64, UnitError> {
        let freq = equivalency.freq_ghz().ok_or(unsupported.clone())?;
        if !(freq.is_finite() && freq > 0.0) {
            return Err(UnitError::InvalidFrequency(freq));
        }
        Ok(freq)
    };
    match dimension {
        Dimension::BrightnessRj => Ok(1.0),
        Dimension::BrightnessCmb => Ok(1.0 / cmb_to_rj(freq_ghz()?)),
        Dimension::Intensity => Ok(rj_to_intensity(freq_ghz()?)),
        Dimension::FluxDensity => match equivalency {
            Equivalency::Beam { beam_area_sr, .. } if beam_area_sr > 0.0 => {
                Ok(rj_to_intensity(freq_ghz()?) * beam_area_sr)
            }
            _ => Err(unsupported),
        },
        _ => Err(unsupported),
    }
}

/// Multiplicative factor converting values in `from` to values in `to`.
pub fn conversion_factor(from: Unit, to: Unit, equivalency: Equivalency) -> Result<f64, UnitError> {
    if from.dimension() == to.dimension() {
        return Ok(from.scale() / to.scale());
    }
    if !(from.is_signal() && to.is_signal()) {
        return Err(UnitError::UnsupportedConversion { from, to });
    }
    let from_per_k = per_kelvin_rj(from.dimension(), equivalency, from, to)?;
    let to_per_k = per_kelvin_rj(to.dimension(), equivalency, from, to)?;
    Ok(from.scale() / from_per_k * to_per_k / to.scale())
}
