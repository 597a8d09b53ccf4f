//! Emission components.
//!
//! A [`Component`] pairs an amplitude map at a reference frequency with a
//! physical emission mechanism ([`ComponentKind`]) and evaluates it at a
//! single frequency or integrated over a bandpass.
//!
//! Diffuse and line components live on the pixel grid of their amplitude.
//! Point-source amplitudes run over catalog entries and are rasterized onto
//! an `nside` grid owned by the component.

pub mod line;
pub mod parameters;
pub mod point_source;

use std::fmt;

use log::debug;
use ndarray::{Array1, Array2, Axis, Zip};
use skypix::{ring::check_nside, smooth, ud_grade, PixelizationError};
use thiserror::Error;

use crate::bandpass::{integrate_sed, Bandpass, BandpassError};
use crate::config::EvaluationConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pixel_map::PixelMap;
use crate::sed::SedModel;
use crate::units::{
    conversion_factor, Dimension, Equivalency, Frequency, FrequencyExt, Unit, UnitError,
};

pub use line::{LineModel, SpectralLine};
pub use parameters::{SpectralParameter, SpectralParameters};
pub use point_source::{PointSourceCatalog, PointSourceError};

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Bandpass(#[from] BandpassError),

    #[error(transparent)]
    PointSource(#[from] PointSourceError),

    #[error(transparent)]
    Pixelization(#[from] PixelizationError),

    #[error("{component}: frequency must be positive and finite, got {freq_ghz} GHz")]
    InvalidFrequency { component: String, freq_ghz: f64 },

    #[error("{component}: emission is not finite")]
    NonFiniteEmission { component: String },

    #[error("{component}: {reason}")]
    InvalidShape { component: String, reason: String },

    #[error("{component}: missing spectral parameter '{parameter}'")]
    MissingParameter { component: String, parameter: String },

    #[error("no frequencies requested")]
    NoFrequencies,
}

/// Emission mechanism of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Diffuse(SedModel),
    PointSource {
        model: SedModel,
        catalog: PointSourceCatalog,
    },
    Line(LineModel),
}

impl ComponentKind {
    fn label(&self) -> &'static str {
        match self {
            ComponentKind::Diffuse(_) => "diffuse",
            ComponentKind::PointSource { .. } => "point sources",
            ComponentKind::Line(_) => "line",
        }
    }
}

/// Frequencies, bandpass, beam and output unit of an emission evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionRequest {
    pub freqs_ghz: Vec<f64>,
    /// Bandpass profile sampled at `freqs_ghz`
    pub weights: Option<Vec<f64>>,
    /// Gaussian beam FWHM in radians, 0 for no smoothing
    pub fwhm_rad: f64,
    pub output_unit: Unit,
}

impl EmissionRequest {
    /// Emission at a single frequency.
    pub fn at(freq_ghz: f64) -> Self {
        Self::over(vec![freq_ghz])
    }

    /// Emission at a single dimensioned frequency.
    pub fn at_frequency(freq: Frequency) -> Self {
        Self::at(freq.as_gigahertz())
    }

    /// Emission over several frequencies. Without weights the container
    /// evaluates each frequency separately, while a single component
    /// integrates over a top-hat band.
    pub fn over(freqs_ghz: Vec<f64>) -> Self {
        Self {
            freqs_ghz,
            weights: None,
            fwhm_rad: 0.0,
            output_unit: Unit::MicroKelvinRj,
        }
    }

    pub fn from_bandpass(bandpass: &Bandpass) -> Self {
        Self::over(bandpass.freqs().to_vec()).with_bandpass(bandpass.weights().to_vec())
    }

    pub fn with_bandpass(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_fwhm(mut self, fwhm_rad: f64) -> Self {
        self.fwhm_rad = fwhm_rad;
        self
    }

    pub fn with_fwhm_arcmin(self, fwhm_arcmin: f64) -> Self {
        self.with_fwhm((fwhm_arcmin / 60.0).to_radians())
    }

    pub fn with_output_unit(mut self, unit: Unit) -> Self {
        self.output_unit = unit;
        self
    }

    pub fn is_single_frequency(&self) -> bool {
        self.freqs_ghz.len() == 1
    }
}

/// How the spectral response is sampled.
enum Band {
    Delta(f64),
    Integrated(Bandpass),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    kind: ComponentKind,
    amplitude: PixelMap,
    freq_ref_ghz: Array2<f64>,
    spectral_parameters: SpectralParameters,
    nside: u32,
}

impl Component {
    /// A diffuse component on the pixel grid of `amplitude`.
    ///
    /// `freq_ref_ghz` holds one value, or one per polarization channel where
    /// a two-entry form `[I, Q]` is shared by Q and U.
    pub fn diffuse(
        name: impl Into<String>,
        model: SedModel,
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        spectral_parameters: SpectralParameters,
    ) -> Result<Self, ComponentError> {
        let name = name.into();
        let nside = amplitude.nside()?;
        Self::build(
            name,
            ComponentKind::Diffuse(model),
            amplitude,
            freq_ref_ghz,
            spectral_parameters,
            nside,
        )
    }

    /// Radio sources with amplitudes `(1, n_sources)` in flux density,
    /// rendered at `nside`.
    pub fn point_sources(
        name: impl Into<String>,
        model: SedModel,
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        spectral_parameters: SpectralParameters,
        catalog: PointSourceCatalog,
        nside: u32,
    ) -> Result<Self, ComponentError> {
        let name = name.into();
        check_nside(nside)?;
        if amplitude.is_polarized() {
            return Err(ComponentError::InvalidShape {
                component: name,
                reason: "point sources are unpolarized".into(),
            });
        }
        catalog.check_len(amplitude.n_pixels())?;
        Self::build(
            name,
            ComponentKind::PointSource { model, catalog },
            amplitude,
            freq_ref_ghz,
            spectral_parameters,
            nside,
        )
    }

    /// Line emission with amplitude in velocity-integrated intensity of the
    /// first transition.
    pub fn line(
        name: impl Into<String>,
        model: LineModel,
        amplitude: PixelMap,
    ) -> Result<Self, ComponentError> {
        let name = name.into();
        let nside = amplitude.nside()?;
        if amplitude.is_polarized() {
            return Err(ComponentError::InvalidShape {
                component: name,
                reason: "line emission is unpolarized".into(),
            });
        }
        let Some(freq_ref) = model.reference_frequency() else {
            return Err(ComponentError::InvalidShape {
                component: name,
                reason: "line model has no transitions".into(),
            });
        };
        Self::build(
            name,
            ComponentKind::Line(model),
            amplitude,
            &[freq_ref],
            SpectralParameters::new(),
            nside,
        )
    }

    /// CMB anisotropies with amplitude in CMB thermodynamic units.
    pub fn cmb(amplitude: PixelMap, freq_ref_ghz: &[f64]) -> Result<Self, ComponentError> {
        Self::diffuse(
            "cmb",
            SedModel::Cmb,
            amplitude,
            freq_ref_ghz,
            SpectralParameters::new(),
        )
    }

    pub fn synchrotron(
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        beta: SpectralParameter,
    ) -> Result<Self, ComponentError> {
        let params = SpectralParameters::from([("beta".to_string(), beta)]);
        Self::diffuse("synch", SedModel::PowerLaw, amplitude, freq_ref_ghz, params)
    }

    pub fn thermal_dust(
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        beta: SpectralParameter,
        temperature: SpectralParameter,
    ) -> Result<Self, ComponentError> {
        let params = SpectralParameters::from([
            ("beta".to_string(), beta),
            ("T".to_string(), temperature),
        ]);
        Self::diffuse(
            "dust",
            SedModel::ModifiedBlackBody,
            amplitude,
            freq_ref_ghz,
            params,
        )
    }

    pub fn free_free(
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        electron_temperature: SpectralParameter,
    ) -> Result<Self, ComponentError> {
        let params = SpectralParameters::from([("Te".to_string(), electron_temperature)]);
        Self::diffuse(
            "ff",
            SedModel::LinearOpticallyThin,
            amplitude,
            freq_ref_ghz,
            params,
        )
    }

    pub fn radio(
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        alpha: SpectralParameter,
        catalog: PointSourceCatalog,
        nside: u32,
    ) -> Result<Self, ComponentError> {
        let params = SpectralParameters::from([("alpha".to_string(), alpha)]);
        Self::point_sources(
            "radio",
            SedModel::RadioPowerLaw,
            amplitude,
            freq_ref_ghz,
            params,
            catalog,
            nside,
        )
    }

    /// The same component under another name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn build(
        name: String,
        kind: ComponentKind,
        amplitude: PixelMap,
        freq_ref_ghz: &[f64],
        spectral_parameters: SpectralParameters,
        nside: u32,
    ) -> Result<Self, ComponentError> {
        let channels = amplitude.n_channels();
        if channels != 1 && channels != 3 {
            return Err(ComponentError::InvalidShape {
                component: name,
                reason: format!("amplitude has {channels} channels, expected 1 or 3"),
            });
        }
        if amplitude.n_pixels() == 0 {
            return Err(ComponentError::InvalidShape {
                component: name,
                reason: "amplitude is empty".into(),
            });
        }
        if let Some(&bad) = freq_ref_ghz.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(ComponentError::InvalidFrequency {
                component: name,
                freq_ghz: bad,
            });
        }
        let freq_ref: Vec<f64> = match (channels, freq_ref_ghz) {
            (_, [f]) => vec![*f; channels],
            (3, [i, p]) => vec![*i, *p, *p],
            (3, [i, q, u]) => vec![*i, *q, *u],
            _ => {
                return Err(ComponentError::InvalidShape {
                    component: name,
                    reason: format!(
                        "{} reference frequencies for {channels} channels",
                        freq_ref_ghz.len()
                    ),
                })
            }
        };

        let required: &[&str] = match &kind {
            ComponentKind::Diffuse(model) | ComponentKind::PointSource { model, .. } => {
                model.parameter_names()
            }
            ComponentKind::Line(_) => &[],
        };
        for parameter in required {
            if !spectral_parameters.contains_key(*parameter) {
                return Err(ComponentError::MissingParameter {
                    component: name,
                    parameter: parameter.to_string(),
                });
            }
        }
        for (key, parameter) in &spectral_parameters {
            if !parameter.fits(channels, amplitude.n_pixels()) {
                let (rows, cols) = parameter.shape();
                return Err(ComponentError::InvalidShape {
                    component: name,
                    reason: format!(
                        "parameter '{key}' has shape ({rows}, {cols}), amplitude has ({channels}, {})",
                        amplitude.n_pixels()
                    ),
                });
            }
        }

        Ok(Self {
            name,
            kind,
            amplitude,
            freq_ref_ghz: Array1::from(freq_ref).insert_axis(Axis(1)),
            spectral_parameters,
            nside,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn amplitude(&self) -> &PixelMap {
        &self.amplitude
    }

    /// Reference frequencies in GHz with shape `(channels, 1)`.
    pub fn freq_ref(&self) -> &Array2<f64> {
        &self.freq_ref_ghz
    }

    /// Reference frequency of each channel.
    pub fn reference_frequencies(&self) -> Vec<Frequency> {
        self.freq_ref_ghz
            .iter()
            .map(|&ghz| Frequency::from_gigahertz(ghz))
            .collect()
    }

    pub fn spectral_parameters(&self) -> &SpectralParameters {
        &self.spectral_parameters
    }

    /// Resolution of the maps this component produces.
    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn is_polarized(&self) -> bool {
        self.amplitude.is_polarized()
    }

    pub fn sed_model(&self) -> Option<SedModel> {
        match &self.kind {
            ComponentKind::Diffuse(model) | ComponentKind::PointSource { model, .. } => {
                Some(*model)
            }
            ComponentKind::Line(_) => None,
        }
    }

    /// Unit of the unconverted emission: Rayleigh-Jeans brightness for
    /// diffuse and point-source components, line intensity for lines.
    pub fn native_unit(&self) -> Unit {
        match &self.kind {
            ComponentKind::Diffuse(_) => self.amplitude.unit().rayleigh_jeans_equivalent(),
            ComponentKind::PointSource { .. } => Unit::MicroKelvinRj,
            ComponentKind::Line(_) => self.amplitude.unit(),
        }
    }

    fn ordered_parameters(&self, model: SedModel) -> Result<Vec<&SpectralParameter>, ComponentError> {
        model
            .parameter_names()
            .iter()
            .map(|name| {
                self.spectral_parameters
                    .get(*name)
                    .ok_or_else(|| ComponentError::MissingParameter {
                        component: self.name.clone(),
                        parameter: name.to_string(),
                    })
            })
            .collect()
    }

    fn resolve_band(
        &self,
        request: &EmissionRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Band, ComponentError> {
        if request.freqs_ghz.is_empty() {
            return Err(ComponentError::NoFrequencies);
        }
        if let Some(&bad) = request
            .freqs_ghz
            .iter()
            .find(|f| !(f.is_finite() && **f > 0.0))
        {
            return Err(ComponentError::InvalidFrequency {
                component: self.name.clone(),
                freq_ghz: bad,
            });
        }
        let bandpass = match &request.weights {
            Some(weights) => Bandpass::new(request.freqs_ghz.clone(), weights.clone())?,
            None if request.is_single_frequency() => return Ok(Band::Delta(request.freqs_ghz[0])),
            None => {
                diagnostics.push(Diagnostic::TopHatBandpass {
                    component: self.name.clone(),
                    n_freqs: request.freqs_ghz.len(),
                });
                Bandpass::top_hat(request.freqs_ghz.clone())?
            }
        };
        if bandpass.is_delta() {
            Ok(Band::Delta(bandpass.freqs()[0]))
        } else {
            Ok(Band::Integrated(bandpass))
        }
    }

    /// Emission of this component for `request`, shape `(channels, npix)`
    /// in `request.output_unit`.
    pub fn evaluate(
        &self,
        request: &EmissionRequest,
        config: &EvaluationConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<PixelMap, ComponentError> {
        let band = self.resolve_band(request, diagnostics)?;
        let data = match &self.kind {
            ComponentKind::Diffuse(model) => {
                let data = self.diffuse_emission(*model, &band, request.output_unit, config)?;
                self.smoothed(data, request.fwhm_rad, config)?
            }
            ComponentKind::Line(model) => {
                let data = self.line_emission(model, &band, request.output_unit, config)?;
                self.smoothed(data, request.fwhm_rad, config)?
            }
            ComponentKind::PointSource { model, catalog } => self.point_source_emission(
                *model,
                catalog,
                &band,
                request,
                config,
                diagnostics,
            )?,
        };
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ComponentError::NonFiniteEmission {
                component: self.name.clone(),
            });
        }
        Ok(PixelMap::new(data, request.output_unit))
    }

    fn diffuse_emission(
        &self,
        model: SedModel,
        band: &Band,
        output_unit: Unit,
        config: &EvaluationConfig,
    ) -> Result<Array2<f64>, ComponentError> {
        let params = self.ordered_parameters(model)?;
        let native = self.native_unit();
        let amp = self.amplitude.data();
        match band {
            Band::Delta(freq) => {
                debug!("{}: delta emission at {freq} GHz", self.name);
                let scaling = self.delta_scaling(model, *freq, &params);
                let factor =
                    conversion_factor(native, output_unit, Equivalency::Spectral { freq_ghz: *freq })?;
                Ok(amp * &scaling * factor)
            }
            Band::Integrated(bandpass) => {
                debug!(
                    "{}: bandpass emission over {}..{} GHz",
                    self.name,
                    bandpass.freqs()[0],
                    bandpass.freqs()[bandpass.len() - 1]
                );
                let scaling = integrate_sed(
                    bandpass,
                    model,
                    &self.freq_ref_ghz,
                    &params,
                    self.amplitude.n_pixels(),
                    config.interpolation_points,
                )?;
                let factor = bandpass.coefficient(native, output_unit)?;
                Ok(amp * &scaling * factor)
            }
        }
    }

    /// Per-pixel SED scaling at one frequency with shape `(channels, npix)`.
    fn delta_scaling(&self, model: SedModel, freq: f64, params: &[&SpectralParameter]) -> Array2<f64> {
        let mut scaling = Array2::zeros(self.amplitude.data().dim());
        Zip::indexed(&mut scaling).par_for_each(|(c, p), s| {
            let mut values = [0.0; 2];
            for (slot, param) in values.iter_mut().zip(params) {
                *slot = param.get(c, p);
            }
            *s = model.scaling(freq, self.freq_ref_ghz[[c, 0]], &values[..params.len()]);
        });
        scaling
    }

    fn line_emission(
        &self,
        model: &LineModel,
        band: &Band,
        output_unit: Unit,
        config: &EvaluationConfig,
    ) -> Result<Array2<f64>, ComponentError> {
        let amp = self.amplitude.data();
        let line_unit = self.amplitude.unit();
        match band {
            Band::Delta(freq) => {
                let scaling = model.delta_scaling(*freq, config.line_tolerance);
                let equivalency = Equivalency::Spectral { freq_ghz: *freq };
                if output_unit.dimension() == Dimension::LineIntensity {
                    let factor = conversion_factor(line_unit, output_unit, equivalency)?;
                    return Ok(amp * (scaling * factor));
                }
                // Brightness averaged over a channel of `line_channel_width` km/s
                let brightness = line::brightness_unit(line_unit).ok_or(
                    UnitError::UnsupportedConversion {
                        from: line_unit,
                        to: output_unit,
                    },
                )?;
                let factor = conversion_factor(brightness, output_unit, equivalency)?;
                Ok(amp * (scaling / config.line_channel_width * factor))
            }
            Band::Integrated(bandpass) => {
                let brightness = line::brightness_unit(line_unit).ok_or(
                    UnitError::UnsupportedConversion {
                        from: line_unit,
                        to: output_unit,
                    },
                )?;
                let scaling = model.bandpass_scaling(bandpass);
                let factor = bandpass.coefficient(brightness, output_unit)?;
                Ok(amp * (scaling * factor))
            }
        }
    }

    fn point_source_emission(
        &self,
        model: SedModel,
        catalog: &PointSourceCatalog,
        band: &Band,
        request: &EmissionRequest,
        config: &EvaluationConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<Array2<f64>, ComponentError> {
        let params = self.ordered_parameters(model)?;
        let amp = self.amplitude.data();
        let scaling = match band {
            Band::Delta(freq) => self.delta_scaling(model, *freq, &params),
            Band::Integrated(bandpass) => integrate_sed(
                bandpass,
                model,
                &self.freq_ref_ghz,
                &params,
                self.amplitude.n_pixels(),
                config.interpolation_points,
            )?,
        };
        let scaled: Array1<f64> = (amp * &scaling).index_axis_move(Axis(0), 0);

        if request.fwhm_rad == 0.0 {
            diagnostics.push(Diagnostic::UnsmoothedPointSources {
                component: self.name.clone(),
            });
        }
        let raster = point_source::rasterize(
            scaled.view(),
            catalog,
            self.nside,
            request.fwhm_rad,
            config.n_fwhm,
        )?;

        let to_brightness = conversion_factor(
            self.amplitude.unit(),
            Unit::MicroKelvinRj,
            Equivalency::Beam {
                freq_ghz: self.freq_ref_ghz[[0, 0]],
                beam_area_sr: raster.beam_area_sr,
            },
        )?;
        let to_output = match band {
            Band::Delta(freq) => conversion_factor(
                Unit::MicroKelvinRj,
                request.output_unit,
                Equivalency::Beam {
                    freq_ghz: *freq,
                    beam_area_sr: raster.beam_area_sr,
                },
            )?,
            Band::Integrated(bandpass) => {
                bandpass.coefficient(Unit::MicroKelvinRj, request.output_unit)?
            }
        };
        Ok((raster.map * (to_brightness * to_output)).insert_axis(Axis(0)))
    }

    fn smoothed(
        &self,
        data: Array2<f64>,
        fwhm: f64,
        config: &EvaluationConfig,
    ) -> Result<Array2<f64>, ComponentError> {
        if fwhm == 0.0 {
            return Ok(data);
        }
        Ok(smooth(
            &data,
            fwhm,
            self.is_polarized(),
            config.smoothing_iterations,
        )?)
    }

    /// A copy re-pixelized to `nside`. Point sources only change their
    /// output grid.
    pub fn resample(&self, nside: u32) -> Result<Component, ComponentError> {
        check_nside(nside)?;
        if nside == self.nside {
            return Ok(self.clone());
        }
        let mut resampled = self.clone();
        resampled.nside = nside;
        if let ComponentKind::PointSource { .. } = self.kind {
            return Ok(resampled);
        }
        debug!("{}: resampling nside {} -> {nside}", self.name, self.nside);
        resampled.amplitude = PixelMap::new(
            ud_grade(self.amplitude.data(), nside)?,
            self.amplitude.unit(),
        );
        for parameter in resampled.spectral_parameters.values_mut() {
            *parameter = parameter.map_pixels(|values| ud_grade(values, nside))?;
        }
        Ok(resampled)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = match &self.kind {
            ComponentKind::Diffuse(model) | ComponentKind::PointSource { model, .. } => {
                model.to_string()
            }
            ComponentKind::Line(model) => model.to_string(),
        };
        let polarization = if self.is_polarized() { ", polarized" } else { "" };
        writeln!(
            f,
            "{}: {} ({}{polarization})",
            self.name,
            model,
            self.kind.label()
        )?;
        writeln!(
            f,
            "    amp: {}x{} [{}]",
            self.amplitude.n_channels(),
            self.amplitude.n_pixels(),
            self.amplitude.unit()
        )?;
        let freqs: Vec<String> = self.freq_ref_ghz.iter().map(|v| format!("{v}")).collect();
        write!(f, "    freq_ref: [{}] GHz", freqs.join(", "))?;
        for (name, parameter) in &self.spectral_parameters {
            write!(f, "\n    {name}: {parameter}")?;
        }
        Ok(())
    }
}
