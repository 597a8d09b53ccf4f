//! Rebuilds a [`SkyModel`] from a chain archive.
//!
//! Each argument a component variant declares is looked up first in the
//! archive's parameter group and then in the selected samples, where it may
//! be stored as harmonic coefficients (`<field>_alm`), as a plain value
//! (`<field>`) or as a pixel map (`<field>_map`). Sample values are averaged
//! before harmonic coefficients are transformed to pixels.

use std::collections::HashMap;

use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use skypix::{alm_to_map, is_valid_nside, npix_to_nside, ud_grade};

use super::alm::unpack_commander_alms;
use super::registry::{sky_model, ArgumentKind, ArgumentSpec, ComponentSpec, ResolvedArgument, Variant};
use super::samples::{mean_item, SampleSelection};
use super::{invalid, ChainArchive, ChainError, ChainVersion};
use crate::components::{Component, PointSourceCatalog, SpectralParameter};
use crate::config::EvaluationConfig;
use crate::model::{ModelError, SkyModel};
use crate::pixel_map::PixelMap;
use crate::units::{Frequency, FrequencyExt, Unit};

pub const DEFAULT_SKY_MODEL: &str = "BeyondPlanck";

/// Options for [`build_model_from_chain`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Components to load, all registered ones in the archive when `None`
    pub components: Option<Vec<String>>,
    pub samples: SampleSelection,
    /// First sample number used by [`SampleSelection::All`]
    pub burn_in: Option<usize>,
    pub model_name: String,
    /// Source positions for point-source components, by label
    pub catalogs: HashMap<String, PointSourceCatalog>,
    pub config: EvaluationConfig,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            components: None,
            samples: SampleSelection::default(),
            burn_in: None,
            model_name: DEFAULT_SKY_MODEL.to_string(),
            catalogs: HashMap::new(),
            config: EvaluationConfig::default(),
        }
    }
}

impl LoadOptions {
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = Some(components.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_samples(mut self, samples: SampleSelection) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = Some(burn_in);
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_catalog(mut self, label: impl Into<String>, catalog: PointSourceCatalog) -> Self {
        self.catalogs.insert(label.into(), catalog);
        self
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Builds a sky model from `chain` at resolution `nside`, or at each
/// component's native archive resolution when `None`.
///
/// Fails before reading any component if the archive lacks the parameter
/// group, and fails on the first missing component or field. No partial
/// model is ever returned.
pub fn build_model_from_chain<C: ChainArchive + ?Sized>(
    chain: &C,
    nside: Option<u32>,
    options: &LoadOptions,
) -> Result<SkyModel, ChainError> {
    if chain.version() == ChainVersion::Old {
        return Err(ChainError::Format);
    }
    let registered = sky_model(&options.model_name)?;
    if let Some(n) = nside {
        if !is_valid_nside(n) {
            return Err(ModelError::InvalidResolution(n).into());
        }
    }

    let available = chain.list_components()?;
    let labels: Vec<String> = match &options.components {
        Some(requested) => {
            for label in requested {
                if !available.contains(label) {
                    return Err(ChainError::ComponentNotFound(label.clone()));
                }
                registered.component(label)?;
            }
            requested.clone()
        }
        None => available
            .into_iter()
            .filter(|label| {
                let known = registered.component(label).is_ok();
                if !known {
                    info!("skipping component '{label}' not registered in {}", registered.name);
                }
                known
            })
            .collect(),
    };
    let samples = options.samples.resolve(chain, options.burn_in)?;
    info!(
        "building {} sky model with {:?} from {} sample(s)",
        registered.name,
        labels,
        samples.len()
    );

    let mut model = SkyModel::new(nside)?.with_config(options.config.clone());
    for label in &labels {
        let spec = registered.component(label)?;
        let component = load_component(chain, spec, &samples, nside, options)?;
        model.insert(component)?;
    }
    Ok(model)
}

fn load_component<C: ChainArchive + ?Sized>(
    chain: &C,
    spec: &ComponentSpec,
    samples: &[String],
    nside: Option<u32>,
    options: &LoadOptions,
) -> Result<Component, ChainError> {
    let label = spec.label;
    let nside = match nside {
        Some(n) => n,
        None => {
            let key = format!("{label}/nside");
            let native = chain.get_parameter(label, "nside")?.as_f64(&key)?;
            if native < 1.0 || native.fract() != 0.0 || !is_valid_nside(native as u32) {
                return Err(invalid(&key, format!("{native} is not a valid nside")));
            }
            native as u32
        }
    };
    let fwhm = match chain.get_parameter(label, "fwhm") {
        Ok(value) => (value.as_f64(&format!("{label}/fwhm"))? / 60.0).to_radians(),
        Err(ChainError::Key(_)) => 0.0,
        Err(e) => return Err(e),
    };

    let mut arguments = Vec::with_capacity(spec.arguments.len());
    for argument in spec.arguments {
        let data = resolve_argument(chain, label, argument, samples, nside, fwhm)?;
        let unit = if argument.name == "amp" {
            match chain.get_parameter(label, "unit") {
                Ok(value) => value.as_str(&format!("{label}/unit"))?.parse::<Unit>()?,
                Err(ChainError::Key(_)) => argument.unit,
                Err(e) => return Err(e),
            }
        } else {
            argument.unit
        };
        arguments.push(ResolvedArgument {
            spec: *argument,
            data,
            unit,
        });
    }
    for hook in spec.contexts {
        hook.apply(&mut arguments);
    }
    instantiate(spec, arguments, nside, options)
}

fn resolve_argument<C: ChainArchive + ?Sized>(
    chain: &C,
    label: &str,
    argument: &ArgumentSpec,
    samples: &[String],
    nside: u32,
    fwhm: f64,
) -> Result<Array2<f64>, ChainError> {
    match chain.get_parameter(label, argument.field) {
        Ok(value) => {
            debug!("{label}.{}: parameter group", argument.name);
            let values = value.as_values(&format!("{label}/{}", argument.field))?;
            return Ok(Array1::from(values).insert_axis(Axis(1)));
        }
        Err(ChainError::Key(_)) => {}
        Err(e) => return Err(e),
    }

    let alm_item = format!("{}_alm", argument.field);
    match mean_item(chain, samples, label, &alm_item) {
        Ok(packed) => {
            debug!("{label}.{}: harmonic coefficients", argument.name);
            let lmax_item = format!("{}_lmax", argument.field);
            let lmax = chain
                .get_sample_item(&samples[0], label, &lmax_item)?
                .iter()
                .next()
                .copied()
                .filter(|l| l.is_finite() && *l >= 0.0)
                .ok_or_else(|| invalid(&lmax_item, "expected a non-negative lmax"))?
                as usize;
            let polarized = argument.name == "amp" && packed.nrows() == 3;
            let alms = unpack_commander_alms(&packed, lmax)?;
            return Ok(alm_to_map(&alms, nside, lmax, fwhm, polarized)?);
        }
        Err(ChainError::Key(_)) => {}
        Err(e) => return Err(e),
    }

    for item in [argument.field.to_string(), format!("{}_map", argument.field)] {
        match mean_item(chain, samples, label, &item) {
            Ok(data) => {
                debug!("{label}.{}: sample item '{item}'", argument.name);
                return regrid(data, argument.kind, nside);
            }
            Err(ChainError::Key(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(ChainError::Key(format!("{label}/{}", argument.field)))
}

/// Brings pixel maps stored at another resolution onto `nside`.
fn regrid(data: Array2<f64>, kind: ArgumentKind, nside: u32) -> Result<Array2<f64>, ChainError> {
    if kind != ArgumentKind::PixelMap {
        return Ok(data);
    }
    match npix_to_nside(data.ncols()) {
        Ok(native) if native != nside => {
            debug!("up/down-grading map from nside {native} to {nside}");
            Ok(ud_grade(&data, nside)?)
        }
        _ => Ok(data),
    }
}

fn take(arguments: &mut Vec<ResolvedArgument>, name: &str) -> Result<ResolvedArgument, ChainError> {
    let index = arguments
        .iter()
        .position(|a| a.spec.name == name)
        .ok_or_else(|| ChainError::Key(name.to_string()))?;
    Ok(arguments.remove(index))
}

fn instantiate(
    spec: &ComponentSpec,
    mut arguments: Vec<ResolvedArgument>,
    nside: u32,
    options: &LoadOptions,
) -> Result<Component, ChainError> {
    let amp = take(&mut arguments, "amp")?;
    let amplitude = PixelMap::new(amp.data, amp.unit);

    let freq_ref = take(&mut arguments, "freq_ref")?;
    let freq_ref_ghz: Vec<f64> = freq_ref
        .data
        .iter()
        .map(|&hz| Frequency::from_hertz(hz).as_gigahertz())
        .collect();

    let mut parameter = |name: &str| -> Result<SpectralParameter, ChainError> {
        let argument = take(&mut arguments, name)?;
        Ok(SpectralParameter::new(argument.data, argument.unit))
    };

    let component = match spec.variant {
        Variant::Cmb => Component::cmb(amplitude, &freq_ref_ghz)?,
        Variant::Synchrotron => Component::synchrotron(amplitude, &freq_ref_ghz, parameter("beta")?)?,
        Variant::ThermalDust => {
            let beta = parameter("beta")?;
            let temperature = parameter("T")?;
            Component::thermal_dust(amplitude, &freq_ref_ghz, beta, temperature)?
        }
        Variant::FreeFree => Component::free_free(amplitude, &freq_ref_ghz, parameter("Te")?)?,
        Variant::Radio => {
            let catalog = options
                .catalogs
                .get(spec.label)
                .cloned()
                .ok_or_else(|| ChainError::MissingCatalog(spec.label.to_string()))?;
            let alpha = parameter("alpha")?;
            Component::radio(amplitude, &freq_ref_ghz, alpha, catalog, nside)?
        }
    };
    Ok(component.renamed(spec.label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MemoryChain, ParameterValue};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use skypix::nside_to_npix;

    fn synch_chain(nside: u32) -> MemoryChain {
        let npix = nside_to_npix(nside);
        MemoryChain::new()
            .with_parameter("synch", "nside", ParameterValue::Integer(nside as i64))
            .with_parameter("synch", "nu_ref", ParameterValue::Array(vec![30e9, 30e9, 30e9]))
            .with_parameter("synch", "unit", ParameterValue::Text("uK_RJ".into()))
            .with_sample_item(0, "synch", "amp_map", Array2::from_elem((3, npix), 5.0))
            .with_sample_item(0, "synch", "beta_map", Array2::from_elem((1, npix), -3.1))
    }

    #[test]
    fn test_lookup_order_and_contexts() {
        let chain = synch_chain(4);
        let model = build_model_from_chain(&chain, None, &LoadOptions::default()).unwrap();
        let synch = model.get("synch").unwrap();
        assert_eq!(synch.nside(), 4);
        assert_eq!(synch.amplitude().unit(), Unit::MicroKelvinRj);
        assert_relative_eq!(synch.freq_ref()[[0, 0]], 30.0, max_relative = 1e-12);
        assert_eq!(synch.spectral_parameters()["beta"].shape(), (1, 1));
    }

    #[test]
    fn test_maps_follow_requested_resolution() {
        let chain = synch_chain(4);
        let model = build_model_from_chain(&chain, Some(8), &LoadOptions::default()).unwrap();
        assert_eq!(model.nside(), Some(8));
        assert_eq!(model.get("synch").unwrap().amplitude().n_pixels(), 768);
    }

    #[test]
    fn test_missing_field_is_key_error() {
        let npix = nside_to_npix(4);
        let chain = MemoryChain::new()
            .with_parameter("synch", "nside", ParameterValue::Integer(4))
            .with_parameter("synch", "nu_ref", ParameterValue::Float(30e9))
            .with_sample_item(0, "synch", "amp_map", Array2::zeros((1, npix)));
        assert!(matches!(
            build_model_from_chain(&chain, None, &LoadOptions::default()),
            Err(ChainError::Key(key)) if key == "synch/beta"
        ));
    }

    #[test]
    fn test_unregistered_components_are_skipped_unless_requested() {
        let chain = synch_chain(4).with_parameter("ame", "nside", ParameterValue::Integer(4));
        let model = build_model_from_chain(&chain, None, &LoadOptions::default()).unwrap();
        assert_eq!(model.names(), vec!["synch"]);

        let options = LoadOptions::default().with_components(["ame"]);
        assert!(matches!(
            build_model_from_chain(&chain, None, &options),
            Err(ChainError::ComponentNotFound(name)) if name == "ame"
        ));
    }

    #[test]
    fn test_invalid_resolution() {
        let chain = synch_chain(4);
        assert!(matches!(
            build_model_from_chain(&chain, Some(5), &LoadOptions::default()),
            Err(ChainError::Model(ModelError::InvalidResolution(5)))
        ));
    }

    #[test]
    fn test_radio_requires_catalog() {
        let chain = MemoryChain::new()
            .with_parameter("radio", "nside", ParameterValue::Integer(4))
            .with_parameter("radio", "nu_ref", ParameterValue::Float(30e9))
            .with_sample_item(0, "radio", "amp", Array2::from_elem((3, 2), 10.0))
            .with_sample_item(0, "radio", "specind", Array2::from_elem((3, 2), -0.7));
        assert!(matches!(
            build_model_from_chain(&chain, None, &LoadOptions::default()),
            Err(ChainError::MissingCatalog(_))
        ));

        let options = LoadOptions::default()
            .with_catalog("radio", PointSourceCatalog::new(vec![(0.0, 0.0), (10.0, 10.0)]));
        let model = build_model_from_chain(&chain, None, &options).unwrap();
        let radio = model.get("radio").unwrap();
        assert_eq!(radio.amplitude().data().dim(), (1, 2));
        assert_eq!(radio.amplitude().unit(), Unit::MilliJansky);
        assert_eq!(radio.spectral_parameters()["alpha"].shape(), (1, 1));
    }
}
