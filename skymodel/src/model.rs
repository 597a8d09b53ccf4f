//! The sky model container.

use std::fmt;

use log::{debug, info};
use ndarray::{s, Array2};
use skypix::{is_valid_nside, nside_to_npix};
use thiserror::Error;

use crate::components::{Component, ComponentError, EmissionRequest};
use crate::config::EvaluationConfig;
use crate::diagnostics::Diagnostics;
use crate::pixel_map::PixelMap;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("component '{0}' is already part of the model")]
    DuplicateComponent(String),

    #[error("component '{name}' has nside {component_nside} but the model has nside {model_nside}")]
    ResolutionMismatch {
        name: String,
        component_nside: u32,
        model_nside: u32,
    },

    #[error("invalid resolution: nside {0}")]
    InvalidResolution(u32),

    #[error("component '{0}' not found in the model")]
    ComponentNotFound(String),

    #[error("no frequencies requested")]
    NoFrequencies,

    #[error("sky model has no components")]
    Empty,

    #[error("component '{name}': {source}")]
    Component {
        name: String,
        #[source]
        source: ComponentError,
    },
}

/// Result of [`SkyModel::get_emission`].
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Summed emission at one frequency or over one bandpass
    Map(PixelMap),
    /// One summed map per requested frequency
    PerFrequency(Vec<PixelMap>),
}

impl Emission {
    pub fn maps(&self) -> &[PixelMap] {
        match self {
            Emission::Map(map) => std::slice::from_ref(map),
            Emission::PerFrequency(maps) => maps,
        }
    }

    pub fn into_map(self) -> Option<PixelMap> {
        match self {
            Emission::Map(map) => Some(map),
            Emission::PerFrequency(_) => None,
        }
    }
}

/// Named emission components sharing one pixel grid.
///
/// The grid resolution is either fixed at construction or adopted from the
/// first inserted component.
#[derive(Debug, Clone, Default)]
pub struct SkyModel {
    configured_nside: Option<u32>,
    components: Vec<Component>,
    config: EvaluationConfig,
}

impl SkyModel {
    /// # Errors
    /// `InvalidResolution` if `nside` is given and is not a valid HEALPix resolution.
    pub fn new(nside: Option<u32>) -> Result<Self, ModelError> {
        if let Some(n) = nside {
            if !is_valid_nside(n) {
                return Err(ModelError::InvalidResolution(n));
            }
        }
        Ok(Self {
            configured_nside: nside,
            components: Vec::new(),
            config: EvaluationConfig::default(),
        })
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Resolution shared by all components, if known.
    pub fn nside(&self) -> Option<u32> {
        self.configured_nside
            .or_else(|| self.components.first().map(Component::nside))
    }

    pub fn insert(&mut self, component: Component) -> Result<(), ModelError> {
        if self.get(component.name()).is_some() {
            return Err(ModelError::DuplicateComponent(component.name().to_string()));
        }
        if let Some(model_nside) = self.nside() {
            if component.nside() != model_nside {
                return Err(ModelError::ResolutionMismatch {
                    name: component.name().to_string(),
                    component_nside: component.nside(),
                    model_nside,
                });
            }
        }
        debug!("inserting component '{}'", component.name());
        self.components.push(component);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Component, ModelError> {
        let index = self
            .components
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ModelError::ComponentNotFound(name.to_string()))?;
        Ok(self.components.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// Components in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.components.iter().map(Component::name).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_polarized(&self) -> bool {
        self.components.iter().any(Component::is_polarized)
    }

    /// Total emission of all components.
    ///
    /// Several frequencies without bandpass weights produce one map per
    /// frequency; everything else produces one map. Output has three
    /// channels when any component is polarized, with unpolarized
    /// components contributing to intensity only.
    pub fn get_emission(
        &self,
        request: &EmissionRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Emission, ModelError> {
        if request.freqs_ghz.is_empty() {
            return Err(ModelError::NoFrequencies);
        }
        if request.weights.is_none() && request.freqs_ghz.len() > 1 {
            let maps = request
                .freqs_ghz
                .iter()
                .map(|&freq| {
                    let single = EmissionRequest {
                        freqs_ghz: vec![freq],
                        ..request.clone()
                    };
                    self.summed_emission(&single, diagnostics)
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Emission::PerFrequency(maps));
        }
        Ok(Emission::Map(self.summed_emission(request, diagnostics)?))
    }

    fn summed_emission(
        &self,
        request: &EmissionRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<PixelMap, ModelError> {
        let nside = self.nside().ok_or(ModelError::Empty)?;
        if self.is_empty() {
            return Err(ModelError::Empty);
        }
        let channels = if self.is_polarized() { 3 } else { 1 };
        let mut total = Array2::<f64>::zeros((channels, nside_to_npix(nside)));
        for component in &self.components {
            let emission = component
                .evaluate(request, &self.config, diagnostics)
                .map_err(|source| ModelError::Component {
                    name: component.name().to_string(),
                    source,
                })?;
            let rows = emission.n_channels();
            let mut target = total.slice_mut(s![..rows, ..]);
            target += emission.data();
        }
        Ok(PixelMap::new(total, request.output_unit))
    }

    /// Re-pixelizes every component to `nside`. Unchanged resolution is a
    /// no-op and a failure leaves the model untouched.
    pub fn resample(&mut self, nside: u32) -> Result<(), ModelError> {
        if !is_valid_nside(nside) {
            return Err(ModelError::InvalidResolution(nside));
        }
        if self.nside() == Some(nside) {
            return Ok(());
        }
        info!("resampling sky model to nside {nside}");
        let resampled = self
            .components
            .iter()
            .map(|c| {
                c.resample(nside).map_err(|source| ModelError::Component {
                    name: c.name().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.components = resampled;
        self.configured_nside = Some(nside);
        Ok(())
    }
}

impl fmt::Display for SkyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nside() {
            Some(nside) => write!(f, "SkyModel(nside={nside})")?,
            None => write!(f, "SkyModel(nside=unset)")?,
        }
        for component in &self.components {
            write!(f, "\n  {}", component.to_string().replace('\n', "\n  "))?;
        }
        Ok(())
    }
}
