//! Static declarations of the components a chain can rebuild.
//!
//! Each variant lists the arguments it needs with the archive field they
//! are read from, their unit and their kind, followed by the context hooks
//! that massage the raw archive values into constructor form.

use std::collections::HashMap;

use ndarray::{s, Array2, Axis};
use once_cell::sync::Lazy;

use super::ChainError;
use crate::units::Unit;

/// What an archive value describes, which decides how it is re-pixelized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// Per-pixel data, possibly stored as harmonic coefficients
    PixelMap,
    /// One value per catalog source
    SourceList,
    /// Per-channel reference frequencies, stored in hertz
    ReferenceFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgumentSpec {
    /// Constructor argument name
    pub name: &'static str,
    /// Archive field name
    pub field: &'static str,
    pub unit: Unit,
    pub kind: ArgumentKind,
}

const fn arg(name: &'static str, field: &'static str, unit: Unit, kind: ArgumentKind) -> ArgumentSpec {
    ArgumentSpec {
        name,
        field,
        unit,
        kind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextHook {
    /// Reduces `[I, Q, U]` reference frequencies to `[I, Q]` for polarized
    /// amplitudes and to `[I]` otherwise
    ReferenceFrequencyChannels,
    /// Collapses spatially constant spectral parameters to scalars
    ScalarParameters,
    /// Keeps only the intensity channel of every argument
    IntensityOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Cmb,
    Synchrotron,
    ThermalDust,
    FreeFree,
    Radio,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentSpec {
    pub label: &'static str,
    pub variant: Variant,
    pub arguments: &'static [ArgumentSpec],
    pub contexts: &'static [ContextHook],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyModelSpec {
    pub name: &'static str,
    pub components: &'static [ComponentSpec],
}

impl SkyModelSpec {
    pub fn component(&self, label: &str) -> Result<&'static ComponentSpec, ChainError> {
        self.components
            .iter()
            .find(|c| c.label == label)
            .ok_or_else(|| ChainError::ComponentNotFound(label.to_string()))
    }
}

use ArgumentKind::{PixelMap, ReferenceFrequency, SourceList};

const CMB_ARGS: &[ArgumentSpec] = &[
    arg("amp", "amp", Unit::MicroKelvinCmb, PixelMap),
    arg("freq_ref", "nu_ref", Unit::Dimensionless, ReferenceFrequency),
];

const SYNCH_ARGS: &[ArgumentSpec] = &[
    arg("amp", "amp", Unit::MicroKelvinRj, PixelMap),
    arg("freq_ref", "nu_ref", Unit::Dimensionless, ReferenceFrequency),
    arg("beta", "beta", Unit::Dimensionless, PixelMap),
];

const DUST_ARGS: &[ArgumentSpec] = &[
    arg("amp", "amp", Unit::MicroKelvinRj, PixelMap),
    arg("freq_ref", "nu_ref", Unit::Dimensionless, ReferenceFrequency),
    arg("beta", "beta", Unit::Dimensionless, PixelMap),
    arg("T", "T", Unit::Kelvin, PixelMap),
];

const FF_ARGS: &[ArgumentSpec] = &[
    arg("amp", "amp", Unit::MicroKelvinRj, PixelMap),
    arg("freq_ref", "nu_ref", Unit::Dimensionless, ReferenceFrequency),
    arg("Te", "Te", Unit::Kelvin, PixelMap),
];

const RADIO_ARGS: &[ArgumentSpec] = &[
    arg("amp", "amp", Unit::MilliJansky, SourceList),
    arg("freq_ref", "nu_ref", Unit::Dimensionless, ReferenceFrequency),
    arg("alpha", "specind", Unit::Dimensionless, SourceList),
];

const DIFFUSE_CONTEXT: &[ContextHook] = &[
    ContextHook::ReferenceFrequencyChannels,
    ContextHook::ScalarParameters,
];

const UNPOLARIZED_CONTEXT: &[ContextHook] = &[
    ContextHook::IntensityOnly,
    ContextHook::ReferenceFrequencyChannels,
    ContextHook::ScalarParameters,
];

static BEYOND_PLANCK: SkyModelSpec = SkyModelSpec {
    name: "BeyondPlanck",
    components: &[
        ComponentSpec {
            label: "cmb",
            variant: Variant::Cmb,
            arguments: CMB_ARGS,
            contexts: DIFFUSE_CONTEXT,
        },
        ComponentSpec {
            label: "dust",
            variant: Variant::ThermalDust,
            arguments: DUST_ARGS,
            contexts: DIFFUSE_CONTEXT,
        },
        ComponentSpec {
            label: "synch",
            variant: Variant::Synchrotron,
            arguments: SYNCH_ARGS,
            contexts: DIFFUSE_CONTEXT,
        },
        ComponentSpec {
            label: "ff",
            variant: Variant::FreeFree,
            arguments: FF_ARGS,
            contexts: UNPOLARIZED_CONTEXT,
        },
        ComponentSpec {
            label: "radio",
            variant: Variant::Radio,
            arguments: RADIO_ARGS,
            contexts: UNPOLARIZED_CONTEXT,
        },
    ],
};

/// Sky models that chains can be loaded into, by name.
pub static SKY_MODELS: Lazy<HashMap<&'static str, &'static SkyModelSpec>> =
    Lazy::new(|| HashMap::from([(BEYOND_PLANCK.name, &BEYOND_PLANCK)]));

pub fn sky_model(name: &str) -> Result<&'static SkyModelSpec, ChainError> {
    SKY_MODELS
        .get(name)
        .copied()
        .ok_or_else(|| ChainError::UnknownSkyModel(name.to_string()))
}

/// An argument value read from an archive, shape `(channels, values)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgument {
    pub spec: ArgumentSpec,
    pub data: Array2<f64>,
    pub unit: Unit,
}

impl ContextHook {
    pub fn apply(&self, arguments: &mut [ResolvedArgument]) {
        match self {
            ContextHook::ReferenceFrequencyChannels => {
                let polarized = arguments
                    .iter()
                    .find(|a| a.spec.name == "amp")
                    .is_some_and(|amp| amp.data.nrows() == 3);
                let keep = if polarized { 2 } else { 1 };
                for argument in arguments
                    .iter_mut()
                    .filter(|a| a.spec.kind == ReferenceFrequency)
                {
                    let values: Vec<f64> = argument.data.iter().copied().take(keep).collect();
                    argument.data = ndarray::Array1::from(values).insert_axis(Axis(1));
                }
            }
            ContextHook::ScalarParameters => {
                for argument in arguments
                    .iter_mut()
                    .filter(|a| a.spec.name != "amp" && a.spec.kind != ReferenceFrequency)
                {
                    argument.data = collapse_constant(&argument.data);
                }
            }
            ContextHook::IntensityOnly => {
                for argument in arguments
                    .iter_mut()
                    .filter(|a| a.spec.kind != ReferenceFrequency && a.data.nrows() > 1)
                {
                    argument.data = argument.data.slice(s![..1, ..]).to_owned();
                }
            }
        }
    }
}

/// Drops unit-length variation: constant rows become one column, identical
/// rows become one row.
fn collapse_constant(data: &Array2<f64>) -> Array2<f64> {
    let mut out = data.clone();
    if out.ncols() > 1 && out.rows().into_iter().all(|row| row.iter().all(|&v| v == row[0])) {
        out = out.slice(s![.., ..1]).to_owned();
    }
    if out.nrows() > 1 && out.rows().into_iter().all(|row| row == out.row(0)) {
        out = out.slice(s![..1, ..]).to_owned();
    }
    out
}
