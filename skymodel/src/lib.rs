//! Parametric microwave and submillimeter sky model
//!
//! This crate models the sky as a sum of emission components (CMB,
//! synchrotron, thermal dust, free-free, radio point sources, spectral
//! lines), each an amplitude map scaled in frequency by a spectral energy
//! distribution. Emission is evaluated at single frequencies or integrated
//! over instrument bandpasses, and models can be rebuilt from the posterior
//! samples of a component-separation chain.

pub mod algo;
pub mod bandpass;
pub mod chain;
pub mod components;
pub mod config;
pub mod diagnostics;
pub mod model;
pub mod pixel_map;
pub mod sed;
pub mod units;

// Re-exports for easier access
pub use bandpass::{Bandpass, BandpassError};
pub use chain::{
    build_model_from_chain, ChainArchive, ChainError, ChainVersion, LoadOptions, MemoryChain,
    SampleSelection,
};
pub use components::{
    Component, ComponentError, ComponentKind, EmissionRequest, LineModel, PointSourceCatalog,
    SpectralLine, SpectralParameter, SpectralParameters,
};
pub use config::EvaluationConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use model::{Emission, ModelError, SkyModel};
pub use pixel_map::PixelMap;
pub use sed::SedModel;
pub use units::{conversion_factor, Equivalency, Unit, UnitError};
