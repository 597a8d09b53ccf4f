//! Rebuilding sky models from chain archives

mod common;

use approx::assert_relative_eq;
use common::{cmb_dust_chain, max_abs_diff, PoisonedChain};
use ndarray::Array2;
use skymodel::chain::ParameterValue;
use skymodel::{
    build_model_from_chain, ChainError, Diagnostics, EmissionRequest, LoadOptions, MemoryChain,
    SampleSelection, Unit,
};
use test_helpers::{init_test_logging, npix};

#[test]
fn test_single_component_scenario() {
    init_test_logging();
    let chain = cmb_dust_chain(64, 2);
    let options = LoadOptions::default().with_components(["cmb"]);
    let model = build_model_from_chain(&chain, Some(64), &options).unwrap();

    assert_eq!(model.names(), vec!["cmb"]);
    assert_eq!(model.nside(), Some(64));

    let request = EmissionRequest::at(100.0).with_output_unit(Unit::MicroKelvinCmb);
    let emission = model
        .get_emission(&request, &mut Diagnostics::new())
        .unwrap()
        .into_map()
        .unwrap();
    assert_eq!(emission.data().dim(), (1, 49152));
    assert_eq!(emission.unit(), Unit::MicroKelvinCmb);
}

#[test]
fn test_missing_parameter_group_fails_before_any_read() {
    let result = build_model_from_chain(&PoisonedChain, Some(16), &LoadOptions::default());
    assert!(matches!(result, Err(ChainError::Format)));

    let old = MemoryChain::without_parameter_group().with_sample_item(
        0,
        "dust",
        "amp_map",
        Array2::zeros((1, npix(4))),
    );
    assert!(matches!(
        build_model_from_chain(&old, None, &LoadOptions::default()),
        Err(ChainError::Format)
    ));
}

#[test]
fn test_requested_component_missing_from_archive() {
    let chain = cmb_dust_chain(8, 1);
    let options = LoadOptions::default().with_components(["cmb", "synch"]);
    assert!(matches!(
        build_model_from_chain(&chain, None, &options),
        Err(ChainError::ComponentNotFound(name)) if name == "synch"
    ));
}

#[test]
fn test_unknown_sky_model() {
    let chain = cmb_dust_chain(8, 1);
    let options = LoadOptions::default().with_model_name("Planck2018");
    assert!(matches!(
        build_model_from_chain(&chain, None, &options),
        Err(ChainError::UnknownSkyModel(_))
    ));
}

#[test]
fn test_default_loads_every_registered_component() {
    let chain = cmb_dust_chain(8, 1);
    let model = build_model_from_chain(&chain, None, &LoadOptions::default()).unwrap();
    assert_eq!(model.names(), vec!["cmb", "dust"]);
    assert!(model.is_polarized());

    let dust = model.get("dust").unwrap();
    assert_eq!(dust.amplitude().unit(), Unit::MicroKelvinRj);
    assert_relative_eq!(dust.freq_ref()[[0, 0]], 545.0, max_relative = 1e-12);
    assert_relative_eq!(dust.freq_ref()[[2, 0]], 353.0, max_relative = 1e-12);
    assert!(dust.spectral_parameters()["beta"].is_spatially_varying());
    assert_eq!(dust.spectral_parameters()["T"].shape(), (1, 1));

    let map = model
        .get_emission(&EmissionRequest::at(353.0), &mut Diagnostics::new())
        .unwrap()
        .into_map()
        .unwrap();
    assert_eq!(map.data().dim(), (3, npix(8)));
}

#[test]
fn test_constant_field_averages_exactly() {
    let nside = 4;
    let n = npix(nside);
    let value = 0.1 + 0.7;
    let mut chain = MemoryChain::new()
        .with_parameter("synch", "nside", ParameterValue::Integer(nside as i64))
        .with_parameter("synch", "nu_ref", ParameterValue::Float(30e9));
    for s in 0..8 {
        chain.set_sample_item(s, "synch", "amp_map", Array2::from_elem((1, n), value));
        chain.set_sample_item(s, "synch", "beta", Array2::from_elem((1, 1), -3.0 - s as f64 * 0.01));
    }

    let options = LoadOptions::default().with_samples(SampleSelection::List(vec![3, 4, 5]));
    let model = build_model_from_chain(&chain, None, &options).unwrap();
    let synch = model.get("synch").unwrap();
    assert!(synch.amplitude().data().iter().all(|v| *v == value));
    assert_relative_eq!(
        synch.spectral_parameters()["beta"].get(0, 0),
        -3.04,
        max_relative = 1e-12
    );
}

#[test]
fn test_burn_in_selects_tail() {
    let chain = cmb_dust_chain(4, 6);
    let tail = LoadOptions::default()
        .with_components(["dust"])
        .with_samples(SampleSelection::All)
        .with_burn_in(4);
    let explicit = LoadOptions::default()
        .with_components(["dust"])
        .with_samples(SampleSelection::List(vec![4, 5]));
    let a = build_model_from_chain(&chain, None, &tail).unwrap();
    let b = build_model_from_chain(&chain, None, &explicit).unwrap();
    assert_eq!(
        a.get("dust").unwrap().amplitude(),
        b.get("dust").unwrap().amplitude()
    );
}

#[test]
fn test_coefficients_are_averaged_before_transform() {
    let chain = cmb_dust_chain(8, 2);
    let load = |selection: SampleSelection| {
        let options = LoadOptions::default()
            .with_components(["cmb"])
            .with_samples(selection);
        build_model_from_chain(&chain, None, &options)
            .unwrap()
            .get("cmb")
            .unwrap()
            .amplitude()
            .data()
            .clone()
    };
    let first = load(SampleSelection::Index(0));
    let second = load(SampleSelection::Index(1));
    let mean = load(SampleSelection::List(vec![0, 1]));

    let expected = (&first + &second) / 2.0;
    assert!(max_abs_diff(mean.view(), expected.view()) < 1e-9);
    assert!(max_abs_diff(first.view(), second.view()) > 1.0);
}

#[test]
fn test_missing_sample_is_key_error() {
    let chain = cmb_dust_chain(4, 2);
    let options = LoadOptions::default().with_samples(SampleSelection::Index(7));
    assert!(matches!(
        build_model_from_chain(&chain, None, &options),
        Err(ChainError::Key(id)) if id == "000007"
    ));
}

#[test]
fn test_archive_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.json");
    let chain = cmb_dust_chain(4, 2);
    chain.save_to_file(&path).unwrap();

    let loaded = MemoryChain::load_from_file(&path).unwrap();
    let model = build_model_from_chain(&loaded, Some(8), &LoadOptions::default()).unwrap();
    assert_eq!(model.nside(), Some(8));
    assert_eq!(model.len(), 2);
}
