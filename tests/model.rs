//! Integration tests for loading models from disk.
use cesm::model::Model;
use cesm::parameter::Parameter;
use cesm::process::ConversionSubprocess;
use std::path::{Path, PathBuf};

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    Path::new(file!())
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
        .join("simple")
}

/// An integration test which attempts to load the demo model
#[test]
fn test_model_from_path() {
    let model = Model::from_path(get_model_dir()).unwrap();
    assert_eq!(model.dataset.years(), [2020, 2030]);
    assert_eq!(model.dataset.times(), [1, 2, 3, 4]);
    assert_eq!(model.dataset.subprocesses().len(), 4);
    assert_eq!(model.dataset.storage().len(), 1);

    // Values from model.toml are available as scalar parameters
    assert_eq!(model.parameters.scalar(Parameter::Dt), 6.0);
    assert_eq!(model.parameters.scalar(Parameter::W), 365.0);

    let wind = ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity");
    assert_eq!(
        model
            .parameters
            .by_cs_time(Parameter::AvailabilityProfile, &wind, 3),
        0.2
    );
}
