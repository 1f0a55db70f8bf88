//! Integration tests for the `attack` command.
use cesm::attack::AttackConfig;
use cesm::attack::padm::AlgorithmTrace;
use cesm::attack::run_attack;
use cesm::cli::{AttackOpts, handle_attack_command};
use cesm::model::Model;
use cesm::output::DataWriter;
use cesm::parameter::Parameter;
use cesm::planning::PlanningModel;
use cesm::settings::Settings;
use cesm::solver::HighsSolver;
use float_cmp::assert_approx_eq;
use itertools::Itertools;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Get the path to the demo attack configuration.
fn get_config_path() -> PathBuf {
    get_model_dir().join("attack.json")
}

/// An integration test for the `attack` command.
#[test]
fn test_handle_attack_command() {
    unsafe { std::env::set_var("CESM_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = AttackOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: false,
    };
    handle_attack_command(
        &get_model_dir(),
        &get_config_path(),
        &opts,
        Some(Settings::default()),
    )
    .unwrap();

    assert!(output_dir.join("times.csv").is_file());
    assert!(!output_dir.join("debug_re_availability_duals.csv").exists());
    let trace = fs::read_to_string(output_dir.join("algorithm_trace.json")).unwrap();
    let trace: AlgorithmTrace = serde_json::from_str(&trace).unwrap();
    assert!(!trace.mu.is_empty());
    assert_eq!(trace.cap_active.len(), trace.obj.len());
    assert!(trace.mu.iter().tuple_windows().all(|(a, b)| b >= a));
}

/// Perturbations stay within their bounds and leave the total availability unchanged
#[test]
fn test_attack_bounds_and_zero_sum() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let mut config = AttackConfig::from_path(&get_config_path()).unwrap();
    config.attack.upper_lb = -0.5;
    config.attack.upper_ub = 0.5;

    let tempdir = tempdir().unwrap();
    let mut writer = DataWriter::create(tempdir.path(), false).unwrap();
    let outcome = run_attack(&model, &config, &HighsSolver, &mut writer).unwrap();

    let upper = &outcome.results.upper;
    assert_eq!(upper.len(), model.dataset.times().len());
    let mut total = 0.0;
    for (&time, &value) in upper {
        assert!((-0.5 - 1e-9..=0.5 + 1e-9).contains(&value));
        let availability = model.parameters.by_cs_time(
            Parameter::AvailabilityProfile,
            &config.attack.attacked_cs,
            time,
        );
        total += value * availability;
    }
    assert_approx_eq!(f64, total, 0.0, epsilon = 1e-6);
}

/// The debug setting is honoured by the `attack` command
#[test]
fn test_handle_attack_command_debug() {
    unsafe { std::env::set_var("CESM_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = AttackOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: false,
    };
    let settings = Settings {
        debug_model: true,
        ..Settings::default()
    };
    handle_attack_command(&get_model_dir(), &get_config_path(), &opts, Some(settings)).unwrap();

    let duals = fs::read_to_string(output_dir.join("debug_re_availability_duals.csv")).unwrap();
    assert!(duals.lines().count() > 1);
}

/// The demo limit on gas binds, and the first lower-level solve matches the planning optimum
#[test]
fn test_attack_limit_binds() {
    let model = Model::from_path(get_model_dir()).unwrap();
    let mut config = AttackConfig::from_path(&get_config_path()).unwrap();
    // Record the lower level before any perturbation is chosen
    config.padm.max_stationary_iter = 1;
    let planning = PlanningModel::new(&model);
    let planning_totex = planning
        .solve(&HighsSolver)
        .unwrap()
        .value(planning.variables().totex);

    let tempdir = tempdir().unwrap();
    let mut writer = DataWriter::create(tempdir.path(), false).unwrap();
    let outcome = run_attack(&model, &config, &HighsSolver, &mut writer).unwrap();

    let first = &outcome.trace.obj[0];
    assert_approx_eq!(f64, first.dual, planning_totex, epsilon = 1e-6);
    assert!(first.primal > first.dual + config.padm.penalty_error);
}
