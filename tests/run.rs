//! Integration tests for the `run` command.
use cesm::cli::{RunOpts, handle_run_command};
use cesm::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("CESM_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "metadata.toml",
        "totals.csv",
        "years.csv",
        "subprocess_years.csv",
        "subprocess_year_times.csv",
        "commodity_year_times.csv",
        "debug_re_availability_duals.csv",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // The folder now has contents, so a second run must be allowed to overwrite it
    let result = handle_run_command(&get_model_dir(), &opts, Some(Settings::default()));
    assert!(result.is_err());

    let opts = RunOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
}
