//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::dataset::is_sorted_and_unique;
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_dt, f64, 1.0);
define_param_default!(default_w, f64, 1.0);
define_param_default!(default_discount_rate, f64, 0.0);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Modelled years
    pub years: Vec<u32>,
    /// Representative timesteps
    pub times: Vec<u32>,
    /// Length of a timestep in hours
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Weight of the representative timesteps relative to a full year
    #[serde(default = "default_w")]
    pub w: f64,
    /// Rate used to discount future costs back to the first year
    #[serde(default = "default_discount_rate")]
    pub discount_rate: f64,
}

/// Check that the `years` parameter is valid
fn check_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`years` is empty");

    ensure!(
        is_sorted_and_unique(years),
        "`years` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the `times` parameter is valid
fn check_times(times: &[u32]) -> Result<()> {
    ensure!(!times.is_empty(), "`times` is empty");

    ensure!(
        is_sorted_and_unique(times),
        "`times` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the `dt` parameter is valid
fn check_dt(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "dt must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `w` parameter is valid
fn check_w(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "w must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `discount_rate` parameter is valid
fn check_discount_rate(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > -1.0,
        "discount_rate must be a finite number greater than -1"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_years(&self.years)?;
        check_times(&self.times)?;
        check_dt(self.dt)?;
        check_w(self.w)?;
        check_discount_rate(self.discount_rate)?;

        Ok(())
    }
}
