//! The model: the sets over which it is defined and its parameter values.
use crate::dataset::Dataset;
use crate::input::load_model;
use crate::parameter::ParameterStore;
use anyhow::Result;
use std::path::Path;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Clone, Debug)]
pub struct Model {
    /// Years, times, commodities and subprocesses
    pub dataset: Dataset,
    /// Parameter values
    pub parameters: ParameterStore,
}

impl Model {
    /// Create a new model, checking that its parameters are consistent with the dataset
    pub fn new(dataset: Dataset, parameters: ParameterStore) -> Result<Self> {
        parameters.validate(&dataset)?;

        Ok(Self {
            dataset,
            parameters,
        })
    }

    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        load_model(model_dir.as_ref())
    }
}
