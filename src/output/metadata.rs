//! Code for writing a description of each run alongside its results
use crate::model::Model;
use anyhow::{Context, Result};
use chrono::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// The analysis which produced a set of results
#[derive(Clone, Copy, Debug)]
pub enum RunKind<'a> {
    /// Solving the planning model
    Planning,
    /// Searching for an attack, with the configuration at the given path
    Attack(&'a Path),
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    model: ModelMetadata<'a>,
    program: ProgramMetadata,
}

#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the model which was run
    model_path: &'a Path,
    /// Either "planning" or "attack"
    command: &'static str,
    /// Path to the attack configuration, for attack runs
    #[serde(skip_serializing_if = "Option::is_none")]
    attack_config: Option<&'a Path>,
    /// When the run started
    datetime: String,
}

/// The size of the model
#[derive(Serialize)]
struct ModelMetadata<'a> {
    years: &'a [u32],
    times: &'a [u32],
    commodities: usize,
    subprocesses: usize,
    storage_subprocesses: usize,
}

#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    version: &'static str,
    is_debug: bool,
}

impl<'a> Metadata<'a> {
    fn new(model_path: &'a Path, model: &'a Model, kind: RunKind<'a>) -> Self {
        let (command, attack_config) = match kind {
            RunKind::Planning => ("planning", None),
            RunKind::Attack(config_path) => ("attack", Some(config_path)),
        };
        let dataset = &model.dataset;

        Self {
            run: RunMetadata {
                model_path,
                command,
                attack_config,
                datetime: Local::now().to_rfc2822(),
            },
            model: ModelMetadata {
                years: dataset.years(),
                times: dataset.times(),
                commodities: dataset.commodities().len(),
                subprocesses: dataset.subprocesses().len(),
                storage_subprocesses: dataset.storage().len(),
            },
            program: ProgramMetadata {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                is_debug: cfg!(debug_assertions),
            },
        }
    }
}

/// Write a description of the run to `metadata.toml` in the output folder
pub fn write_metadata(
    output_path: &Path,
    model_path: &Path,
    model: &Model,
    kind: RunKind,
) -> Result<()> {
    let metadata = Metadata::new(model_path, model, kind);
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}
