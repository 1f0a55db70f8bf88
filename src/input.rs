//! Common routines for handling input data.
use crate::dataset::Dataset;
use crate::id::IDLike;
use crate::model::{Model, ModelParameters};
use crate::parameter::{Parameter, ParameterKey};
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

mod dataset;
use dataset::read_dataset;
mod parameter;
use parameter::read_parameters;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file, returning nothing if the file does not exist.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Parse a JSON file at the specified path
pub fn read_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let json_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let json_data = serde_json::from_str(&json_str).with_context(|| input_err_msg(file_path))?;
    Ok(json_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// A record with only an ID column
#[derive(Debug, Deserialize, PartialEq)]
struct IDRecord {
    id: String,
}

/// Read a CSV file containing only IDs into a set, checking for duplicates
fn read_csv_id_file<ID: IDLike>(file_path: &Path) -> Result<IndexSet<ID>> {
    let mut ids = IndexSet::new();
    for record in read_csv::<IDRecord>(file_path)? {
        let id = ID::from(record.id);
        ensure!(
            !ids.contains(&id),
            "Duplicate ID found in {}: {id}",
            file_path.display()
        );
        ids.insert(id);
    }

    Ok(ids)
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The model, with its dataset and parameters, or an error.
pub fn load_model(model_dir: &Path) -> Result<Model> {
    let model_params = ModelParameters::from_path(model_dir)?;
    let dataset = read_dataset(model_dir, model_params.years, model_params.times)?;

    let mut parameters = read_parameters(model_dir, &dataset)?;
    for (param, value) in [
        (Parameter::Dt, model_params.dt),
        (Parameter::W, model_params.w),
        (Parameter::DiscountRate, model_params.discount_rate),
    ] {
        parameters.insert(param, ParameterKey::Scalar, value)?;
    }

    Model::new(dataset, parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::CommodityID;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> std::path::PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\nworld,2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // File with no data (only column headers)
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .next()
                .is_none()
        );

        // Missing file
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a_missing_file.csv");
        assert!(!file_path.exists());
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .next()
                .is_none()
        );
    }

    #[test]
    fn test_read_toml() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Data {
            value: u32,
        }

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        fs::write(&file_path, "value = 1").unwrap();
        assert_eq!(read_toml::<Data>(&file_path).unwrap(), Data { value: 1 });

        fs::write(&file_path, "bad toml syntax").unwrap();
        assert!(read_toml::<Data>(&file_path).is_err());
    }

    #[test]
    fn test_read_csv_id_file() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id\nDummy\nElectricity");
        let ids: IndexSet<CommodityID> = read_csv_id_file(&file_path).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("Electricity"));

        let file_path = create_csv_file(dir.path(), "id\nDummy\nDummy");
        assert!(read_csv_id_file::<CommodityID>(&file_path).is_err());
    }
}
