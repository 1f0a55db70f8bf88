//! Code for reading parameter values from CSV files.
//!
//! There is one file for each index shape other than scalars, which are read from `model.toml`.
use super::*;
use crate::parameter::ParameterStore;
use crate::process::ConversionSubprocess;
use std::str::FromStr;

const YEAR_PARAMETERS_FILE_NAME: &str = "parameters_year.csv";
const CS_PARAMETERS_FILE_NAME: &str = "parameters_cs.csv";
const CS_YEAR_PARAMETERS_FILE_NAME: &str = "parameters_cs_year.csv";
const CS_TIME_PARAMETERS_FILE_NAME: &str = "parameters_cs_time.csv";

/// A record from one of the parameter files
trait ParameterRaw: DeserializeOwned {
    /// Split the record into parameter name, key and value
    fn into_entry(self) -> (String, ParameterKey, f64);
}

fn subprocess(process_id: &str, input: &str, output: &str) -> ConversionSubprocess {
    ConversionSubprocess::new(process_id, input, output)
}

#[derive(Debug, Deserialize, PartialEq)]
struct YearParameterRaw {
    parameter: String,
    year: u32,
    value: f64,
}

impl ParameterRaw for YearParameterRaw {
    fn into_entry(self) -> (String, ParameterKey, f64) {
        (self.parameter, ParameterKey::Year(self.year), self.value)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct CsParameterRaw {
    parameter: String,
    process_id: String,
    input_commodity: String,
    output_commodity: String,
    value: f64,
}

impl ParameterRaw for CsParameterRaw {
    fn into_entry(self) -> (String, ParameterKey, f64) {
        let cs = subprocess(
            &self.process_id,
            &self.input_commodity,
            &self.output_commodity,
        );
        (self.parameter, ParameterKey::Cs(cs), self.value)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct CsYearParameterRaw {
    parameter: String,
    process_id: String,
    input_commodity: String,
    output_commodity: String,
    year: u32,
    value: f64,
}

impl ParameterRaw for CsYearParameterRaw {
    fn into_entry(self) -> (String, ParameterKey, f64) {
        let cs = subprocess(
            &self.process_id,
            &self.input_commodity,
            &self.output_commodity,
        );
        (self.parameter, ParameterKey::CsYear(cs, self.year), self.value)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct CsTimeParameterRaw {
    parameter: String,
    process_id: String,
    input_commodity: String,
    output_commodity: String,
    time: u32,
    value: f64,
}

impl ParameterRaw for CsTimeParameterRaw {
    fn into_entry(self) -> (String, ParameterKey, f64) {
        let cs = subprocess(
            &self.process_id,
            &self.input_commodity,
            &self.output_commodity,
        );
        (self.parameter, ParameterKey::CsTime(cs, self.time), self.value)
    }
}

/// Insert the entries from an iterator of records into the store
fn read_parameters_from_iter<R, I>(iter: I, store: &mut ParameterStore) -> Result<()>
where
    R: ParameterRaw,
    I: Iterator<Item = R>,
{
    for record in iter {
        let (name, key, value) = record.into_entry();
        let param = Parameter::from_str(&name)
            .ok()
            .with_context(|| format!("Unknown parameter {name}"))?;
        store.insert(param, key, value)?;
    }

    Ok(())
}

/// Read the entries of one parameter file, if it exists
fn read_parameter_file<R: ParameterRaw>(
    file_path: &Path,
    store: &mut ParameterStore,
) -> Result<()> {
    let iter = read_csv_optional::<R>(file_path)?;
    read_parameters_from_iter(iter, store).with_context(|| input_err_msg(file_path))
}

/// Read parameter values from CSV files.
///
/// All of the files are optional; parameters with no entries take their default values.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `dataset` - The sets which parameter entries must refer to
pub fn read_parameters(model_dir: &Path, dataset: &Dataset) -> Result<ParameterStore> {
    let mut store = ParameterStore::new();
    read_parameter_file::<YearParameterRaw>(
        &model_dir.join(YEAR_PARAMETERS_FILE_NAME),
        &mut store,
    )?;
    read_parameter_file::<CsParameterRaw>(&model_dir.join(CS_PARAMETERS_FILE_NAME), &mut store)?;
    read_parameter_file::<CsYearParameterRaw>(
        &model_dir.join(CS_YEAR_PARAMETERS_FILE_NAME),
        &mut store,
    )?;
    read_parameter_file::<CsTimeParameterRaw>(
        &model_dir.join(CS_TIME_PARAMETERS_FILE_NAME),
        &mut store,
    )?;

    store
        .validate(dataset)
        .context("Invalid parameter values")?;

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, dataset};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn wind() -> ConversionSubprocess {
        ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity")
    }

    fn year_record(parameter: &str, year: u32, value: f64) -> YearParameterRaw {
        YearParameterRaw {
            parameter: parameter.into(),
            year,
            value,
        }
    }

    #[test]
    fn test_read_parameters_from_iter() {
        let mut store = ParameterStore::new();
        let records = [
            year_record("co2_price", 2020, 50.0),
            year_record("annual_co2_limit", 2030, 10.0),
        ];
        read_parameters_from_iter(records.into_iter(), &mut store).unwrap();
        assert_eq!(store.by_year(Parameter::Co2Price, 2020), 50.0);
        assert_eq!(store.by_year(Parameter::Co2Price, 2030), 0.0);
        assert_eq!(store.by_year(Parameter::AnnualCo2Limit, 2030), 10.0);
    }

    #[test]
    fn test_read_parameters_from_iter_unknown_parameter() {
        let mut store = ParameterStore::new();
        let records = [year_record("carbon_tax", 2020, 50.0)];
        assert_error!(
            read_parameters_from_iter(records.into_iter(), &mut store),
            "Unknown parameter carbon_tax"
        );
    }

    #[test]
    fn test_read_parameters_from_iter_duplicate() {
        let mut store = ParameterStore::new();
        let records = [
            year_record("co2_price", 2020, 50.0),
            year_record("co2_price", 2020, 60.0),
        ];
        assert_error!(
            read_parameters_from_iter(records.into_iter(), &mut store),
            "Parameter co2_price (2020) is defined more than once"
        );
    }

    #[test]
    fn test_read_parameters_from_iter_shape_mismatch() {
        let mut store = ParameterStore::new();
        let records = [year_record("efficiency", 2020, 0.5)];
        assert!(read_parameters_from_iter(records.into_iter(), &mut store).is_err());
    }

    #[rstest]
    fn test_read_parameters(dataset: Dataset) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(CS_TIME_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "parameter,process_id,input_commodity,output_commodity,time,value
availability_profile,PP_Wind,Dummy,Electricity,1,0.2
availability_profile,PP_Wind,Dummy,Electricity,2,0.8"
            )
            .unwrap();
        }

        let store = read_parameters(dir.path(), &dataset).unwrap();
        assert_eq!(
            store.by_cs_time(Parameter::AvailabilityProfile, &wind(), 2),
            0.8
        );
        assert_eq!(store.by_cs(Parameter::Efficiency, &wind()), 1.0);
    }

    #[rstest]
    fn test_read_parameters_unknown_subprocess(dataset: Dataset) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(CS_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "parameter,process_id,input_commodity,output_commodity,value
efficiency,PP_Coal,Dummy,Electricity,0.4"
            )
            .unwrap();
        }

        assert_error!(
            read_parameters(dir.path(), &dataset),
            "Invalid parameter values"
        );
    }
}
