//! Code for reading the sets of commodities, processes and subprocesses from CSV files.
use super::*;
use crate::commodity::CommodityID;
use crate::process::{ConversionSubprocess, ProcessID};

const COMMODITIES_FILE_NAME: &str = "commodities.csv";
const PROCESSES_FILE_NAME: &str = "processes.csv";
const SUBPROCESSES_FILE_NAME: &str = "conversion_subprocesses.csv";

/// A conversion subprocess record retrieved from a CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct SubprocessRaw {
    process_id: String,
    input_commodity: String,
    output_commodity: String,
    #[serde(default)]
    is_storage: bool,
}

impl SubprocessRaw {
    fn into_subprocess(self) -> (ConversionSubprocess, bool) {
        let cs = ConversionSubprocess {
            process: self.process_id.into(),
            input: self.input_commodity.into(),
            output: self.output_commodity.into(),
        };
        (cs, self.is_storage)
    }
}

/// Read the dataset for a model from CSV files.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `years` - Modelled years
/// * `times` - Representative timesteps
pub fn read_dataset(model_dir: &Path, years: Vec<u32>, times: Vec<u32>) -> Result<Dataset> {
    let commodities: IndexSet<CommodityID> =
        read_csv_id_file(&model_dir.join(COMMODITIES_FILE_NAME))?;
    let processes: IndexSet<ProcessID> = read_csv_id_file(&model_dir.join(PROCESSES_FILE_NAME))?;

    let file_path = model_dir.join(SUBPROCESSES_FILE_NAME);
    let subprocesses = read_csv::<SubprocessRaw>(&file_path)?.map(SubprocessRaw::into_subprocess);
    Dataset::new(years, times, commodities, processes, subprocesses)
        .with_context(|| input_err_msg(&file_path))
}
