//! The module responsible for writing output data to disk.
use crate::commodity::CommodityID;
use crate::planning::PlanningModel;
use crate::planning::results::{CommodityTimeValues, CsTimeValues, CsYearValues};
use crate::process::{ConversionSubprocess, ProcessID};
use crate::solver::LpSolution;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "cesm_results";

/// The output file name for total costs
const TOTALS_FILE_NAME: &str = "totals.csv";

/// The output file name for results indexed by year
const YEARS_FILE_NAME: &str = "years.csv";

/// The output file name for results indexed by subprocess and year
const CS_YEARS_FILE_NAME: &str = "subprocess_years.csv";

/// The output file name for results indexed by subprocess, year and time
const CS_YEAR_TIMES_FILE_NAME: &str = "subprocess_year_times.csv";

/// The output file name for results indexed by commodity, year and time
const COMMODITY_YEAR_TIMES_FILE_NAME: &str = "commodity_year_times.csv";

/// The output file name for results indexed by time
const TIMES_FILE_NAME: &str = "times.csv";

/// The output file name for resource availability duals
const RE_AVAILABILITY_DUALS_FILE_NAME: &str = "debug_re_availability_duals.csv";

/// The output file name for the trace of the attack algorithm
pub const ALGORITHM_TRACE_FILE_NAME: &str = "algorithm_trace.json";

/// Get the default output directory for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output dir contained existing data that was deleted, false if not, or an error.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A destination for the results of a solved model.
///
/// Each method corresponds to one index shape of the results.
pub trait OutputSink {
    /// Write total costs
    fn write_totals(&mut self, totex: f64, capex: f64, opex: f64) -> Result<()>;

    /// Write results for a year
    fn write_year(&mut self, year: u32, co2_emission: f64) -> Result<()>;

    /// Write results for a subprocess in a year
    fn write_cs_year(
        &mut self,
        cs: &ConversionSubprocess,
        year: u32,
        values: &CsYearValues,
    ) -> Result<()>;

    /// Write results for a subprocess at a timestep
    fn write_cs_year_time(
        &mut self,
        cs: &ConversionSubprocess,
        year: u32,
        time: u32,
        values: &CsTimeValues,
    ) -> Result<()>;

    /// Write results for a commodity at a timestep
    fn write_commodity_year_time(
        &mut self,
        commodity: &CommodityID,
        year: u32,
        time: u32,
        values: &CommodityTimeValues,
    ) -> Result<()>;

    /// Write the perturbation of the attacked availability profile at a timestep
    fn write_time(&mut self, time: u32, upper: f64) -> Result<()>;

    /// Write extra information about the solved planning model, for debugging
    fn write_debug_info(
        &mut self,
        _planning: &PlanningModel,
        _solution: &LpSolution,
    ) -> Result<()> {
        Ok(())
    }

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()>;
}

/// Represents a row in the totals CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TotalsRow {
    totex: f64,
    capex: f64,
    opex: f64,
}

/// Represents a row in the years CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct YearRow {
    year: u32,
    co2_emission: f64,
}

/// Used to represent subprocesses in output CSV files.
///
/// This will be written along with the values for the row.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SubprocessRow {
    process_id: ProcessID,
    input_commodity: CommodityID,
    output_commodity: CommodityID,
}

impl SubprocessRow {
    fn new(cs: &ConversionSubprocess) -> Self {
        Self {
            process_id: cs.process.clone(),
            input_commodity: cs.input.clone(),
            output_commodity: cs.output.clone(),
        }
    }
}

/// Year column for output CSV files
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct YearKeyRow {
    year: u32,
}

/// Year and time columns for output CSV files
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct YearTimeRow {
    year: u32,
    time: u32,
}

/// Represents a row in the commodity results CSV file, along with the values for the row
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CommodityRow {
    commodity_id: CommodityID,
}

/// Represents a row in the times CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TimeRow {
    time: u32,
    upper: f64,
}

/// Represents the dual values in a row of the resource availability duals CSV file.
///
/// This will be written along with a [`SubprocessRow`] and [`YearTimeRow`].
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DualRow {
    value: f64,
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    re_availability_duals_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        let file_path = output_path.join(RE_AVAILABILITY_DUALS_FILE_NAME);
        Ok(Self {
            re_availability_duals_writer: csv::Writer::from_path(file_path)?,
        })
    }

    /// Write resource availability duals to file
    fn write_re_availability_duals<'a, I>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (&'a ConversionSubprocess, u32, u32, f64)>,
    {
        for (cs, year, time, value) in iter {
            self.re_availability_duals_writer.serialize((
                SubprocessRow::new(cs),
                YearTimeRow { year, time },
                DualRow { value },
            ))?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.re_availability_duals_writer.flush()?;

        Ok(())
    }
}

/// An object for writing model results to CSV files
pub struct DataWriter {
    totals_writer: csv::Writer<File>,
    years_writer: csv::Writer<File>,
    cs_years_writer: csv::Writer<File>,
    cs_year_times_writer: csv::Writer<File>,
    commodity_year_times_writer: csv::Writer<File>,
    times_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            totals_writer: new_writer(TOTALS_FILE_NAME)?,
            years_writer: new_writer(YEARS_FILE_NAME)?,
            cs_years_writer: new_writer(CS_YEARS_FILE_NAME)?,
            cs_year_times_writer: new_writer(CS_YEAR_TIMES_FILE_NAME)?,
            commodity_year_times_writer: new_writer(COMMODITY_YEAR_TIMES_FILE_NAME)?,
            times_writer: new_writer(TIMES_FILE_NAME)?,
            debug_writer,
        })
    }
}

impl OutputSink for DataWriter {
    fn write_totals(&mut self, totex: f64, capex: f64, opex: f64) -> Result<()> {
        self.totals_writer
            .serialize(TotalsRow { totex, capex, opex })?;
        Ok(())
    }

    fn write_year(&mut self, year: u32, co2_emission: f64) -> Result<()> {
        self.years_writer
            .serialize(YearRow { year, co2_emission })?;
        Ok(())
    }

    fn write_cs_year(
        &mut self,
        cs: &ConversionSubprocess,
        year: u32,
        values: &CsYearValues,
    ) -> Result<()> {
        self.cs_years_writer
            .serialize((SubprocessRow::new(cs), YearKeyRow { year }, values))?;
        Ok(())
    }

    fn write_cs_year_time(
        &mut self,
        cs: &ConversionSubprocess,
        year: u32,
        time: u32,
        values: &CsTimeValues,
    ) -> Result<()> {
        self.cs_year_times_writer.serialize((
            SubprocessRow::new(cs),
            YearTimeRow { year, time },
            values,
        ))?;
        Ok(())
    }

    fn write_commodity_year_time(
        &mut self,
        commodity: &CommodityID,
        year: u32,
        time: u32,
        values: &CommodityTimeValues,
    ) -> Result<()> {
        self.commodity_year_times_writer.serialize((
            CommodityRow {
                commodity_id: commodity.clone(),
            },
            YearTimeRow { year, time },
            values,
        ))?;
        Ok(())
    }

    fn write_time(&mut self, time: u32, upper: f64) -> Result<()> {
        self.times_writer.serialize(TimeRow { time, upper })?;
        Ok(())
    }

    fn write_debug_info(
        &mut self,
        planning: &PlanningModel,
        solution: &LpSolution,
    ) -> Result<()> {
        if let Some(wtr) = &mut self.debug_writer {
            let duals = planning
                .keys()
                .re_availability
                .iter()
                .flat_map(|(cs, rows)| {
                    rows.iter()
                        .map(move |(&(year, time), &row)| (cs, year, time, solution.dual(row)))
                });
            wtr.write_re_availability_duals(duals)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.totals_writer.flush()?;
        self.years_writer.flush()?;
        self.cs_years_writer.flush()?;
        self.cs_year_times_writer.flush()?;
        self.commodity_year_times_writer.flush()?;
        self.times_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

/// Write a serialisable value to a JSON file
pub fn write_json<T: Serialize>(file_path: &Path, value: &T) -> Result<()> {
    let file = File::create(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    serde_json::to_writer_pretty(file, value)?;

    Ok(())
}
