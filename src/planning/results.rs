//! Values read back from a solved planning problem.
use super::variables::VariableMap;
use crate::commodity::CommodityID;
use crate::dataset::Dataset;
use crate::output::OutputSink;
use crate::process::ConversionSubprocess;
use crate::solver::LpSolution;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Results for a subprocess in a single year
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CsYearValues {
    /// New capacity built
    pub cap_new: f64,
    /// Active capacity
    pub cap_active: f64,
    /// Residual capacity
    pub cap_res: f64,
    /// Annual energy output
    pub eouttot: f64,
    /// Annual energy input
    pub eintot: f64,
    /// Storage energy capacity (zero for other subprocesses)
    pub e_storage_level_max: f64,
}

/// Results for a subprocess at a single timestep
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CsTimeValues {
    /// Power input
    pub pin: f64,
    /// Power output
    pub pout: f64,
    /// Energy output
    pub eouttime: f64,
    /// Energy input
    pub eintime: f64,
    /// Storage state of charge (zero for other subprocesses)
    pub e_storage_level: f64,
}

/// Results for a commodity at a single timestep
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommodityTimeValues {
    /// Total energy generated
    pub enetgen: f64,
    /// Total energy consumed
    pub enetcons: f64,
}

/// The results of solving a planning problem
#[derive(Clone, Debug, PartialEq)]
pub struct PlanningResults {
    /// Total expenditure
    pub totex: f64,
    /// Capital expenditure
    pub capex: f64,
    /// Operating expenditure
    pub opex: f64,
    /// CO2 emissions by year
    pub co2: IndexMap<u32, f64>,
    /// Results by subprocess and year
    pub cs_year: IndexMap<(ConversionSubprocess, u32), CsYearValues>,
    /// Results by subprocess, year and time
    pub cs_year_time: IndexMap<(ConversionSubprocess, u32, u32), CsTimeValues>,
    /// Results by commodity, year and time
    pub commodity_year_time: IndexMap<(CommodityID, u32, u32), CommodityTimeValues>,
    /// Perturbation of the attacked availability profile by time (empty unless attacked)
    pub upper: IndexMap<u32, f64>,
}

impl PlanningResults {
    /// Read the results for every variable in `vars` from `solution`
    pub fn new(solution: &LpSolution, vars: &VariableMap, dataset: &Dataset) -> Self {
        let years = dataset.years();
        let times = dataset.times();
        let value = |var| solution.value(var);

        let co2 = years
            .iter()
            .zip(&vars.co2)
            .map(|(&year, &var)| (year, value(var)))
            .collect();

        let mut cs_year = IndexMap::new();
        let mut cs_year_time = IndexMap::new();
        for (cs, cs_vars) in &vars.subprocesses {
            for (y, &year) in years.iter().enumerate() {
                let storage = cs_vars.storage.as_ref();
                cs_year.insert(
                    (cs.clone(), year),
                    CsYearValues {
                        cap_new: value(cs_vars.cap_new[y]),
                        cap_active: value(cs_vars.cap_active[y]),
                        cap_res: value(cs_vars.cap_res[y]),
                        eouttot: value(cs_vars.eouttot[y]),
                        eintot: value(cs_vars.eintot[y]),
                        e_storage_level_max: storage.map_or(0.0, |s| value(s.level_max[y])),
                    },
                );
                for (t, &time) in times.iter().enumerate() {
                    cs_year_time.insert(
                        (cs.clone(), year, time),
                        CsTimeValues {
                            pin: value(cs_vars.pin[y][t]),
                            pout: value(cs_vars.pout[y][t]),
                            eouttime: value(cs_vars.eouttime[y][t]),
                            eintime: value(cs_vars.eintime[y][t]),
                            e_storage_level: storage.map_or(0.0, |s| value(s.level[y][t])),
                        },
                    );
                }
            }
        }

        let mut commodity_year_time = IndexMap::new();
        for (commodity, co_vars) in &vars.commodities {
            for (y, &year) in years.iter().enumerate() {
                for (t, &time) in times.iter().enumerate() {
                    commodity_year_time.insert(
                        (commodity.clone(), year, time),
                        CommodityTimeValues {
                            enetgen: value(co_vars.enetgen[y][t]),
                            enetcons: value(co_vars.enetcons[y][t]),
                        },
                    );
                }
            }
        }

        Self {
            totex: value(vars.totex),
            capex: value(vars.capex),
            opex: value(vars.opex),
            co2,
            cs_year,
            cs_year_time,
            commodity_year_time,
            upper: IndexMap::new(),
        }
    }

    /// Results for a subprocess in a year
    pub fn cs_year(&self, cs: &ConversionSubprocess, year: u32) -> &CsYearValues {
        &self.cs_year[&(cs.clone(), year)]
    }

    /// Results for a subprocess at a timestep
    pub fn cs_year_time(&self, cs: &ConversionSubprocess, year: u32, time: u32) -> &CsTimeValues {
        &self.cs_year_time[&(cs.clone(), year, time)]
    }

    /// Active capacity of a subprocess in each year
    pub fn cap_active_for(&self, cs: &ConversionSubprocess) -> IndexMap<u32, f64> {
        self.cs_year
            .iter()
            .filter(|((other, _), _)| other == cs)
            .map(|((_, year), values)| (*year, values.cap_active))
            .collect()
    }

    /// Write all results to an output sink
    pub fn write_to(&self, sink: &mut dyn OutputSink) -> Result<()> {
        sink.write_totals(self.totex, self.capex, self.opex)?;
        for (&year, &co2) in &self.co2 {
            sink.write_year(year, co2)?;
        }
        for ((cs, year), values) in &self.cs_year {
            sink.write_cs_year(cs, *year, values)?;
        }
        for ((cs, year, time), values) in &self.cs_year_time {
            sink.write_cs_year_time(cs, *year, *time, values)?;
        }
        for ((commodity, year, time), values) in &self.commodity_year_time {
            sink.write_commodity_year_time(commodity, *year, *time, values)?;
        }
        for (&time, &upper) in &self.upper {
            sink.write_time(time, upper)?;
        }
        sink.flush()
    }
}
