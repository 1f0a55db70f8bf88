//! The parameter store: numeric inputs keyed by one of five index shapes.
//!
//! Every parameter has a fixed shape and a default, both known when the store is created. Values
//! which have not been provided resolve to the default, so only the entries actually defined for
//! a parameter are stored.
use crate::dataset::Dataset;
use crate::process::ConversionSubprocess;
use anyhow::{Result, ensure};
use derive_more::Display;
use float_cmp::approx_eq;
use indexmap::IndexMap;
use strum::{EnumIter, EnumString, IntoEnumIterator};

/// Tolerance within which an output profile must sum to one
pub const PROFILE_SUM_TOLERANCE: f64 = 1e-4;

/// The index shape of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterShape {
    /// A single value
    Scalar,
    /// One value per year
    ByYear,
    /// One value per conversion subprocess
    ByCs,
    /// One value per conversion subprocess and year
    ByCsYear,
    /// One value per conversion subprocess and time
    ByCsTime,
}

/// The parameters understood by the planning model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, EnumIter)]
#[derive(strum::Display)]
pub enum Parameter {
    /// Length of a timestep in hours
    #[strum(serialize = "dt")]
    Dt,
    /// Weight of the representative timesteps relative to a full year
    #[strum(serialize = "w")]
    W,
    /// Rate used to discount future costs back to the first year
    #[strum(serialize = "discount_rate")]
    DiscountRate,
    /// Price per unit of CO2 emitted
    #[strum(serialize = "co2_price")]
    Co2Price,
    /// Upper limit on annual CO2 emissions
    #[strum(serialize = "annual_co2_limit")]
    AnnualCo2Limit,
    /// CO2 emitted per unit of energy output
    #[strum(serialize = "spec_co2")]
    SpecCo2,
    /// Ratio of output to input power
    #[strum(serialize = "efficiency")]
    Efficiency,
    /// Number of years new capacity remains active
    #[strum(serialize = "technical_lifetime")]
    TechnicalLifetime,
    /// Fraction of capacity available at any time
    #[strum(serialize = "technical_availability")]
    TechnicalAvailability,
    /// Ratio of storage power capacity to energy capacity
    #[strum(serialize = "c_rate")]
    CRate,
    /// Efficiency with which storage is charged
    #[strum(serialize = "efficiency_charge")]
    EfficiencyCharge,
    /// Investment cost per unit of new capacity
    #[strum(serialize = "capex_cost_power")]
    CapexCostPower,
    /// Fixed operating cost per unit of active capacity
    #[strum(serialize = "opex_cost_power")]
    OpexCostPower,
    /// Variable operating cost per unit of energy output
    #[strum(serialize = "opex_cost_energy")]
    OpexCostEnergy,
    /// Upper limit on residual capacity
    #[strum(serialize = "cap_res_max")]
    CapResMax,
    /// Lower limit on residual capacity
    #[strum(serialize = "cap_res_min")]
    CapResMin,
    /// Lower limit on active capacity
    #[strum(serialize = "cap_min")]
    CapMin,
    /// Upper limit on active capacity
    #[strum(serialize = "cap_max")]
    CapMax,
    /// Upper limit on annual energy output
    #[strum(serialize = "max_eout")]
    MaxEout,
    /// Lower limit on annual energy output
    #[strum(serialize = "min_eout")]
    MinEout,
    /// Minimum share of a commodity's generation supplied by a subprocess
    #[strum(serialize = "out_frac_min")]
    OutFracMin,
    /// Maximum share of a commodity's generation supplied by a subprocess
    #[strum(serialize = "out_frac_max")]
    OutFracMax,
    /// Minimum share of a commodity's consumption used by a subprocess
    #[strum(serialize = "in_frac_min")]
    InFracMin,
    /// Maximum share of a commodity's consumption used by a subprocess
    #[strum(serialize = "in_frac_max")]
    InFracMax,
    /// Fraction of capacity available at each time (e.g. a wind profile)
    #[strum(serialize = "availability_profile")]
    AvailabilityProfile,
    /// Share of annual output produced at each time
    #[strum(serialize = "output_profile")]
    OutputProfile,
}

impl Parameter {
    /// The index shape of this parameter
    pub fn shape(self) -> ParameterShape {
        match self {
            Self::Dt | Self::W | Self::DiscountRate => ParameterShape::Scalar,
            Self::Co2Price | Self::AnnualCo2Limit => ParameterShape::ByYear,
            Self::SpecCo2
            | Self::Efficiency
            | Self::TechnicalLifetime
            | Self::TechnicalAvailability
            | Self::CRate
            | Self::EfficiencyCharge => ParameterShape::ByCs,
            Self::CapexCostPower
            | Self::OpexCostPower
            | Self::OpexCostEnergy
            | Self::CapResMax
            | Self::CapResMin
            | Self::CapMin
            | Self::CapMax
            | Self::MaxEout
            | Self::MinEout
            | Self::OutFracMin
            | Self::OutFracMax
            | Self::InFracMin
            | Self::InFracMax => ParameterShape::ByCsYear,
            Self::AvailabilityProfile | Self::OutputProfile => ParameterShape::ByCsTime,
        }
    }

    /// The value used when no entry has been provided
    pub fn default_value(self) -> f64 {
        match self {
            Self::Dt
            | Self::W
            | Self::Efficiency
            | Self::TechnicalAvailability
            | Self::CRate
            | Self::EfficiencyCharge
            | Self::OutFracMax
            | Self::InFracMax
            | Self::AvailabilityProfile => 1.0,
            Self::TechnicalLifetime => 100.0,
            Self::AnnualCo2Limit | Self::CapMax | Self::MaxEout => f64::INFINITY,
            Self::DiscountRate
            | Self::Co2Price
            | Self::SpecCo2
            | Self::CapexCostPower
            | Self::OpexCostPower
            | Self::OpexCostEnergy
            | Self::CapResMax
            | Self::CapResMin
            | Self::CapMin
            | Self::MinEout
            | Self::OutFracMin
            | Self::InFracMin
            | Self::OutputProfile => 0.0,
        }
    }
}

/// The index of a single parameter entry
#[derive(Clone, Debug, PartialEq, Display)]
pub enum ParameterKey {
    /// Key for a scalar parameter
    #[display("()")]
    Scalar,
    /// Key for a parameter indexed by year
    #[display("({_0})")]
    Year(u32),
    /// Key for a parameter indexed by subprocess
    #[display("{_0}")]
    Cs(ConversionSubprocess),
    /// Key for a parameter indexed by subprocess and year
    #[display("({_0}, {_1})")]
    CsYear(ConversionSubprocess, u32),
    /// Key for a parameter indexed by subprocess and time
    #[display("({_0}, {_1})")]
    CsTime(ConversionSubprocess, u32),
}

impl ParameterKey {
    /// The shape of parameter this key indexes
    pub fn shape(&self) -> ParameterShape {
        match self {
            Self::Scalar => ParameterShape::Scalar,
            Self::Year(_) => ParameterShape::ByYear,
            Self::Cs(_) => ParameterShape::ByCs,
            Self::CsYear(..) => ParameterShape::ByCsYear,
            Self::CsTime(..) => ParameterShape::ByCsTime,
        }
    }
}

/// The defined entries of a single parameter
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValues {
    /// A scalar, if defined
    Scalar(Option<f64>),
    /// Values by year
    ByYear(IndexMap<u32, f64>),
    /// Values by subprocess
    ByCs(IndexMap<ConversionSubprocess, f64>),
    /// Values by subprocess, then year
    ByCsYear(IndexMap<ConversionSubprocess, IndexMap<u32, f64>>),
    /// Values by subprocess, then time
    ByCsTime(IndexMap<ConversionSubprocess, IndexMap<u32, f64>>),
}

impl ParameterValues {
    /// An empty set of values of the given shape
    fn empty(shape: ParameterShape) -> Self {
        match shape {
            ParameterShape::Scalar => Self::Scalar(None),
            ParameterShape::ByYear => Self::ByYear(IndexMap::new()),
            ParameterShape::ByCs => Self::ByCs(IndexMap::new()),
            ParameterShape::ByCsYear => Self::ByCsYear(IndexMap::new()),
            ParameterShape::ByCsTime => Self::ByCsTime(IndexMap::new()),
        }
    }

    /// Number of defined entries
    fn len(&self) -> usize {
        match self {
            Self::Scalar(value) => usize::from(value.is_some()),
            Self::ByYear(map) => map.len(),
            Self::ByCs(map) => map.len(),
            Self::ByCsYear(map) | Self::ByCsTime(map) => map.values().map(IndexMap::len).sum(),
        }
    }
}

/// Values for every parameter in the catalogue.
///
/// Each planning model owns its own copy of the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterStore {
    values: IndexMap<Parameter, ParameterValues>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    /// Create a store in which every parameter takes its default value
    pub fn new() -> Self {
        let values = Parameter::iter()
            .map(|param| (param, ParameterValues::empty(param.shape())))
            .collect();
        Self { values }
    }

    fn values(&self, param: Parameter) -> &ParameterValues {
        &self.values[&param]
    }

    /// Add a value for one entry of a parameter.
    ///
    /// Fails if the key does not match the parameter's shape or the entry is already defined.
    pub fn insert(&mut self, param: Parameter, key: ParameterKey, value: f64) -> Result<()> {
        ensure!(
            key.shape() == param.shape(),
            "Parameter {param} is indexed by {:?}, but key {key} was given",
            param.shape()
        );
        ensure!(!value.is_nan(), "Value for parameter {param} {key} is NaN");

        let values = self
            .values
            .get_mut(&param)
            .expect("All parameters should be present in store");
        let inserted = match (values, key.clone()) {
            (ParameterValues::Scalar(entry), ParameterKey::Scalar) => {
                entry.replace(value).is_none()
            }
            (ParameterValues::ByYear(map), ParameterKey::Year(year)) => {
                map.insert(year, value).is_none()
            }
            (ParameterValues::ByCs(map), ParameterKey::Cs(cs)) => map.insert(cs, value).is_none(),
            (ParameterValues::ByCsYear(map), ParameterKey::CsYear(cs, year)) => {
                map.entry(cs).or_default().insert(year, value).is_none()
            }
            (ParameterValues::ByCsTime(map), ParameterKey::CsTime(cs, time)) => {
                map.entry(cs).or_default().insert(time, value).is_none()
            }
            _ => unreachable!("Shapes were checked above"),
        };
        ensure!(inserted, "Parameter {param} {key} is defined more than once");

        Ok(())
    }

    /// Look up an entry by key, falling back to the parameter's default
    pub fn get(&self, param: Parameter, key: &ParameterKey) -> Result<f64> {
        ensure!(
            key.shape() == param.shape(),
            "Parameter {param} is indexed by {:?}, but key {key} was given",
            param.shape()
        );
        Ok(match key {
            ParameterKey::Scalar => self.scalar(param),
            ParameterKey::Year(year) => self.by_year(param, *year),
            ParameterKey::Cs(cs) => self.by_cs(param, cs),
            ParameterKey::CsYear(cs, year) => self.by_cs_year(param, cs, *year),
            ParameterKey::CsTime(cs, time) => self.by_cs_time(param, cs, *time),
        })
    }

    /// Whether any entries have been defined for `param`
    pub fn is_defined(&self, param: Parameter) -> bool {
        self.values(param).len() > 0
    }

    /// Value of a scalar parameter
    pub fn scalar(&self, param: Parameter) -> f64 {
        match self.values(param) {
            ParameterValues::Scalar(value) => value.unwrap_or(param.default_value()),
            _ => panic!("Parameter {param} is not a scalar"),
        }
    }

    fn year_map(&self, param: Parameter) -> &IndexMap<u32, f64> {
        match self.values(param) {
            ParameterValues::ByYear(map) => map,
            _ => panic!("Parameter {param} is not indexed by year"),
        }
    }

    fn cs_map(&self, param: Parameter) -> &IndexMap<ConversionSubprocess, f64> {
        match self.values(param) {
            ParameterValues::ByCs(map) => map,
            _ => panic!("Parameter {param} is not indexed by subprocess"),
        }
    }

    fn cs_year_map(&self, param: Parameter) -> &IndexMap<ConversionSubprocess, IndexMap<u32, f64>> {
        match self.values(param) {
            ParameterValues::ByCsYear(map) => map,
            _ => panic!("Parameter {param} is not indexed by subprocess and year"),
        }
    }

    fn cs_time_map(&self, param: Parameter) -> &IndexMap<ConversionSubprocess, IndexMap<u32, f64>> {
        match self.values(param) {
            ParameterValues::ByCsTime(map) => map,
            _ => panic!("Parameter {param} is not indexed by subprocess and time"),
        }
    }

    /// Value of a parameter for `year`
    pub fn by_year(&self, param: Parameter, year: u32) -> f64 {
        self.year_map(param)
            .get(&year)
            .copied()
            .unwrap_or(param.default_value())
    }

    /// Value of a parameter for `cs`
    pub fn by_cs(&self, param: Parameter, cs: &ConversionSubprocess) -> f64 {
        self.cs_map(param)
            .get(cs)
            .copied()
            .unwrap_or(param.default_value())
    }

    /// Value of a parameter for `cs` in `year`
    pub fn by_cs_year(&self, param: Parameter, cs: &ConversionSubprocess, year: u32) -> f64 {
        self.cs_year_map(param)
            .get(cs)
            .and_then(|years| years.get(&year))
            .copied()
            .unwrap_or(param.default_value())
    }

    /// Value of a parameter for `cs` at `time`, if defined
    pub fn try_by_cs_time(
        &self,
        param: Parameter,
        cs: &ConversionSubprocess,
        time: u32,
    ) -> Option<f64> {
        self.cs_time_map(param)
            .get(cs)
            .and_then(|times| times.get(&time))
            .copied()
    }

    /// Value of a parameter for `cs` at `time`
    pub fn by_cs_time(&self, param: Parameter, cs: &ConversionSubprocess, time: u32) -> f64 {
        self.try_by_cs_time(param, cs, time)
            .unwrap_or(param.default_value())
    }

    /// Iterate over the defined entries of a parameter indexed by year
    pub fn iter_by_year(&self, param: Parameter) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.year_map(param)
            .iter()
            .map(|(&year, &value)| (year, value))
    }

    /// Iterate over the defined entries of a parameter indexed by subprocess
    pub fn iter_by_cs(
        &self,
        param: Parameter,
    ) -> impl Iterator<Item = (&ConversionSubprocess, f64)> + '_ {
        self.cs_map(param).iter().map(|(cs, &value)| (cs, value))
    }

    /// Iterate over the defined entries of a parameter indexed by subprocess and year
    pub fn iter_by_cs_year(
        &self,
        param: Parameter,
    ) -> impl Iterator<Item = (&ConversionSubprocess, u32, f64)> + '_ {
        self.cs_year_map(param).iter().flat_map(|(cs, years)| {
            years.iter().map(move |(&year, &value)| (cs, year, value))
        })
    }

    /// Iterate over the defined entries of a parameter indexed by subprocess and time
    pub fn iter_by_cs_time(
        &self,
        param: Parameter,
    ) -> impl Iterator<Item = (&ConversionSubprocess, u32, f64)> + '_ {
        self.cs_time_map(param).iter().flat_map(|(cs, times)| {
            times.iter().map(move |(&time, &value)| (cs, time, value))
        })
    }

    /// Check that every entry refers to members of `dataset` and that values are physically valid
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        for (param, values) in &self.values {
            match values {
                ParameterValues::Scalar(_) => {}
                ParameterValues::ByYear(map) => {
                    for &year in map.keys() {
                        check_entry(dataset.check_year(year), *param)?;
                    }
                }
                ParameterValues::ByCs(map) => {
                    for cs in map.keys() {
                        check_entry(dataset.check_subprocess(cs), *param)?;
                    }
                }
                ParameterValues::ByCsYear(map) => {
                    for (cs, years) in map {
                        check_entry(dataset.check_subprocess(cs), *param)?;
                        for &year in years.keys() {
                            check_entry(dataset.check_year(year), *param)?;
                        }
                    }
                }
                ParameterValues::ByCsTime(map) => {
                    for (cs, times) in map {
                        check_entry(dataset.check_subprocess(cs), *param)?;
                        for &time in times.keys() {
                            check_entry(dataset.check_time(time), *param)?;
                        }
                    }
                }
            }
        }

        ensure!(
            self.scalar(Parameter::Dt) > 0.0,
            "Parameter dt must be positive"
        );
        for param in [Parameter::Efficiency, Parameter::CRate] {
            for (cs, value) in self.iter_by_cs(param) {
                ensure!(
                    value > 0.0,
                    "Parameter {param} for {cs} must be positive"
                );
            }
        }
        for (cs, value) in self.iter_by_cs(Parameter::TechnicalLifetime) {
            ensure!(
                value.round() >= 1.0,
                "Parameter technical_lifetime for {cs} must be at least one year"
            );
        }
        for (cs, times) in self.cs_time_map(Parameter::OutputProfile) {
            let sum: f64 = times.values().sum();
            ensure!(
                approx_eq!(f64, sum, 1.0, epsilon = PROFILE_SUM_TOLERANCE),
                "Output profile for {cs} sums to {sum} rather than 1"
            );
        }

        Ok(())
    }
}

fn check_entry(result: Result<()>, param: Parameter) -> Result<()> {
    result.map_err(|err| err.context(format!("Invalid entry for parameter {param}")))
}
