//! Decision variables of the planning model.
use crate::commodity::CommodityID;
use crate::dataset::Dataset;
use crate::process::ConversionSubprocess;
use crate::solver::{LinearProgram, Var};
use indexmap::IndexMap;

/// Variables indexed by year, then time (by position in the dataset's sets)
pub type YearTimeVars = Vec<Vec<Var>>;

/// Variables belonging to a single conversion subprocess.
///
/// Year-indexed vectors follow the order of [`Dataset::years`] and time-indexed vectors follow
/// [`Dataset::times`].
#[derive(Clone, Debug)]
pub struct SubprocessVars {
    /// Capacity built in each year
    pub cap_new: Vec<Var>,
    /// Capacity available in each year
    pub cap_active: Vec<Var>,
    /// Residual (pre-existing) capacity in each year
    pub cap_res: Vec<Var>,
    /// Annual energy output
    pub eouttot: Vec<Var>,
    /// Annual energy input
    pub eintot: Vec<Var>,
    /// Power input at each time
    pub pin: YearTimeVars,
    /// Power output at each time
    pub pout: YearTimeVars,
    /// Energy output at each time
    pub eouttime: YearTimeVars,
    /// Energy input at each time
    pub eintime: YearTimeVars,
    /// Storage variables, for subprocesses which can store energy
    pub storage: Option<StorageVars>,
}

/// Variables which only exist for storage subprocesses
#[derive(Clone, Debug)]
pub struct StorageVars {
    /// Energy capacity of the storage in each year
    pub level_max: Vec<Var>,
    /// State of charge at each time
    pub level: YearTimeVars,
}

/// Variables belonging to a single commodity
#[derive(Clone, Debug)]
pub struct CommodityVars {
    /// Total energy generated at each time
    pub enetgen: YearTimeVars,
    /// Total energy consumed at each time
    pub enetcons: YearTimeVars,
}

/// A map for easy lookup of variables in the problem.
///
/// We use this data structure for two things:
///
/// 1. In order define constraints for the optimisation
/// 2. To keep track of the combination of parameters that each variable corresponds to, for when we
///    are reading the results of the optimisation.
#[derive(Clone, Debug)]
pub struct VariableMap {
    /// Total expenditure
    pub totex: Var,
    /// Capital expenditure
    pub capex: Var,
    /// Operating expenditure
    pub opex: Var,
    /// Total CO2 emitted in each year
    pub co2: Vec<Var>,
    /// Variables for each subprocess
    pub subprocesses: IndexMap<ConversionSubprocess, SubprocessVars>,
    /// Variables for each commodity
    pub commodities: IndexMap<CommodityID, CommodityVars>,
}

impl VariableMap {
    /// Add all variables for `dataset` to the problem.
    ///
    /// All variables are non-negative with a zero objective coefficient.
    pub fn new(lp: &mut LinearProgram, dataset: &Dataset) -> Self {
        let num_years = dataset.years().len();
        let num_times = dataset.times().len();
        let mut add = || lp.add_var(0.0, f64::INFINITY, 0.0);

        let totex = add();
        let capex = add();
        let opex = add();
        let co2 = by_year(&mut add, num_years);

        let subprocesses = dataset
            .subprocesses()
            .iter()
            .map(|cs| {
                let vars = SubprocessVars {
                    cap_new: by_year(&mut add, num_years),
                    cap_active: by_year(&mut add, num_years),
                    cap_res: by_year(&mut add, num_years),
                    eouttot: by_year(&mut add, num_years),
                    eintot: by_year(&mut add, num_years),
                    pin: by_year_time(&mut add, num_years, num_times),
                    pout: by_year_time(&mut add, num_years, num_times),
                    eouttime: by_year_time(&mut add, num_years, num_times),
                    eintime: by_year_time(&mut add, num_years, num_times),
                    storage: dataset.is_storage(cs).then(|| StorageVars {
                        level_max: by_year(&mut add, num_years),
                        level: by_year_time(&mut add, num_years, num_times),
                    }),
                };
                (cs.clone(), vars)
            })
            .collect();

        let commodities = dataset
            .commodities()
            .iter()
            .map(|commodity| {
                let vars = CommodityVars {
                    enetgen: by_year_time(&mut add, num_years, num_times),
                    enetcons: by_year_time(&mut add, num_years, num_times),
                };
                (commodity.clone(), vars)
            })
            .collect();

        Self {
            totex,
            capex,
            opex,
            co2,
            subprocesses,
            commodities,
        }
    }

    /// Get the variables for a subprocess
    pub fn subprocess(&self, cs: &ConversionSubprocess) -> &SubprocessVars {
        self.subprocesses
            .get(cs)
            .expect("No variables found for given subprocess")
    }

    /// Get the variables for a commodity
    pub fn commodity(&self, commodity: &CommodityID) -> &CommodityVars {
        self.commodities
            .get(commodity)
            .expect("No variables found for given commodity")
    }

    /// Iterate over every variable in the map
    pub fn iter(&self) -> impl Iterator<Item = Var> + '_ {
        let scalars = [self.totex, self.capex, self.opex];
        let subprocess_vars = self.subprocesses.values().flat_map(|vars| {
            let annual = [
                &vars.cap_new,
                &vars.cap_active,
                &vars.cap_res,
                &vars.eouttot,
                &vars.eintot,
            ]
            .into_iter()
            .flatten()
            .copied();
            let timed = [&vars.pin, &vars.pout, &vars.eouttime, &vars.eintime]
                .into_iter()
                .flatten()
                .flatten()
                .copied();
            let storage = vars.storage.iter().flat_map(|storage| {
                storage
                    .level_max
                    .iter()
                    .chain(storage.level.iter().flatten())
                    .copied()
            });
            annual.chain(timed).chain(storage)
        });
        let commodity_vars = self.commodities.values().flat_map(|vars| {
            vars.enetgen
                .iter()
                .chain(vars.enetcons.iter())
                .flatten()
                .copied()
        });

        scalars
            .into_iter()
            .chain(self.co2.iter().copied())
            .chain(subprocess_vars)
            .chain(commodity_vars)
    }
}

fn by_year<F: FnMut() -> Var>(add: &mut F, num_years: usize) -> Vec<Var> {
    (0..num_years).map(|_| add()).collect()
}

fn by_year_time<F: FnMut() -> Var>(
    add: &mut F,
    num_years: usize,
    num_times: usize,
) -> YearTimeVars {
    (0..num_years)
        .map(|_| (0..num_times).map(|_| add()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::dataset;
    use crate::solver::Sense;
    use itertools::Itertools;
    use rstest::rstest;

    #[rstest]
    fn test_variable_map_new(dataset: Dataset) {
        let mut lp = LinearProgram::new(Sense::Minimise);
        let vars = VariableMap::new(&mut lp, &dataset);

        // Every variable in the problem is in the map exactly once
        let all = vars.iter().collect_vec();
        assert_eq!(all.len(), lp.num_vars());
        assert!(all.iter().all_unique());

        let battery = ConversionSubprocess::new("Battery", "Electricity", "Electricity");
        let wind = ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity");
        assert!(vars.subprocess(&battery).storage.is_some());
        assert!(vars.subprocess(&wind).storage.is_none());
        assert_eq!(vars.subprocess(&wind).pout.len(), dataset.years().len());
        assert_eq!(vars.subprocess(&wind).pout[0].len(), dataset.times().len());
    }

    #[rstest]
    fn test_variables_non_negative(dataset: Dataset) {
        let mut lp = LinearProgram::new(Sense::Minimise);
        VariableMap::new(&mut lp, &dataset);
        assert!(
            lp.iter_columns()
                .all(|(_, col)| col.lower == 0.0 && col.upper == f64::INFINITY)
        );
    }
}
