//! The index sets over which a model is defined.
use crate::commodity::CommodityID;
use crate::id::resolve_id;
use crate::process::{ConversionSubprocess, ProcessID};
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;

/// Check that the values are sorted and unique
pub fn is_sorted_and_unique<T: PartialOrd>(values: &[T]) -> bool {
    values.iter().tuple_windows().all(|(a, b)| a < b)
}

/// The sets of years, times, commodities, processes and subprocesses making up a model.
///
/// All parameters and decision variables are indexed by members of these sets. Once constructed, a
/// dataset is never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    years: Vec<u32>,
    times: Vec<u32>,
    commodities: IndexSet<CommodityID>,
    processes: IndexSet<ProcessID>,
    subprocesses: IndexSet<ConversionSubprocess>,
    storage: IndexSet<ConversionSubprocess>,
}

impl Dataset {
    /// Create a new [`Dataset`], checking that all of its sets are consistent.
    ///
    /// # Arguments
    ///
    /// * `years` - Modelled years, in ascending order
    /// * `times` - Representative timesteps, in ascending order
    /// * `commodities` - All commodities
    /// * `processes` - All conversion processes
    /// * `subprocesses` - All subprocesses, along with a flag indicating whether each is storage
    pub fn new<I>(
        years: Vec<u32>,
        times: Vec<u32>,
        commodities: IndexSet<CommodityID>,
        processes: IndexSet<ProcessID>,
        subprocesses: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (ConversionSubprocess, bool)>,
    {
        ensure!(!years.is_empty(), "No years provided");
        ensure!(
            is_sorted_and_unique(&years),
            "Years must be composed of unique values in order"
        );
        ensure!(!times.is_empty(), "No times provided");
        ensure!(
            is_sorted_and_unique(&times),
            "Times must be composed of unique values in order"
        );

        let mut all = IndexSet::new();
        let mut storage = IndexSet::new();
        for (cs, is_storage) in subprocesses {
            let cs = ConversionSubprocess {
                process: resolve_id(&processes, &cs.process.0)
                    .with_context(|| format!("Conversion process of {cs} is not defined"))?,
                input: resolve_id(&commodities, &cs.input.0)
                    .with_context(|| format!("Input commodity of {cs} is not defined"))?,
                output: resolve_id(&commodities, &cs.output.0)
                    .with_context(|| format!("Output commodity of {cs} is not defined"))?,
            };
            ensure!(
                !all.contains(&cs),
                "Conversion subprocess {cs} is defined more than once"
            );
            if is_storage {
                storage.insert(cs.clone());
            }
            all.insert(cs);
        }

        Ok(Self {
            years,
            times,
            commodities,
            processes,
            subprocesses: all,
            storage,
        })
    }

    /// The modelled years, in ascending order
    pub fn years(&self) -> &[u32] {
        &self.years
    }

    /// The first modelled year
    pub fn base_year(&self) -> u32 {
        self.years[0]
    }

    /// The representative timesteps, in ascending order
    pub fn times(&self) -> &[u32] {
        &self.times
    }

    /// All commodities, including the boundary commodity if present
    pub fn commodities(&self) -> &IndexSet<CommodityID> {
        &self.commodities
    }

    /// All conversion processes
    pub fn processes(&self) -> &IndexSet<ProcessID> {
        &self.processes
    }

    /// All conversion subprocesses
    pub fn subprocesses(&self) -> &IndexSet<ConversionSubprocess> {
        &self.subprocesses
    }

    /// The subprocesses which are able to store energy
    pub fn storage(&self) -> &IndexSet<ConversionSubprocess> {
        &self.storage
    }

    /// Whether the given subprocess is able to store energy
    pub fn is_storage(&self, cs: &ConversionSubprocess) -> bool {
        self.storage.contains(cs)
    }

    /// Get the position of `year` in the set of years
    pub fn year_index(&self, year: u32) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    /// Get the position of `time` in the set of times
    pub fn time_index(&self, time: u32) -> Option<usize> {
        self.times.binary_search(&time).ok()
    }

    /// Check that `cs` is a known subprocess
    pub fn check_subprocess(&self, cs: &ConversionSubprocess) -> Result<()> {
        ensure!(
            self.subprocesses.contains(cs),
            "Conversion subprocess {cs} is not defined"
        );
        Ok(())
    }

    /// Check that `year` is a modelled year
    pub fn check_year(&self, year: u32) -> Result<()> {
        ensure!(self.year_index(year).is_some(), "Year {year} is not defined");
        Ok(())
    }

    /// Check that `time` is a modelled timestep
    pub fn check_time(&self, time: u32) -> Result<()> {
        ensure!(self.time_index(time).is_some(), "Time {time} is not defined");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, dataset};
    use rstest::rstest;

    fn ids<T: From<&'static str> + std::hash::Hash + Eq>(values: &[&'static str]) -> IndexSet<T> {
        values.iter().map(|&v| v.into()).collect()
    }

    #[rstest]
    #[case(&[1], true)]
    #[case(&[1, 2], true)]
    #[case(&[], true)]
    #[case(&[1, 1], false)]
    #[case(&[2, 1], false)]
    fn test_is_sorted_and_unique(#[case] values: &[u32], #[case] expected: bool) {
        assert_eq!(is_sorted_and_unique(values), expected);
    }

    #[rstest]
    fn test_dataset_new(dataset: Dataset) {
        assert_eq!(dataset.base_year(), 2020);
        assert_eq!(dataset.year_index(2030), Some(1));
        assert_eq!(dataset.year_index(2025), None);
        let storage = ConversionSubprocess::new("Battery", "Electricity", "Electricity");
        assert!(dataset.is_storage(&storage));
        assert!(!dataset.is_storage(&ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity")));
    }

    #[rstest]
    #[case(vec![], vec![1], "No years provided")]
    #[case(vec![2030, 2020], vec![1], "Years must be composed of unique values in order")]
    #[case(vec![2020], vec![], "No times provided")]
    #[case(vec![2020], vec![2, 2], "Times must be composed of unique values in order")]
    fn test_dataset_new_bad_sets(
        #[case] years: Vec<u32>,
        #[case] times: Vec<u32>,
        #[case] msg: &str,
    ) {
        assert_error!(
            Dataset::new(
                years,
                times,
                ids(&["Dummy"]),
                ids(&["PP"]),
                std::iter::empty()
            ),
            msg
        );
    }

    #[test]
    fn test_dataset_new_unknown_commodity() {
        let cs = ConversionSubprocess::new("PP", "Dummy", "Heat");
        assert_error!(
            Dataset::new(
                vec![2020],
                vec![1],
                ids(&["Dummy", "Electricity"]),
                ids(&["PP"]),
                [(cs, false)]
            ),
            "Output commodity of (PP, Dummy, Heat) is not defined"
        );
    }

    #[test]
    fn test_dataset_new_unknown_process() {
        let cs = ConversionSubprocess::new("Boiler", "Dummy", "Electricity");
        assert_error!(
            Dataset::new(
                vec![2020],
                vec![1],
                ids(&["Dummy", "Electricity"]),
                ids(&["PP"]),
                [(cs, false)]
            ),
            "Conversion process of (Boiler, Dummy, Electricity) is not defined"
        );
    }

    #[test]
    fn test_dataset_new_duplicate_subprocess() {
        let cs = ConversionSubprocess::new("PP", "Dummy", "Electricity");
        assert_error!(
            Dataset::new(
                vec![2020],
                vec![1],
                ids(&["Dummy", "Electricity"]),
                ids(&["PP"]),
                [(cs.clone(), false), (cs, true)]
            ),
            "Conversion subprocess (PP, Dummy, Electricity) is defined more than once"
        );
    }
}
