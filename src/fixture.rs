//! Fixtures for tests
use crate::attack::AttackParams;
use crate::attack::Inequality;
use crate::attack::padm::PadmParams;
use crate::dataset::Dataset;
use crate::model::Model;
use crate::parameter::{Parameter, ParameterKey, ParameterStore};
use crate::process::ConversionSubprocess;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn wind() -> ConversionSubprocess {
    ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity")
}

fn gas() -> ConversionSubprocess {
    ConversionSubprocess::new("PP_Gas", "Dummy", "Electricity")
}

fn demand() -> ConversionSubprocess {
    ConversionSubprocess::new("Demand", "Electricity", "Dummy")
}

fn battery() -> ConversionSubprocess {
    ConversionSubprocess::new("Battery", "Electricity", "Electricity")
}

#[fixture]
pub fn dataset() -> Dataset {
    Dataset::new(
        vec![2020, 2030],
        vec![1, 2],
        ["Dummy".into(), "Electricity".into()].into_iter().collect(),
        [
            "PP_Wind".into(),
            "PP_Gas".into(),
            "Demand".into(),
            "Battery".into(),
        ]
        .into_iter()
        .collect(),
        [
            (wind(), false),
            (gas(), false),
            (demand(), false),
            (battery(), true),
        ],
    )
    .unwrap()
}

/// A model in which demand can be met by wind, gas or both
#[fixture]
pub fn wind_model(dataset: Dataset) -> Model {
    let mut parameters = ParameterStore::new();
    let mut insert = |param, key, value| parameters.insert(param, key, value).unwrap();

    for year in [2020, 2030] {
        insert(Parameter::MinEout, ParameterKey::CsYear(demand(), year), 100.0);
        insert(Parameter::CapexCostPower, ParameterKey::CsYear(wind(), year), 10.0);
        insert(Parameter::CapexCostPower, ParameterKey::CsYear(gas(), year), 20.0);
        insert(Parameter::OpexCostEnergy, ParameterKey::CsYear(gas(), year), 1.0);
        insert(Parameter::CapexCostPower, ParameterKey::CsYear(battery(), year), 50.0);
    }
    for (time, availability) in [(1, 0.4), (2, 0.8)] {
        insert(
            Parameter::AvailabilityProfile,
            ParameterKey::CsTime(wind(), time),
            availability,
        );
        insert(Parameter::OutputProfile, ParameterKey::CsTime(demand(), time), 0.5);
    }

    Model::new(dataset, parameters).unwrap()
}

#[fixture]
pub fn attack_params() -> AttackParams {
    AttackParams {
        attacked_cs: wind(),
        constrained_cs: gas(),
        constrained_cs_newval: 200.0,
        constrained_cs_inactive: 0.0,
        constrained_cs_ineq: Inequality::AtLeast,
        upper_ub: 0.5,
        upper_lb: -0.5,
    }
}

#[fixture]
pub fn padm_params() -> PadmParams {
    PadmParams {
        initial_mu: 0.01,
        increase_factor: 2.0,
        max_penalty_iter: 5,
        max_stationary_iter: 5,
        stationary_error: 1e-4,
        penalty_error: 1.0,
    }
}
