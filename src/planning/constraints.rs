//! Code for adding constraints to the planning problem.
use super::variables::VariableMap;
use crate::finance::{discount_factor, year_gaps};
use crate::model::Model;
use crate::parameter::Parameter;
use crate::process::ConversionSubprocess;
use crate::solver::{LinearProgram, Row, Var};
use indexmap::IndexMap;
use itertools::{Itertools, iproduct};

/// Rows of the `re_availability` family for one subprocess, keyed by (year, time)
pub type AvailabilityRows = IndexMap<(u32, u32), Row>;

/// The keys for constraints which are modified or inspected after the problem is built
#[derive(Clone, Debug, Default)]
pub struct ConstraintKeys {
    /// Resource availability constraints for each subprocess with an availability profile
    pub re_availability: IndexMap<ConversionSubprocess, AvailabilityRows>,
}

/// Add all constraint families of the planning model.
///
/// # Arguments:
///
/// * `lp` - The optimisation problem
/// * `vars` - The variables in the problem
/// * `model` - The model
///
/// # Returns:
///
/// Keys for the resource availability constraints
pub fn add_constraints(
    lp: &mut LinearProgram,
    vars: &VariableMap,
    model: &Model,
) -> ConstraintKeys {
    add_cost_constraints(lp, vars, model);
    add_power_balance_constraints(lp, vars, model);
    add_co2_constraints(lp, vars, model);
    let re_availability = add_power_output_constraints(lp, vars, model);
    add_time_energy_constraints(lp, vars, model);
    add_fraction_constraints(lp, vars, model);
    add_capacity_constraints(lp, vars, model);
    add_annual_energy_constraints(lp, vars, model);
    add_storage_constraints(lp, vars, model);

    ConstraintKeys { re_availability }
}

/// Add the totex, capex and opex constraints.
///
/// Capital costs and the price of emissions are discounted back to the first year. Operating costs
/// are counted once for every year until the next modelled year.
fn add_cost_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let years = dataset.years();
    let discount_rate = params.scalar(Parameter::DiscountRate);

    // totex
    lp.add_eq(
        0.0,
        [(vars.totex, 1.0), (vars.capex, -1.0), (vars.opex, -1.0)],
    );

    // capex
    let mut terms = vec![(vars.capex, 1.0)];
    for (y, &year) in years.iter().enumerate() {
        let discount = discount_factor(dataset.base_year(), year, discount_rate);
        terms.push((
            vars.co2[y],
            -discount * params.by_year(Parameter::Co2Price, year),
        ));
        for (cs, cs_vars) in &vars.subprocesses {
            let cost = params.by_cs_year(Parameter::CapexCostPower, cs, year);
            terms.push((cs_vars.cap_new[y], -discount * cost));
        }
    }
    lp.add_eq(0.0, terms);

    // opex
    let mut terms = vec![(vars.opex, 1.0)];
    for ((y, &year), gap) in years.iter().enumerate().zip(year_gaps(years)) {
        for (cs, cs_vars) in &vars.subprocesses {
            let power = params.by_cs_year(Parameter::OpexCostPower, cs, year);
            let energy = params.by_cs_year(Parameter::OpexCostEnergy, cs, year);
            terms.push((cs_vars.cap_active[y], -gap * power));
            terms.push((cs_vars.eouttot[y], -gap * energy));
        }
    }
    lp.add_eq(0.0, terms);
}

/// Add nodal power balances for every commodity except the boundary commodity
fn add_power_balance_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    for commodity in dataset.commodities().iter().filter(|c| !c.is_dummy()) {
        for (y, t) in iproduct!(0..dataset.years().len(), 0..dataset.times().len()) {
            let mut terms = Vec::new();
            for (cs, cs_vars) in &vars.subprocesses {
                if cs.input == *commodity {
                    terms.push((cs_vars.pin[y][t], 1.0));
                }
                if cs.output == *commodity {
                    terms.push((cs_vars.pout[y][t], -1.0));
                }
            }
            lp.add_eq(0.0, terms);
        }
    }
}

/// Add emissions accounting and the optional annual emissions cap
fn add_co2_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;

    // co2_emission_eq
    for y in 0..dataset.years().len() {
        let terms = vars.subprocesses.iter().map(|(cs, cs_vars)| {
            (cs_vars.eouttot[y], -params.by_cs(Parameter::SpecCo2, cs))
        });
        lp.add_eq(0.0, std::iter::once((vars.co2[y], 1.0)).chain(terms));
    }

    // co2_emission_limit
    for (year, limit) in params.iter_by_year(Parameter::AnnualCo2Limit) {
        let y = year_index(model, year);
        lp.add_le(limit, [(vars.co2[y], 1.0)]);
    }
}

/// Add conversion efficiency and the limits on power output.
///
/// Returns the rows of the `re_availability` family so that their coefficients can be changed
/// later.
fn add_power_output_constraints(
    lp: &mut LinearProgram,
    vars: &VariableMap,
    model: &Model,
) -> IndexMap<ConversionSubprocess, AvailabilityRows> {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let year_times = || iproduct!(0..dataset.years().len(), 0..dataset.times().len());

    // efficiency
    for (cs, cs_vars) in &vars.subprocesses {
        if dataset.is_storage(cs) {
            continue;
        }
        let efficiency = params.by_cs(Parameter::Efficiency, cs);
        for (y, t) in year_times() {
            lp.add_eq(
                0.0,
                [(cs_vars.pout[y][t], 1.0), (cs_vars.pin[y][t], -efficiency)],
            );
        }
    }

    // max_power_out
    for cs_vars in vars.subprocesses.values() {
        for (y, t) in year_times() {
            add_capacity_limit(lp, cs_vars.pout[y][t], cs_vars.cap_active[y], 1.0);
        }
    }

    // re_availability
    let mut re_availability: IndexMap<_, AvailabilityRows> = IndexMap::new();
    for (cs, time, availability) in params.iter_by_cs_time(Parameter::AvailabilityProfile) {
        let cs_vars = vars.subprocess(cs);
        let t = time_index(model, time);
        let rows = re_availability.entry(cs.clone()).or_default();
        for (y, &year) in dataset.years().iter().enumerate() {
            let row = add_capacity_limit(
                lp,
                cs_vars.pout[y][t],
                cs_vars.cap_active[y],
                availability,
            );
            rows.insert((year, time), row);
        }
    }

    // technical_availability
    for (cs, availability) in params.iter_by_cs(Parameter::TechnicalAvailability) {
        let cs_vars = vars.subprocess(cs);
        for (y, t) in year_times() {
            add_capacity_limit(lp, cs_vars.pout[y][t], cs_vars.cap_active[y], availability);
        }
    }

    re_availability
}

/// Add the constraint `power <= factor * capacity`
fn add_capacity_limit(lp: &mut LinearProgram, power: Var, capacity: Var, factor: f64) -> Row {
    lp.add_le(0.0, [(power, 1.0), (capacity, -factor)])
}

/// Add the conversion from power at each timestep to energy
fn add_time_energy_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let scale = params.scalar(Parameter::Dt) * params.scalar(Parameter::W);

    for cs_vars in vars.subprocesses.values() {
        for (y, t) in iproduct!(0..dataset.years().len(), 0..dataset.times().len()) {
            // eouttime
            lp.add_eq(
                0.0,
                [(cs_vars.eouttime[y][t], 1.0), (cs_vars.pout[y][t], -scale)],
            );
            // eintime
            lp.add_eq(
                0.0,
                [(cs_vars.eintime[y][t], 1.0), (cs_vars.pin[y][t], -scale)],
            );
        }
    }
}

/// Add limits on each subprocess's share of commodity generation and consumption
fn add_fraction_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let params = &model.parameters;
    let num_times = model.dataset.times().len();

    let families = [
        (Parameter::OutFracMin, true, true),
        (Parameter::OutFracMax, true, false),
        (Parameter::InFracMin, false, true),
        (Parameter::InFracMax, false, false),
    ];
    for (param, is_output, is_min) in families {
        for (cs, year, fraction) in params.iter_by_cs_year(param) {
            // A zero minimum share is always satisfied
            if param == Parameter::OutFracMin && fraction == 0.0 {
                continue;
            }

            let y = year_index(model, year);
            let cs_vars = vars.subprocess(cs);
            let (energy, total) = if is_output {
                (&cs_vars.eouttime, &vars.commodity(&cs.output).enetgen)
            } else {
                (&cs_vars.eintime, &vars.commodity(&cs.input).enetcons)
            };
            for t in 0..num_times {
                let terms = [(energy[y][t], 1.0), (total[y][t], -fraction)];
                if is_min {
                    lp.add_ge(0.0, terms);
                } else {
                    lp.add_le(0.0, terms);
                }
            }
        }
    }
}

/// Add vintage accounting and limits on residual and active capacity
fn add_capacity_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let years = dataset.years();

    // max_cap_res
    for (cs, cs_vars) in &vars.subprocesses {
        for (y, &year) in years.iter().enumerate() {
            let limit = params.by_cs_year(Parameter::CapResMax, cs, year);
            lp.add_le(limit, [(cs_vars.cap_res[y], 1.0)]);
        }
    }

    // min_cap_res
    for (cs, year, limit) in params.iter_by_cs_year(Parameter::CapResMin) {
        let y = year_index(model, year);
        lp.add_ge(limit, [(vars.subprocess(cs).cap_res[y], 1.0)]);
    }

    // cap_active
    for (cs, cs_vars) in &vars.subprocesses {
        let lifetime = params.by_cs(Parameter::TechnicalLifetime, cs);
        for (y, &year) in years.iter().enumerate() {
            let vintages = vintage_indices(years, year, lifetime)
                .map(|yy| (cs_vars.cap_new[yy], -1.0));
            let terms = [(cs_vars.cap_active[y], 1.0), (cs_vars.cap_res[y], -1.0)]
                .into_iter()
                .chain(vintages);
            lp.add_eq(0.0, terms);
        }
    }

    // max_cap_active
    for (cs, year, limit) in params.iter_by_cs_year(Parameter::CapMax) {
        let y = year_index(model, year);
        lp.add_le(limit, [(vars.subprocess(cs).cap_active[y], 1.0)]);
    }

    // min_cap_active
    for (cs, year, limit) in params.iter_by_cs_year(Parameter::CapMin) {
        let y = year_index(model, year);
        lp.add_ge(limit, [(vars.subprocess(cs).cap_active[y], 1.0)]);
    }
}

/// Get the positions of the years whose new capacity is still active in `year`.
///
/// Capacity built in year `yy` is active for `lifetime` years, i.e. in every year in
/// `[yy, yy + lifetime - 1]`. The lifetime is rounded to the nearest whole year.
#[allow(clippy::cast_possible_truncation)]
pub fn vintage_indices(
    years: &[u32],
    year: u32,
    lifetime: f64,
) -> impl Iterator<Item = usize> + '_ {
    let lifetime = lifetime.round() as i64;
    let first = i64::from(year) - lifetime + 1;
    years
        .iter()
        .positions(move |&yy| i64::from(yy) >= first && yy <= year)
}

/// Add annual energy totals, their limits, load shapes and commodity totals
fn add_annual_energy_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let num_years = dataset.years().len();

    for cs_vars in vars.subprocesses.values() {
        for y in 0..num_years {
            // energy_power_out
            let terms = cs_vars.eouttime[y].iter().map(|&var| (var, -1.0));
            lp.add_eq(0.0, std::iter::once((cs_vars.eouttot[y], 1.0)).chain(terms));

            // energy_power_in
            let terms = cs_vars.eintime[y].iter().map(|&var| (var, -1.0));
            lp.add_eq(0.0, std::iter::once((cs_vars.eintot[y], 1.0)).chain(terms));
        }
    }

    // max_energy_out
    for (cs, year, limit) in params.iter_by_cs_year(Parameter::MaxEout) {
        let y = year_index(model, year);
        lp.add_le(limit, [(vars.subprocess(cs).eouttot[y], 1.0)]);
    }

    // min_energy_out
    for (cs, year, limit) in params.iter_by_cs_year(Parameter::MinEout) {
        let y = year_index(model, year);
        lp.add_ge(limit, [(vars.subprocess(cs).eouttot[y], 1.0)]);
    }

    // load_shape
    for (cs, time, share) in params.iter_by_cs_time(Parameter::OutputProfile) {
        let t = time_index(model, time);
        let cs_vars = vars.subprocess(cs);
        for y in 0..num_years {
            lp.add_eq(
                0.0,
                [(cs_vars.eouttime[y][t], 1.0), (cs_vars.eouttot[y], -share)],
            );
        }
    }

    // net_to_gen and net_to_con
    for (commodity, co_vars) in &vars.commodities {
        for (y, t) in iproduct!(0..num_years, 0..dataset.times().len()) {
            let mut gen_terms = vec![(co_vars.enetgen[y][t], 1.0)];
            let mut con_terms = vec![(co_vars.enetcons[y][t], 1.0)];
            for (cs, cs_vars) in &vars.subprocesses {
                if cs.output == *commodity {
                    gen_terms.push((cs_vars.eouttime[y][t], -1.0));
                }
                if cs.input == *commodity {
                    con_terms.push((cs_vars.eintime[y][t], -1.0));
                }
            }
            lp.add_eq(0.0, gen_terms);
            lp.add_eq(0.0, con_terms);
        }
    }
}

/// Add operating limits and the state-of-charge balance for storage.
///
/// The state of charge at the first timestep follows on from the last timestep of the same year,
/// so the representative timesteps are treated as a repeating cycle.
fn add_storage_constraints(lp: &mut LinearProgram, vars: &VariableMap, model: &Model) {
    let dataset = &model.dataset;
    let params = &model.parameters;
    let dt = params.scalar(Parameter::Dt);
    let num_times = dataset.times().len();

    for (cs, cs_vars) in &vars.subprocesses {
        let Some(storage) = &cs_vars.storage else {
            continue;
        };
        let charge_efficiency = params.by_cs(Parameter::EfficiencyCharge, cs);
        let efficiency = params.by_cs(Parameter::Efficiency, cs);
        let c_rate = params.by_cs(Parameter::CRate, cs);

        for y in 0..dataset.years().len() {
            for t in 0..num_times {
                // storage_energy_limit
                lp.add_le(
                    0.0,
                    [(storage.level[y][t], 1.0), (storage.level_max[y], -1.0)],
                );

                // charge_power_limit
                add_capacity_limit(lp, cs_vars.pin[y][t], cs_vars.cap_active[y], 1.0);

                // energy_balance
                let previous = previous_time_index(t, num_times);
                lp.add_eq(
                    0.0,
                    [
                        (storage.level[y][t], 1.0),
                        (storage.level[y][previous], -1.0),
                        (cs_vars.pin[y][t], -dt * charge_efficiency),
                        (cs_vars.pout[y][t], dt / efficiency),
                    ],
                );
            }

            // c_rate_relation
            lp.add_eq(
                0.0,
                [
                    (storage.level_max[y], 1.0),
                    (cs_vars.cap_active[y], -1.0 / c_rate),
                ],
            );
        }
    }
}

/// The position of the timestep before `t`, wrapping from the first to the last
pub fn previous_time_index(t: usize, num_times: usize) -> usize {
    (t + num_times - 1) % num_times
}

fn year_index(model: &Model, year: u32) -> usize {
    model
        .dataset
        .year_index(year)
        .expect("Parameter years should be validated")
}

fn time_index(model: &Model, time: u32) -> usize {
    model
        .dataset
        .time_index(time)
        .expect("Parameter times should be validated")
}
