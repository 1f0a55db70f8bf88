//! The attack model: a planning model extended with perturbations of one subprocess's availability.
//!
//! An attacker may raise or lower the availability profile of the attacked subprocess at each
//! timestep, within bounds and without changing its total availability, so as to force investment
//! in another subprocess above or below a threshold. The attack is found with the penalty
//! alternating direction method in [`padm`].
use crate::input::{input_err_msg, read_json};
use crate::model::Model;
use crate::output::OutputSink;
use crate::parameter::Parameter;
use crate::planning::PlanningModel;
use crate::planning::results::PlanningResults;
use crate::process::ConversionSubprocess;
use crate::solver::{CoefficientPatch, LpSolution, Row, Solver, Var};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Deserializer};
use std::path::Path;

pub mod dual;
pub mod padm;
use padm::{PadmController, PadmOutcome, PadmParams};

/// The direction of the limit on new capacity of the constrained subprocess
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inequality {
    /// Total new capacity must be at least the bound
    AtLeast,
    /// Total new capacity must be at most the bound
    AtMost,
}

/// Read an [`Inequality`] from one of `>`, `>=`, `<` or `<=`
fn deserialise_inequality<'de, D>(deserialiser: D) -> Result<Inequality, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(deserialiser)?;
    match value.trim() {
        ">" | ">=" => Ok(Inequality::AtLeast),
        "<" | "<=" => Ok(Inequality::AtMost),
        _ => Err(serde::de::Error::custom(
            "constrained_cs_ineq must be one of >, >=, <, <=",
        )),
    }
}

/// Parameters describing an attack
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AttackParams {
    /// The subprocess whose availability profile is perturbed
    pub attacked_cs: ConversionSubprocess,
    /// The subprocess whose total new capacity is limited
    pub constrained_cs: ConversionSubprocess,
    /// The limit on total new capacity when the limit is active
    pub constrained_cs_newval: f64,
    /// The limit on total new capacity when the limit is inactive
    pub constrained_cs_inactive: f64,
    /// The direction of the limit
    #[serde(deserialize_with = "deserialise_inequality")]
    pub constrained_cs_ineq: Inequality,
    /// Upper bound on the perturbation at each timestep
    pub upper_ub: f64,
    /// Lower bound on the perturbation at each timestep
    pub upper_lb: f64,
}

impl AttackParams {
    /// Check that the attack refers to the model's subprocesses and has sensible bounds
    pub fn validate(&self, model: &Model) -> Result<()> {
        let dataset = &model.dataset;
        dataset
            .check_subprocess(&self.attacked_cs)
            .context("Invalid attacked_cs")?;
        dataset
            .check_subprocess(&self.constrained_cs)
            .context("Invalid constrained_cs")?;
        ensure!(
            model
                .parameters
                .iter_by_cs_time(Parameter::AvailabilityProfile)
                .any(|(cs, _, _)| *cs == self.attacked_cs),
            "Attacked subprocess {} has no availability profile",
            self.attacked_cs
        );
        ensure!(
            self.upper_lb.is_finite() && self.upper_ub.is_finite(),
            "upper_lb and upper_ub must be finite"
        );
        ensure!(
            self.upper_lb <= self.upper_ub,
            "upper_lb must not be greater than upper_ub"
        );
        ensure!(
            self.constrained_cs_newval.is_finite() && self.constrained_cs_inactive.is_finite(),
            "constrained_cs_newval and constrained_cs_inactive must be finite"
        );

        Ok(())
    }
}

/// The contents of an attack configuration file
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AttackConfig {
    /// The attack to perform
    pub attack: AttackParams,
    /// Parameters for the solution algorithm
    pub padm: PadmParams,
}

impl AttackConfig {
    /// Read an attack configuration from a JSON file
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let config: AttackConfig = read_json(file_path)?;
        config
            .padm
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(config)
    }
}

/// Which right-hand side the limit on the constrained subprocess uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpperLimit {
    /// Use `constrained_cs_newval`
    Active,
    /// Use `constrained_cs_inactive`
    Inactive,
}

/// Values linking the attack model's objective to the dual model
#[derive(Clone, Debug, PartialEq)]
pub struct PenaltyTerms {
    /// The penalty weight
    pub mu: f64,
    /// Value of the dual model's base objective
    pub dual_value: f64,
    /// Multipliers of the attacked availability constraints, keyed by (year, time)
    pub lambda: IndexMap<(u32, u32), f64>,
    /// Active capacity of the attacked subprocess by year
    pub cap_active: IndexMap<u32, f64>,
}

/// The objective of an attack model
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectiveMode {
    /// Minimise total expenditure
    Totex,
    /// Minimise the size of the attack plus the penalised duality gap.
    ///
    /// The gap is `TOTEX - dual_value + sum(lambda * upper * cap_active * availability)`, where
    /// `lambda` are the non-negative multipliers of the upper bounds of the attacked availability
    /// constraints. Raising availability relaxes those constraints, so the dual objective falls by
    /// the last term and the gap grows by it.
    Penalised(PenaltyTerms),
}

/// A planning model with attack variables and constraints
#[derive(Clone, Debug)]
pub struct AttackModel {
    planning: PlanningModel,
    params: AttackParams,
    availability: IndexMap<u32, f64>,
    upper_vars: IndexMap<u32, Var>,
    upper_obj: Var,
    upper_cs_limit: Row,
}

impl AttackModel {
    /// Build the attack model.
    ///
    /// The limit on the constrained subprocess starts out active and the objective is to minimise
    /// total expenditure.
    pub fn new(model: &Model, params: &AttackParams) -> Result<Self> {
        params.validate(model)?;

        let mut planning = PlanningModel::new(model);
        let times = model.dataset.times().to_vec();
        let availability: IndexMap<_, _> = times
            .iter()
            .map(|&time| {
                let value = model.parameters.by_cs_time(
                    Parameter::AvailabilityProfile,
                    &params.attacked_cs,
                    time,
                );
                (time, value)
            })
            .collect();

        let constrained_cap_new = planning
            .variables()
            .subprocess(&params.constrained_cs)
            .cap_new
            .clone();
        let lp = planning.lp_mut();

        // Upper_vars, Upper_aux and Upper_obj
        let upper_vars: IndexMap<_, _> = times
            .iter()
            .map(|&time| (time, lp.add_var(params.upper_lb, params.upper_ub, 0.0)))
            .collect();
        let upper_aux: Vec<_> = times
            .iter()
            .map(|_| lp.add_var(0.0, f64::INFINITY, 0.0))
            .collect();
        let upper_obj = lp.add_var(0.0, f64::INFINITY, 0.0);

        // upper_pos_aux and upper_neg_aux
        for (&var, &aux) in upper_vars.values().zip(&upper_aux) {
            lp.add_ge(0.0, [(aux, 1.0), (var, -1.0)]);
            lp.add_ge(0.0, [(aux, 1.0), (var, 1.0)]);
        }

        // upper_obj
        let terms = upper_aux.iter().map(|&aux| (aux, -1.0));
        lp.add_ge(0.0, std::iter::once((upper_obj, 1.0)).chain(terms));

        // upper_sum
        let terms = upper_vars
            .iter()
            .map(|(time, &var)| (var, availability[time]));
        lp.add_eq(0.0, terms);

        // upper_cs_limit
        let terms = constrained_cap_new.into_iter().map(|var| (var, 1.0));
        let upper_cs_limit = lp.add_ge(f64::NEG_INFINITY, terms);

        let mut attack = Self {
            planning,
            params: params.clone(),
            availability,
            upper_vars,
            upper_obj,
            upper_cs_limit,
        };
        attack.set_upper_limit(UpperLimit::Active);

        Ok(attack)
    }

    /// The underlying planning model
    pub fn planning(&self) -> &PlanningModel {
        &self.planning
    }

    /// The attack parameters
    pub fn params(&self) -> &AttackParams {
        &self.params
    }

    /// Availability of the attacked subprocess at each time
    pub fn availability(&self) -> &IndexMap<u32, f64> {
        &self.availability
    }

    /// The perturbation variables, keyed by time
    pub fn upper_vars(&self) -> &IndexMap<u32, Var> {
        &self.upper_vars
    }

    /// Switch the limit on the constrained subprocess between its two right-hand sides
    pub fn set_upper_limit(&mut self, limit: UpperLimit) {
        let rhs = match limit {
            UpperLimit::Active => self.params.constrained_cs_newval,
            UpperLimit::Inactive => self.params.constrained_cs_inactive,
        };
        let (lower, upper) = match self.params.constrained_cs_ineq {
            Inequality::AtLeast => (rhs, f64::INFINITY),
            Inequality::AtMost => (f64::NEG_INFINITY, rhs),
        };
        self.planning
            .lp_mut()
            .set_row_bounds(self.upper_cs_limit, lower, upper);
    }

    /// Fix every perturbation to zero
    pub fn fix_upper_vars(&mut self) {
        for &var in self.upper_vars.values() {
            self.planning.lp_mut().set_var_bounds(var, 0.0, 0.0);
        }
    }

    /// Restore the bounds of the perturbations after [`AttackModel::fix_upper_vars`]
    pub fn release_upper_vars(&mut self) {
        let (lower, upper) = (self.params.upper_lb, self.params.upper_ub);
        for &var in self.upper_vars.values() {
            self.planning.lp_mut().set_var_bounds(var, lower, upper);
        }
    }

    /// Replace the objective
    pub fn set_objective(&mut self, mode: &ObjectiveMode) {
        let totex = self.planning.variables().totex;
        match mode {
            ObjectiveMode::Totex => self.planning.lp_mut().set_objective([(totex, 1.0)], 0.0),
            ObjectiveMode::Penalised(terms) => {
                let mut objective = vec![(self.upper_obj, 1.0), (totex, terms.mu)];
                for (&(year, time), &lambda) in &terms.lambda {
                    let coeff =
                        terms.mu * lambda * terms.cap_active[&year] * self.availability[&time];
                    objective.push((self.upper_vars[&time], coeff));
                }
                self.planning
                    .lp_mut()
                    .set_objective(objective, -terms.mu * terms.dual_value);
            }
        }
    }

    /// The rows of the availability constraints of the attacked subprocess
    fn re_availability(&self) -> impl Iterator<Item = (u32, u32, Row)> + '_ {
        self.planning.keys().re_availability[&self.params.attacked_cs]
            .iter()
            .map(|(&(year, time), &row)| (year, time, row))
    }

    /// Patches setting the coefficient of active capacity in the attacked availability constraints
    /// to `-availability * (1 + upper)`
    pub fn cap_active_patches(&self, upper: &IndexMap<u32, f64>) -> Vec<CoefficientPatch> {
        let cap_active = &self
            .planning
            .variables()
            .subprocess(&self.params.attacked_cs)
            .cap_active;
        let dataset = &self.planning.model().dataset;
        self.re_availability()
            .map(|(year, time, row)| {
                let y = dataset.year_index(year).expect("Year should be in dataset");
                CoefficientPatch {
                    row,
                    var: cap_active[y],
                    value: -self.availability[&time] * (1.0 + upper[&time]),
                }
            })
            .collect()
    }

    /// Patches setting the coefficient of the perturbations in the attacked availability
    /// constraints to `-cap_active * availability`
    pub fn upper_var_patches(&self, cap_active: &IndexMap<u32, f64>) -> Vec<CoefficientPatch> {
        self.re_availability()
            .map(|(year, time, row)| CoefficientPatch {
                row,
                var: self.upper_vars[&time],
                value: -cap_active[&year] * self.availability[&time],
            })
            .collect()
    }

    /// Apply coefficient patches to the underlying program
    pub fn apply_patches(&mut self, patches: &[CoefficientPatch]) -> Result<()> {
        for patch in patches {
            self.planning.lp_mut().apply_patch(patch)?;
        }

        Ok(())
    }

    /// Solve the problem
    pub fn solve(&self, solver: &dyn Solver) -> Result<LpSolution> {
        self.planning.solve(solver)
    }

    /// Values of the planning variables
    pub fn lower_values(&self, solution: &LpSolution) -> Vec<f64> {
        self.planning
            .variables()
            .iter()
            .map(|var| solution.value(var))
            .collect()
    }

    /// Values of the perturbations, keyed by time
    pub fn upper_values(&self, solution: &LpSolution) -> IndexMap<u32, f64> {
        self.upper_vars
            .iter()
            .map(|(&time, &var)| (time, solution.value(var)))
            .collect()
    }

    /// Value of the attack size variable
    pub fn upper_objective(&self, solution: &LpSolution) -> f64 {
        solution.value(self.upper_obj)
    }

    /// Total expenditure
    pub fn totex(&self, solution: &LpSolution) -> f64 {
        solution.value(self.planning.variables().totex)
    }

    /// Active capacity of the attacked subprocess by year
    pub fn cap_active_trace(&self, solution: &LpSolution) -> IndexMap<u32, f64> {
        let cap_active = &self
            .planning
            .variables()
            .subprocess(&self.params.attacked_cs)
            .cap_active;
        self.planning
            .model()
            .dataset
            .years()
            .iter()
            .zip(cap_active)
            .map(|(&year, &var)| (year, solution.value(var)))
            .collect()
    }

    /// Read the results, including the perturbations, from a solution
    pub fn results(&self, solution: &LpSolution) -> PlanningResults {
        let mut results = self.planning.results(solution);
        results.upper = self.upper_values(solution);
        results
    }
}

/// Search for an attack and write the results of the final attack model to `sink`
pub fn run_attack(
    model: &Model,
    config: &AttackConfig,
    solver: &dyn Solver,
    sink: &mut dyn OutputSink,
) -> Result<PadmOutcome> {
    info!(
        "Attacking availability of {} to limit new capacity of {}",
        config.attack.attacked_cs, config.attack.constrained_cs
    );
    let mut controller = PadmController::new(model, &config.attack, &config.padm, solver)?;
    let outcome = controller.run()?;
    sink.write_debug_info(controller.padm_model().planning(), &outcome.solution)?;
    outcome.results.write_to(sink)?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, attack_params, wind_model};
    use crate::solver::HighsSolver;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(">", Inequality::AtLeast)]
    #[case(">=", Inequality::AtLeast)]
    #[case("<", Inequality::AtMost)]
    #[case(" <= ", Inequality::AtMost)]
    fn test_deserialise_inequality(#[case] value: &str, #[case] expected: Inequality) {
        let json = format!("\"{value}\"");
        let mut de = serde_json::Deserializer::from_str(&json);
        assert_eq!(deserialise_inequality(&mut de).unwrap(), expected);
    }

    #[test]
    fn test_deserialise_inequality_invalid() {
        let mut de = serde_json::Deserializer::from_str("\"=\"");
        let err = deserialise_inequality(&mut de).unwrap_err();
        assert!(
            err.to_string()
                .contains("constrained_cs_ineq must be one of >, >=, <, <=")
        );
    }

    #[rstest]
    fn test_validate_ok(wind_model: Model, attack_params: AttackParams) {
        assert!(attack_params.validate(&wind_model).is_ok());
    }

    #[rstest]
    fn test_validate_unknown_subprocess(wind_model: Model, mut attack_params: AttackParams) {
        attack_params.constrained_cs = ConversionSubprocess::new("PP_Coal", "Dummy", "Electricity");
        assert_error!(
            attack_params.validate(&wind_model),
            "Invalid constrained_cs"
        );
    }

    #[rstest]
    fn test_validate_no_availability(wind_model: Model, mut attack_params: AttackParams) {
        attack_params.attacked_cs = attack_params.constrained_cs.clone();
        assert!(attack_params.validate(&wind_model).is_err());
    }

    #[rstest]
    fn test_validate_bad_bounds(wind_model: Model, mut attack_params: AttackParams) {
        attack_params.upper_lb = 0.5;
        attack_params.upper_ub = -0.5;
        assert_error!(
            attack_params.validate(&wind_model),
            "upper_lb must not be greater than upper_ub"
        );
    }

    #[rstest]
    fn test_set_upper_limit(wind_model: Model, attack_params: AttackParams) {
        let mut attack = AttackModel::new(&wind_model, &attack_params).unwrap();
        let row = attack.planning().lp().row(attack.upper_cs_limit).clone();
        assert_eq!(row.lower, attack_params.constrained_cs_newval);
        assert_eq!(row.upper, f64::INFINITY);

        attack.set_upper_limit(UpperLimit::Inactive);
        let row = attack.planning().lp().row(attack.upper_cs_limit);
        assert_eq!(row.lower, attack_params.constrained_cs_inactive);
    }

    #[rstest]
    fn test_cap_active_patches(wind_model: Model, attack_params: AttackParams) {
        let attack = AttackModel::new(&wind_model, &attack_params).unwrap();
        let upper = attack
            .upper_vars()
            .keys()
            .map(|&time| (time, 0.5))
            .collect();
        let patches = attack.cap_active_patches(&upper);
        assert_eq!(
            patches.len(),
            wind_model.dataset.years().len() * wind_model.dataset.times().len()
        );
        for patch in patches {
            let availability = attack.planning().lp().coefficient(patch.row, patch.var);
            assert_approx_eq!(f64, patch.value, 1.5 * availability);
        }
    }

    #[rstest]
    fn test_upper_var_patches(wind_model: Model, attack_params: AttackParams) {
        let mut attack = AttackModel::new(&wind_model, &attack_params).unwrap();
        let cap_active = wind_model
            .dataset
            .years()
            .iter()
            .map(|&year| (year, 10.0))
            .collect();
        let patches = attack.upper_var_patches(&cap_active);
        attack.apply_patches(&patches).unwrap();
        for patch in &patches {
            let time = attack
                .upper_vars()
                .iter()
                .find(|(_, var)| **var == patch.var)
                .map(|(time, _)| *time)
                .unwrap();
            assert_approx_eq!(
                f64,
                attack.planning().lp().coefficient(patch.row, patch.var),
                -10.0 * attack.availability()[&time]
            );
        }
    }

    #[rstest]
    fn test_zero_sum_and_tight_aux(wind_model: Model, attack_params: AttackParams) {
        let mut attack = AttackModel::new(&wind_model, &attack_params).unwrap();
        // Reward perturbations at the first time so that some attack is chosen
        let (&first_time, &first) = attack.upper_vars().first().unwrap();
        let upper_obj = attack.upper_obj;
        attack
            .planning
            .lp_mut()
            .set_objective([(first, -1.0), (upper_obj, 0.1)], 0.0);
        attack.set_upper_limit(UpperLimit::Inactive);
        let solution = attack.solve(&HighsSolver).unwrap();

        let upper = attack.upper_values(&solution);
        let total: f64 = upper
            .iter()
            .map(|(time, value)| value * attack.availability()[time])
            .sum();
        assert_approx_eq!(f64, total, 0.0, epsilon = 1e-6);
        assert_approx_eq!(
            f64,
            upper[&first_time],
            attack_params.upper_ub,
            epsilon = 1e-6
        );

        let size: f64 = upper.values().map(|value| value.abs()).sum();
        assert_approx_eq!(f64, attack.upper_objective(&solution), size, epsilon = 1e-6);
    }
}
