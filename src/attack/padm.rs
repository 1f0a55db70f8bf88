//! The penalty alternating direction method (PADM) for finding attacks.
//!
//! Three attack models and the dual of the planning model are solved in turn:
//!
//! * `primal` is solved twice per middle iteration, once with the limit on the constrained
//!   subprocess inactive and once with it active, using the current perturbations as fixed data.
//!   The gap between the two total expenditures measures how far the attack is from succeeding.
//! * `padm` chooses perturbations, minimising their size plus a penalty on the duality gap, using
//!   the active capacity from `primal` as fixed data.
//! * `dual` is re-solved after each `padm` solve with the perturbations fixed. It is the dual of
//!   the planning model alone, without the attack variables or the limit on the constrained
//!   subprocess.
use super::dual::{DualModel, DualSolution};
use super::{AttackModel, AttackParams, ObjectiveMode, PenaltyTerms, UpperLimit};
use crate::model::Model;
use crate::planning::PlanningModel;
use crate::planning::results::PlanningResults;
use crate::solver::{LpSolution, Solver};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters controlling the PADM iterations
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PadmParams {
    /// Initial weight of the duality gap penalty
    pub initial_mu: f64,
    /// Factor by which the penalty weight grows after each outer iteration
    pub increase_factor: f64,
    /// Maximum number of outer iterations
    pub max_penalty_iter: u32,
    /// Maximum number of middle and inner iterations
    pub max_stationary_iter: u32,
    /// Tolerance below which successive solutions are considered unchanged
    pub stationary_error: f64,
    /// Tolerance on the gap between the active and inactive total expenditure
    pub penalty_error: f64,
}

impl PadmParams {
    /// Check that the parameters are valid
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.initial_mu.is_finite() && self.initial_mu > 0.0,
            "initial_mu must be a finite number greater than zero"
        );
        ensure!(
            self.increase_factor.is_finite() && self.increase_factor >= 1.0,
            "increase_factor must be a finite number of at least one"
        );
        ensure!(self.max_penalty_iter > 0, "max_penalty_iter cannot be zero");
        ensure!(
            self.max_stationary_iter > 0,
            "max_stationary_iter cannot be zero"
        );
        ensure!(
            self.stationary_error >= 0.0,
            "stationary_error cannot be negative"
        );
        ensure!(self.penalty_error >= 0.0, "penalty_error cannot be negative");

        Ok(())
    }
}

/// Active capacity of the attacked subprocess at the end of a middle loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapActiveRecord {
    /// With the limit inactive
    pub dual: BTreeMap<u32, f64>,
    /// With the limit active
    pub primal: BTreeMap<u32, f64>,
}

/// Objective values at the end of a middle loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRecord {
    /// Size of the attack
    pub upper: f64,
    /// Total expenditure with the limit active
    pub primal: f64,
    /// Total expenditure with the limit inactive
    pub dual: f64,
}

/// The history of a PADM run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmTrace {
    /// Active capacity of the attacked subprocess, one entry per outer iteration
    pub cap_active: Vec<CapActiveRecord>,
    /// Objective values, one entry per outer iteration
    pub obj: Vec<ObjectiveRecord>,
    /// Penalty weight used in each outer iteration
    pub mu: Vec<f64>,
    /// Whether the gap closed to within `penalty_error`
    pub converged: bool,
}

impl AlgorithmTrace {
    fn record(
        &mut self,
        cap_active_dual: &IndexMap<u32, f64>,
        cap_active_primal: &IndexMap<u32, f64>,
        obj: ObjectiveRecord,
    ) {
        self.cap_active.push(CapActiveRecord {
            dual: cap_active_dual.iter().map(|(&k, &v)| (k, v)).collect(),
            primal: cap_active_primal.iter().map(|(&k, &v)| (k, v)).collect(),
        });
        self.obj.push(obj);
    }
}

/// The result of a PADM run
#[derive(Clone, Debug)]
pub struct PadmOutcome {
    /// Results of the final `padm` solution, including the perturbations
    pub results: PlanningResults,
    /// The final `padm` solution
    pub solution: LpSolution,
    /// History of the run
    pub trace: AlgorithmTrace,
}

/// The largest absolute difference between corresponding values
pub fn max_difference<'a, I, J>(a: I, b: J) -> f64
where
    I: IntoIterator<Item = &'a f64>,
    J: IntoIterator<Item = &'a f64>,
{
    a.into_iter()
        .zip_eq(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Values from the `primal` model at the end of a middle iteration
struct LowerLevel {
    cap_active_dual: IndexMap<u32, f64>,
    cap_active_primal: IndexMap<u32, f64>,
    dual_obj: f64,
    primal_obj: f64,
}

/// Runs the PADM iterations
pub struct PadmController<'a> {
    params: &'a PadmParams,
    solver: &'a dyn Solver,
    primal: AttackModel,
    padm: AttackModel,
    dual: DualModel,
}

impl<'a> PadmController<'a> {
    /// Build the models used by the algorithm
    pub fn new(
        model: &Model,
        attack: &AttackParams,
        params: &'a PadmParams,
        solver: &'a dyn Solver,
    ) -> Result<Self> {
        params.validate()?;
        let primal = AttackModel::new(model, attack)?;
        let padm = AttackModel::new(model, attack)?;
        let dual = DualModel::build(&PlanningModel::new(model), &attack.attacked_cs)?;
        info!(
            "Built dual model with {} variables and {} constraints",
            dual.lp().num_vars(),
            dual.lp().num_rows()
        );

        Ok(Self {
            params,
            solver,
            primal,
            padm,
            dual,
        })
    }

    /// Solve `primal` with the limit inactive and then active, for the given perturbations
    fn solve_lower_level(&mut self, upper: &IndexMap<u32, f64>) -> Result<LowerLevel> {
        let patches = self.primal.cap_active_patches(upper);
        self.primal.apply_patches(&patches)?;

        self.primal.set_upper_limit(UpperLimit::Inactive);
        let inactive = self
            .primal
            .solve(self.solver)
            .context("Failed to solve model with inactive limit")?;
        let dual_obj = self.primal.totex(&inactive);
        debug!("Inactive limit objective: {dual_obj}");

        self.primal.set_upper_limit(UpperLimit::Active);
        let active = self
            .primal
            .solve(self.solver)
            .context("Failed to solve model with active limit")?;
        let primal_obj = self.primal.totex(&active);
        debug!("Active limit objective: {primal_obj}");

        Ok(LowerLevel {
            cap_active_dual: self.primal.cap_active_trace(&inactive),
            cap_active_primal: self.primal.cap_active_trace(&active),
            dual_obj,
            primal_obj,
        })
    }

    fn solve_padm(&self) -> Result<LpSolution> {
        self.padm
            .solve(self.solver)
            .context("Failed to solve penalised attack model")
    }

    /// The model which chooses the perturbations
    pub fn padm_model(&self) -> &AttackModel {
        &self.padm
    }

    /// Solve `padm` and `dual` with no perturbations
    fn solve_unperturbed(&mut self) -> Result<(LpSolution, DualSolution)> {
        self.padm.fix_upper_vars();
        self.padm.set_objective(&ObjectiveMode::Totex);
        let padm_solution = self.solve_padm()?;
        self.dual.set_base_objective();
        let dual_solution = self.dual.solve(self.solver)?;
        self.padm.release_upper_vars();

        Ok((padm_solution, dual_solution))
    }

    /// Run the algorithm until the gap closes or the iteration limits are reached.
    ///
    /// Reaching an iteration limit is not an error: the last solution is returned and the trace
    /// is marked as not converged.
    pub fn run(&mut self) -> Result<PadmOutcome> {
        let params = self.params;
        let (mut padm_solution, mut dual_solution) = self.solve_unperturbed()?;
        info!(
            "Initial primal objective: {}, dual objective: {}",
            self.padm.totex(&padm_solution),
            dual_solution.objective
        );

        let mut primal_values = self.padm.lower_values(&padm_solution);
        let mut dual_values = dual_solution.values.clone();
        let mut upper_values = self.padm.upper_values(&padm_solution);

        let mut mu = params.initial_mu;
        let mut primal_obj = f64::INFINITY;
        let mut dual_obj = f64::NEG_INFINITY;
        let mut trace = AlgorithmTrace::default();
        let mut i = 0;
        while (primal_obj - dual_obj).abs() > params.penalty_error && i < params.max_penalty_iter
        {
            i += 1;
            info!("Outer iteration {i} (mu = {mu})");
            trace.mu.push(mu);

            let mut old_upper_values: Option<IndexMap<u32, f64>> = None;
            for j in 1.. {
                let stationary = old_upper_values.as_ref().is_some_and(|old| {
                    max_difference(upper_values.values(), old.values()) < params.stationary_error
                });
                old_upper_values = Some(upper_values.clone());
                debug!("Middle iteration {j}");

                let lower = self.solve_lower_level(&upper_values)?;
                primal_obj = lower.primal_obj;
                dual_obj = lower.dual_obj;
                info!("Active limit objective: {primal_obj}, inactive: {dual_obj}");

                let gap_closed = (primal_obj - dual_obj).abs() < params.penalty_error;
                if stationary || gap_closed || j >= params.max_stationary_iter {
                    trace.record(
                        &lower.cap_active_dual,
                        &lower.cap_active_primal,
                        ObjectiveRecord {
                            upper: self.padm.upper_objective(&padm_solution),
                            primal: primal_obj,
                            dual: dual_obj,
                        },
                    );
                    break;
                }

                let patches = self.padm.upper_var_patches(&lower.cap_active_primal);
                self.padm.apply_patches(&patches)?;

                for k in 1.. {
                    self.padm
                        .set_objective(&ObjectiveMode::Penalised(PenaltyTerms {
                            mu,
                            dual_value: dual_solution.base_objective,
                            lambda: dual_solution.lambda.clone(),
                            cap_active: lower.cap_active_dual.clone(),
                        }));
                    padm_solution = self.solve_padm()?;
                    let new_primal_values = self.padm.lower_values(&padm_solution);
                    let new_upper_values = self.padm.upper_values(&padm_solution);
                    debug!(
                        "Inner iteration {k}: attack size {}, totex {}",
                        self.padm.upper_objective(&padm_solution),
                        self.padm.totex(&padm_solution)
                    );

                    self.dual.set_linked_objective(
                        &new_upper_values,
                        &lower.cap_active_dual,
                        self.padm.availability(),
                    );
                    dual_solution = self.dual.solve(self.solver)?;
                    debug!("Inner iteration {k}: dual objective {}", dual_solution.objective);

                    let primal_diff = max_difference(&primal_values, &new_primal_values);
                    let dual_diff = max_difference(&dual_values, &dual_solution.values);
                    let upper_diff =
                        max_difference(upper_values.values(), new_upper_values.values());
                    let diff = primal_diff.max(dual_diff).max(upper_diff);
                    debug!(
                        "Inner iteration {k}: primal diff {primal_diff}, dual diff {dual_diff}, \
                        upper diff {upper_diff}"
                    );

                    primal_values = new_primal_values;
                    dual_values.clone_from(&dual_solution.values);
                    upper_values = new_upper_values;
                    if diff < params.stationary_error || k >= params.max_stationary_iter {
                        break;
                    }
                }
            }

            mu *= params.increase_factor;
        }

        trace.converged = (primal_obj - dual_obj).abs() <= params.penalty_error;
        if trace.converged {
            info!("Attack found after {i} outer iterations");
        } else {
            warn!(
                "Gap of {} remains after {i} outer iterations",
                (primal_obj - dual_obj).abs()
            );
        }

        Ok(PadmOutcome {
            results: self.padm.results(&padm_solution),
            solution: padm_solution,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, attack_params, padm_params, wind_model};
    use crate::solver::HighsSolver;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_validate(padm_params: PadmParams) {
        assert!(padm_params.validate().is_ok());
    }

    #[rstest]
    fn test_validate_invalid(mut padm_params: PadmParams) {
        padm_params.increase_factor = 0.5;
        assert_error!(
            padm_params.validate(),
            "increase_factor must be a finite number of at least one"
        );
        padm_params.increase_factor = 2.0;
        padm_params.max_penalty_iter = 0;
        assert_error!(padm_params.validate(), "max_penalty_iter cannot be zero");
    }

    #[test]
    fn test_max_difference() {
        assert_eq!(max_difference(&[1.0, 2.0], &[1.5, 0.0]), 2.0);
        assert_eq!(max_difference(&[] as &[f64], &[]), 0.0);
    }

    #[rstest]
    fn test_run_mu_grows(
        wind_model: Model,
        attack_params: AttackParams,
        mut padm_params: PadmParams,
    ) {
        padm_params.max_penalty_iter = 3;
        padm_params.penalty_error = 0.0;
        let mut controller =
            PadmController::new(&wind_model, &attack_params, &padm_params, &HighsSolver).unwrap();
        let outcome = controller.run().unwrap();

        let mu = &outcome.trace.mu;
        assert!(!mu.is_empty());
        assert_approx_eq!(f64, mu[0], padm_params.initial_mu);
        assert!(mu.iter().tuple_windows().all(|(a, b)| b >= a));
        assert_eq!(outcome.trace.obj.len(), mu.len());
        assert_eq!(outcome.trace.cap_active.len(), mu.len());
        assert_eq!(outcome.results.upper.len(), wind_model.dataset.times().len());
    }

    #[rstest]
    fn test_unperturbed_dual_ignores_limit(
        wind_model: Model,
        attack_params: AttackParams,
        padm_params: PadmParams,
    ) {
        let planning = PlanningModel::new(&wind_model);
        let planning_totex = planning
            .solve(&HighsSolver)
            .unwrap()
            .value(planning.variables().totex);

        let mut controller =
            PadmController::new(&wind_model, &attack_params, &padm_params, &HighsSolver).unwrap();
        let (padm_solution, dual_solution) = controller.solve_unperturbed().unwrap();

        // The dual gives the optimum of the planning model without the limit on gas
        assert_approx_eq!(
            f64,
            dual_solution.base_objective,
            planning_totex,
            epsilon = 1e-6
        );

        // Forcing 200 units of new gas capacity costs more
        let limited_totex = controller.padm_model().totex(&padm_solution);
        assert!(limited_totex > planning_totex + 1.0);
    }

    #[rstest]
    fn test_run_finds_perturbation(
        wind_model: Model,
        attack_params: AttackParams,
        mut padm_params: PadmParams,
    ) {
        // A heavy penalty makes changes to the availability profile worth their cost
        padm_params.initial_mu = 100.0;
        padm_params.max_penalty_iter = 1;
        padm_params.max_stationary_iter = 2;
        let mut controller =
            PadmController::new(&wind_model, &attack_params, &padm_params, &HighsSolver).unwrap();
        let outcome = controller.run().unwrap();

        let obj = &outcome.trace.obj[0];
        assert!(obj.primal > obj.dual);
        assert!(!outcome.trace.converged);
        assert!(outcome.results.upper.values().any(|value| value.abs() > 1e-6));
    }
}
