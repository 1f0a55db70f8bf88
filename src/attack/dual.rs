//! The dual of the planning model.
//!
//! The dual is built mechanically from the rows and columns of the planning program. Each row
//! contributes one multiplier per finite bound (a single free multiplier for equalities) and each
//! column contributes one dual constraint. The multipliers of the attacked subprocess's
//! availability constraints are recorded by (year, time) when the dual is built.
use crate::planning::PlanningModel;
use crate::process::ConversionSubprocess;
use crate::solver::{LinearProgram, LpSolution, Sense, Solver, Var};
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// The dual of a planning model
#[derive(Clone, Debug)]
pub struct DualModel {
    lp: LinearProgram,
    base_objective: Vec<(Var, f64)>,
    lambda: IndexMap<(u32, u32), Var>,
}

/// The values obtained by solving a [`DualModel`]
#[derive(Clone, Debug, PartialEq)]
pub struct DualSolution {
    /// Value of the current objective
    pub objective: f64,
    /// Value of the objective without any terms linking it to the attack
    pub base_objective: f64,
    /// Multipliers of the attacked availability constraints, keyed by (year, time)
    pub lambda: IndexMap<(u32, u32), f64>,
    /// Values of every dual variable
    pub values: Vec<f64>,
}

/// Multipliers for the lower and upper bounds of a single row or column
#[derive(Clone, Copy, Debug, Default)]
struct BoundMultipliers {
    lower: Option<Var>,
    upper: Option<Var>,
}

impl DualModel {
    /// Build the dual of `planning`.
    ///
    /// # Arguments
    ///
    /// * `planning` - The planning model to dualise
    /// * `attacked_cs` - The subprocess whose availability multipliers are tracked
    pub fn build(planning: &PlanningModel, attacked_cs: &ConversionSubprocess) -> Result<Self> {
        let primal = planning.lp();
        let mut lp = LinearProgram::new(Sense::Maximise);
        let mut base_objective = Vec::new();

        // One or two multipliers per row
        let mut row_vars = Vec::with_capacity(primal.num_rows());
        for (_, row) in primal.iter_rows() {
            let multipliers = if row.is_equality() {
                let var = lp.add_var(f64::NEG_INFINITY, f64::INFINITY, 0.0);
                base_objective.push((var, row.lower));
                BoundMultipliers {
                    lower: Some(var),
                    upper: None,
                }
            } else {
                let lower = row.lower.is_finite().then(|| {
                    let var = lp.add_var(0.0, f64::INFINITY, 0.0);
                    base_objective.push((var, row.lower));
                    var
                });
                let upper = row.upper.is_finite().then(|| {
                    let var = lp.add_var(0.0, f64::INFINITY, 0.0);
                    base_objective.push((var, -row.upper));
                    var
                });
                BoundMultipliers { lower, upper }
            };
            row_vars.push(multipliers);
        }

        // Transpose the constraint matrix
        let mut column_terms: Vec<Vec<(Var, f64)>> = vec![Vec::new(); primal.num_vars()];
        for ((_, row), multipliers) in primal.iter_rows().zip(&row_vars) {
            for (var, &coeff) in &row.terms {
                let terms = &mut column_terms[var.index()];
                if let Some(lower) = multipliers.lower {
                    terms.push((lower, coeff));
                }
                if let Some(upper) = multipliers.upper {
                    terms.push((upper, -coeff));
                }
            }
        }

        // One dual constraint per column
        for ((_, column), mut terms) in primal.iter_columns().zip(column_terms) {
            if column.lower == 0.0 && column.upper == f64::INFINITY {
                lp.add_le(column.cost, terms);
                continue;
            }
            if column.lower.is_finite() {
                let var = lp.add_var(0.0, f64::INFINITY, 0.0);
                base_objective.push((var, column.lower));
                terms.push((var, 1.0));
            }
            if column.upper.is_finite() {
                let var = lp.add_var(0.0, f64::INFINITY, 0.0);
                base_objective.push((var, -column.upper));
                terms.push((var, -1.0));
            }
            lp.add_eq(column.cost, terms);
        }

        let rows = planning
            .keys()
            .re_availability
            .get(attacked_cs)
            .with_context(|| format!("No availability constraints found for {attacked_cs}"))?;
        let lambda = rows
            .iter()
            .map(|(&key, &row)| {
                let var = row_vars[row.index()]
                    .upper
                    .expect("Availability constraints should have an upper bound");
                (key, var)
            })
            .collect();

        let mut dual = Self {
            lp,
            base_objective,
            lambda,
        };
        dual.set_base_objective();

        Ok(dual)
    }

    /// The underlying linear program
    pub fn lp(&self) -> &LinearProgram {
        &self.lp
    }

    /// The multipliers of the attacked availability constraints, keyed by (year, time)
    pub fn lambda(&self) -> &IndexMap<(u32, u32), Var> {
        &self.lambda
    }

    /// Use the dual objective of the unperturbed planning model
    pub fn set_base_objective(&mut self) {
        self.lp.set_objective(self.base_objective.iter().copied(), 0.0);
    }

    /// Add the terms for a fixed perturbation to the base objective.
    ///
    /// Each multiplier gains the coefficient `-upper(t) * cap_active(y) * availability(t)`.
    pub fn set_linked_objective(
        &mut self,
        upper: &IndexMap<u32, f64>,
        cap_active: &IndexMap<u32, f64>,
        availability: &IndexMap<u32, f64>,
    ) {
        let linked = self.lambda.iter().map(|(&(year, time), &var)| {
            (var, -upper[&time] * cap_active[&year] * availability[&time])
        });
        let objective = self
            .base_objective
            .iter()
            .copied()
            .chain(linked)
            .collect::<Vec<_>>();
        self.lp.set_objective(objective, 0.0);
    }

    /// Solve the dual
    pub fn solve(&self, solver: &dyn Solver) -> Result<DualSolution> {
        let solution = solver.solve(&self.lp).context("Failed to solve dual model")?;
        Ok(self.read_solution(&solution))
    }

    fn read_solution(&self, solution: &LpSolution) -> DualSolution {
        DualSolution {
            objective: solution.objective(),
            base_objective: solution.evaluate(&self.base_objective),
            lambda: self
                .lambda
                .iter()
                .map(|(&key, &var)| (key, solution.value(var)))
                .collect(),
            values: solution.columns().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::wind_model;
    use crate::model::Model;
    use crate::solver::HighsSolver;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn wind() -> ConversionSubprocess {
        ConversionSubprocess::new("PP_Wind", "Dummy", "Electricity")
    }

    #[rstest]
    fn test_strong_duality(wind_model: Model) {
        let planning = PlanningModel::new(&wind_model);
        let primal = planning.solve(&HighsSolver).unwrap();
        let dual = DualModel::build(&planning, &wind()).unwrap();
        let solution = dual.solve(&HighsSolver).unwrap();

        let totex = primal.value(planning.variables().totex);
        assert!(totex > 0.0);
        assert_approx_eq!(f64, solution.objective, totex, epsilon = 1e-6);
        assert_approx_eq!(f64, solution.base_objective, totex, epsilon = 1e-6);
    }

    #[rstest]
    fn test_lambda_keys(wind_model: Model) {
        let planning = PlanningModel::new(&wind_model);
        let dual = DualModel::build(&planning, &wind()).unwrap();
        let expected = &planning.keys().re_availability[&wind()];
        assert!(dual.lambda().keys().eq(expected.keys()));
        let solution = dual.solve(&HighsSolver).unwrap();
        assert!(solution.lambda.values().all(|&value| value >= 0.0));
    }

    #[rstest]
    fn test_build_no_availability(wind_model: Model) {
        let planning = PlanningModel::new(&wind_model);
        let cs = ConversionSubprocess::new("Demand", "Electricity", "Dummy");
        assert!(DualModel::build(&planning, &cs).is_err());
    }

    #[rstest]
    fn test_set_linked_objective(wind_model: Model) {
        let planning = PlanningModel::new(&wind_model);
        let mut dual = DualModel::build(&planning, &wind()).unwrap();
        let (&(year, time), &var) = dual.lambda().first().unwrap();
        let upper = [(time, 0.5)].into_iter().collect();
        let cap_active = [(year, 2.0)].into_iter().collect();
        let availability = [(time, 0.4)].into_iter().collect();

        // Only use one multiplier
        dual.lambda.truncate(1);
        dual.set_linked_objective(&upper, &cap_active, &availability);
        let base = dual
            .base_objective
            .iter()
            .filter(|(other, _)| *other == var)
            .map(|(_, coeff)| coeff)
            .sum::<f64>();
        assert_approx_eq!(f64, dual.lp().column(var).cost, base - 0.4);
    }
}
