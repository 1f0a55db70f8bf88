//! The capacity expansion planning model.
//!
//! Investment and dispatch decisions for every conversion subprocess are optimised jointly over
//! all years and representative timesteps, minimising total expenditure.
use crate::model::Model;
use crate::output::OutputSink;
use crate::solver::{LinearProgram, LpSolution, Sense, Solver};
use anyhow::{Context, Result};
use log::info;

pub mod constraints;
pub mod results;
pub mod variables;
use constraints::{ConstraintKeys, add_constraints};
use results::PlanningResults;
use variables::VariableMap;

/// A planning problem built for a particular model.
///
/// The problem owns its own copy of the model, so that changes made to one problem can never
/// affect another.
#[derive(Clone, Debug)]
pub struct PlanningModel {
    model: Model,
    lp: LinearProgram,
    variables: VariableMap,
    keys: ConstraintKeys,
}

impl PlanningModel {
    /// Build the planning problem for `model`, with an objective of minimising total expenditure
    pub fn new(model: &Model) -> Self {
        let model = model.clone();
        let mut lp = LinearProgram::new(Sense::Minimise);
        let variables = VariableMap::new(&mut lp, &model.dataset);
        let keys = add_constraints(&mut lp, &variables, &model);
        lp.set_objective([(variables.totex, 1.0)], 0.0);

        Self {
            model,
            lp,
            variables,
            keys,
        }
    }

    /// The model this problem was built from
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The underlying linear program
    pub fn lp(&self) -> &LinearProgram {
        &self.lp
    }

    /// The underlying linear program, for extending or modifying the problem
    pub fn lp_mut(&mut self) -> &mut LinearProgram {
        &mut self.lp
    }

    /// The decision variables
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Keys for constraints which may be changed after the problem is built
    pub fn keys(&self) -> &ConstraintKeys {
        &self.keys
    }

    /// Solve the problem
    pub fn solve(&self, solver: &dyn Solver) -> Result<LpSolution> {
        solver.solve(&self.lp)
    }

    /// Read the results of the planning model from a solution
    pub fn results(&self, solution: &LpSolution) -> PlanningResults {
        PlanningResults::new(solution, &self.variables, &self.model.dataset)
    }
}

/// Build and solve the planning model, writing the results to `sink`
pub fn run_planning(
    model: &Model,
    solver: &dyn Solver,
    sink: &mut dyn OutputSink,
) -> Result<PlanningResults> {
    let planning = PlanningModel::new(model);
    info!(
        "Built planning model with {} variables and {} constraints",
        planning.lp().num_vars(),
        planning.lp().num_rows()
    );

    let solution = planning
        .solve(solver)
        .context("Failed to solve planning model")?;
    sink.write_debug_info(&planning, &solution)?;
    let results = planning.results(&solution);
    info!("Total expenditure: {}", results.totex);
    results.write_to(sink)?;

    Ok(results)
}
