//! Provides data structures and functions for performing optimisation.
//!
//! Models are assembled as a solver-independent [`LinearProgram`], which records the handle of
//! every variable and constraint so that individual coefficients can be changed between solves.
//! The program is only translated into a solver's own representation when it is solved.
use anyhow::{Result, anyhow, ensure};
use highs::{HighsModelStatus, RowProblem};
use indexmap::IndexMap;
use std::fmt;

/// A decision variable in a [`LinearProgram`].
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    /// Position of the variable in the program's columns
    pub fn index(self) -> usize {
        self.0
    }
}

/// A constraint in a [`LinearProgram`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Row(usize);

impl Row {
    /// Position of the constraint in the program's rows
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether the objective is to be minimised or maximised
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    /// Minimise the objective
    Minimise,
    /// Maximise the objective
    Maximise,
}

impl From<Sense> for highs::Sense {
    fn from(sense: Sense) -> Self {
        match sense {
            Sense::Minimise => highs::Sense::Minimise,
            Sense::Maximise => highs::Sense::Maximise,
        }
    }
}

/// The definition of a variable to be optimised
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// The coefficient of the variable in the objective
    pub cost: f64,
    /// The variable's minimum value
    pub lower: f64,
    /// The variable's maximum value
    pub upper: f64,
}

/// A constraint of the form:
///
/// lower <= a1*x1 + a2*x2 + ... <= upper
///
/// Often, constraints will impose only a lower or an upper bound, with the other set to infinity
/// or minus infinity.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// The minimum value for the constraint
    pub lower: f64,
    /// The maximum value for the constraint
    pub upper: f64,
    /// Non-zero coefficients keyed by variable
    pub terms: IndexMap<Var, f64>,
}

impl Constraint {
    /// Whether the constraint is an equality
    #[allow(clippy::float_cmp)]
    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }
}

/// A change to a single coefficient of a constraint
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoefficientPatch {
    /// The constraint to change
    pub row: Row,
    /// The variable whose coefficient changes
    pub var: Var,
    /// The new coefficient
    pub value: f64,
}

impl fmt::Display for CoefficientPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} var {} -> {}",
            self.row.0, self.var.0, self.value
        )
    }
}

/// A linear program with continuous variables
#[derive(Clone, Debug, PartialEq)]
pub struct LinearProgram {
    sense: Sense,
    columns: Vec<Column>,
    rows: Vec<Constraint>,
    offset: f64,
}

impl LinearProgram {
    /// Create an empty program
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            columns: Vec::new(),
            rows: Vec::new(),
            offset: 0.0,
        }
    }

    /// Whether the objective is minimised or maximised
    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// Number of variables
    pub fn num_vars(&self) -> usize {
        self.columns.len()
    }

    /// Number of constraints
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Add a variable with the given bounds and objective coefficient
    pub fn add_var(&mut self, lower: f64, upper: f64, cost: f64) -> Var {
        self.columns.push(Column { cost, lower, upper });
        Var(self.columns.len() - 1)
    }

    /// Add a constraint `lower <= sum(terms) <= upper`.
    ///
    /// Repeated variables have their coefficients summed.
    pub fn add_row<I>(&mut self, lower: f64, upper: f64, terms: I) -> Row
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        let mut row_terms = IndexMap::new();
        for (var, coeff) in terms {
            *row_terms.entry(var).or_insert(0.0) += coeff;
        }
        self.rows.push(Constraint {
            lower,
            upper,
            terms: row_terms,
        });
        Row(self.rows.len() - 1)
    }

    /// Add the constraint `sum(terms) == rhs`
    pub fn add_eq<I>(&mut self, rhs: f64, terms: I) -> Row
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        self.add_row(rhs, rhs, terms)
    }

    /// Add the constraint `sum(terms) <= rhs`
    pub fn add_le<I>(&mut self, rhs: f64, terms: I) -> Row
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        self.add_row(f64::NEG_INFINITY, rhs, terms)
    }

    /// Add the constraint `sum(terms) >= rhs`
    pub fn add_ge<I>(&mut self, rhs: f64, terms: I) -> Row
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        self.add_row(rhs, f64::INFINITY, terms)
    }

    /// The definition of a variable
    pub fn column(&self, var: Var) -> &Column {
        &self.columns[var.0]
    }

    /// The definition of a constraint
    pub fn row(&self, row: Row) -> &Constraint {
        &self.rows[row.0]
    }

    /// Iterate over all variables
    pub fn iter_columns(&self) -> impl Iterator<Item = (Var, &Column)> {
        self.columns.iter().enumerate().map(|(i, col)| (Var(i), col))
    }

    /// Iterate over all constraints
    pub fn iter_rows(&self) -> impl Iterator<Item = (Row, &Constraint)> {
        self.rows.iter().enumerate().map(|(i, row)| (Row(i), row))
    }

    /// Change the bounds of a variable
    pub fn set_var_bounds(&mut self, var: Var, lower: f64, upper: f64) {
        let column = &mut self.columns[var.0];
        column.lower = lower;
        column.upper = upper;
    }

    /// Change the bounds of a constraint
    pub fn set_row_bounds(&mut self, row: Row, lower: f64, upper: f64) {
        let constraint = &mut self.rows[row.0];
        constraint.lower = lower;
        constraint.upper = upper;
    }

    /// Replace the objective with `sum(terms) + offset`.
    ///
    /// Variables which do not appear in `terms` get an objective coefficient of zero.
    pub fn set_objective<I>(&mut self, terms: I, offset: f64)
    where
        I: IntoIterator<Item = (Var, f64)>,
    {
        for column in &mut self.columns {
            column.cost = 0.0;
        }
        for (var, coeff) in terms {
            self.columns[var.0].cost += coeff;
        }
        self.offset = offset;
    }

    /// The constant term of the objective
    pub fn objective_offset(&self) -> f64 {
        self.offset
    }

    /// The coefficient of `var` in `row`
    pub fn coefficient(&self, row: Row, var: Var) -> f64 {
        self.rows[row.0].terms.get(&var).copied().unwrap_or(0.0)
    }

    /// Overwrite a single constraint coefficient.
    ///
    /// This is the only way of changing the constraint matrix once a row has been added.
    pub fn apply_patch(&mut self, patch: &CoefficientPatch) -> Result<()> {
        ensure!(
            patch.var.0 < self.columns.len(),
            "Cannot apply patch {patch}: unknown variable"
        );
        let constraint = self
            .rows
            .get_mut(patch.row.0)
            .ok_or_else(|| anyhow!("Cannot apply patch {patch}: unknown constraint"))?;
        constraint.terms.insert(patch.var, patch.value);

        Ok(())
    }

    /// Evaluate the objective for the given variable values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values)
            .map(|(col, value)| col.cost * value)
            .sum::<f64>()
            + self.offset
    }

    /// Convert to a problem for the HiGHS solver
    fn to_highs(&self) -> RowProblem {
        let mut problem = RowProblem::default();
        let cols: Vec<_> = self
            .columns
            .iter()
            .map(|col| problem.add_column(col.cost, col.lower..=col.upper))
            .collect();
        for row in &self.rows {
            let factors = row
                .terms
                .iter()
                .filter(|&(_, &coeff)| coeff != 0.0)
                .map(|(var, &coeff)| (cols[var.0], coeff));
            problem.add_row(row.lower..=row.upper, factors);
        }

        problem
    }
}

/// The values obtained by solving a [`LinearProgram`] to optimality
#[derive(Clone, Debug, PartialEq)]
pub struct LpSolution {
    columns: Vec<f64>,
    row_duals: Vec<f64>,
    objective: f64,
}

impl LpSolution {
    /// Value of a variable
    pub fn value(&self, var: Var) -> f64 {
        self.columns[var.0]
    }

    /// Values of several variables, in order
    pub fn values<'a, I>(&self, vars: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a Var>,
    {
        vars.into_iter().map(|var| self.value(*var)).collect()
    }

    /// Values of all variables
    pub fn columns(&self) -> &[f64] {
        &self.columns
    }

    /// Dual value (shadow price) of a constraint, as reported by the solver
    pub fn dual(&self, row: Row) -> f64 {
        self.row_duals[row.0]
    }

    /// Objective value, including any constant offset
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Evaluate a linear expression at this solution
    pub fn evaluate<'a, I>(&self, terms: I) -> f64
    where
        I: IntoIterator<Item = &'a (Var, f64)>,
    {
        terms
            .into_iter()
            .map(|(var, coeff)| coeff * self.value(*var))
            .sum()
    }
}

/// Something which can solve linear programs
pub trait Solver {
    /// Solve `lp` to optimality.
    ///
    /// Returns an error if an optimal solution was not found, in which case no values are
    /// available.
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution>;
}

/// Solves linear programs using the HiGHS solver
#[derive(Clone, Copy, Debug, Default)]
pub struct HighsSolver;

impl Solver for HighsSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution> {
        let mut highs_model = lp.to_highs().optimise(lp.sense().into());
        highs_model.set_option("output_flag", false);

        let solved = highs_model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                let columns = solution.columns().to_vec();
                let objective = lp.objective_value(&columns);
                Ok(LpSolution {
                    columns,
                    row_duals: solution.dual_rows().to_vec(),
                    objective,
                })
            }
            status => Err(anyhow!("Could not solve: {status:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    /// max 3x + 2y s.t. x + y <= 4, x + 3y <= 6, 0 <= x <= 3, y >= 0
    fn small_lp() -> (LinearProgram, Var, Var, Row) {
        let mut lp = LinearProgram::new(Sense::Maximise);
        let x = lp.add_var(0.0, 3.0, 3.0);
        let y = lp.add_var(0.0, f64::INFINITY, 2.0);
        let row = lp.add_le(4.0, [(x, 1.0), (y, 1.0)]);
        lp.add_le(6.0, [(x, 1.0), (y, 3.0)]);
        (lp, x, y, row)
    }

    #[test]
    fn test_solve_highs() {
        let (lp, x, y, _) = small_lp();
        let solution = HighsSolver.solve(&lp).unwrap();
        assert_approx_eq!(f64, solution.value(x), 3.0, epsilon = 1e-9);
        assert_approx_eq!(f64, solution.value(y), 1.0, epsilon = 1e-9);
        assert_approx_eq!(f64, solution.objective(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solve_infeasible() {
        let mut lp = LinearProgram::new(Sense::Minimise);
        let x = lp.add_var(0.0, 1.0, 1.0);
        lp.add_ge(2.0, [(x, 1.0)]);
        assert!(HighsSolver.solve(&lp).is_err());
    }

    #[test]
    fn test_add_row_sums_repeated_vars() {
        let mut lp = LinearProgram::new(Sense::Minimise);
        let x = lp.add_var(0.0, 1.0, 0.0);
        let row = lp.add_eq(0.0, [(x, 1.0), (x, -3.0)]);
        assert_eq!(lp.coefficient(row, x), -2.0);
        assert!(lp.row(row).is_equality());
    }

    #[test]
    fn test_apply_patch() {
        let (mut lp, x, y, row) = small_lp();
        lp.apply_patch(&CoefficientPatch {
            row,
            var: x,
            value: 2.0,
        })
        .unwrap();
        assert_eq!(lp.coefficient(row, x), 2.0);

        // 2x + y <= 4 now binds before x reaches its upper bound
        let solution = HighsSolver.solve(&lp).unwrap();
        assert_approx_eq!(f64, solution.value(x), 1.2, epsilon = 1e-9);
        assert_approx_eq!(f64, solution.value(y), 1.6, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_patch_unknown_row() {
        let (mut lp, x, _, _) = small_lp();
        let patch = CoefficientPatch {
            row: Row(10),
            var: x,
            value: 1.0,
        };
        assert!(lp.apply_patch(&patch).is_err());
    }

    #[test]
    fn test_set_objective_with_offset() {
        let (mut lp, x, y, _) = small_lp();
        lp.set_objective([(y, 1.0)], 5.0);
        assert_eq!(lp.column(x).cost, 0.0);
        let solution = HighsSolver.solve(&lp).unwrap();
        assert_approx_eq!(f64, solution.value(y), 2.0, epsilon = 1e-9);
        assert_approx_eq!(f64, solution.objective(), 7.0, epsilon = 1e-9);
    }
}
