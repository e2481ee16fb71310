
use good_lp::ResolutionError;

use crate::milp::expression::{Expr, VarId};
use crate::milp::model::Model;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("model is infeasible")]
    Infeasible,
    #[error("model is unbounded")]
    Unbounded,
    #[error("solver time limit reached")]
    TimeLimit,
    #[error("unsupported term {term} in constraint {constraint}: products are only allowed over binary variables")]
    UnsupportedTerm { term: String, constraint: String },
    #[error("backend {backend} does not support nonlinear objective terms")]
    NonlinearObjective { backend: String },
    #[error("solver backend error: {0}")]
    Backend(String),
}

impl SolverError {
    /// Outcomes that mean "no refinement available" rather than a fault in the model
    pub fn is_no_solution(&self) -> bool {
        matches!(self, SolverError::Infeasible | SolverError::Unbounded | SolverError::TimeLimit)
    }
}

impl From<ResolutionError> for SolverError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::Infeasible => SolverError::Infeasible,
            ResolutionError::Unbounded => SolverError::Unbounded,
            // time limits arrive as a solution status, not as an error
            other => SolverError::Backend(other.to_string())
        }
    }
}

/// Values assigned by a backend to every model variable
#[derive(Clone, Debug)]
pub struct Solution {
    /// Objective evaluated on `values`
    objective: f64,
    /// Indexed by `VarId::index`
    values: Vec<f64>,
}

impl Solution {
    /// Constructor
    pub fn new(objective: f64, values: Vec<f64>) -> Self {
        Self { objective, values }
    }

    /// Solved value of `var`
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    /// Binary reading of `var`, rounding at 0.5
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) > 0.5
    }

    /// Evaluates an arbitrary expression on this solution, with binary variables of `model` rounded
    pub fn evaluate_rounded(&self, model: &Model, expr: &Expr) -> f64 {
        let rounded: Vec<f64> = self.values.iter()
            .zip(model.variables().iter())
            .map(|(&v, def)| if def.is_binary() { v.round() } else { v })
            .collect();
        expr.evaluate(&rounded)
    }

    // getters
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A mixed-integer solver that can minimize an objective over a `Model`.
pub trait MilpBackend: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Returns true if products of binary variables may appear in the objective
    fn supports_nonlinear_objective(&self) -> bool;

    /// Minimizes `objective` subject to the constraints of `model`
    /// # Errors
    /// * `SolverError::Infeasible`, `Unbounded`, or `TimeLimit` if there is no usable optimum
    /// * `SolverError::UnsupportedTerm` or `NonlinearObjective` if the model cannot be expressed for this backend
    /// * `SolverError::Backend` for anything else reported by the solver
    fn solve(&self, model: &Model, objective: &Expr) -> Result<Solution, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(SolverError::from(ResolutionError::Infeasible), SolverError::Infeasible);
        assert_eq!(SolverError::from(ResolutionError::Unbounded), SolverError::Unbounded);
        assert!(SolverError::TimeLimit.is_no_solution());
        assert!(!SolverError::Backend("boom".to_string()).is_no_solution());
        assert!(!SolverError::NonlinearObjective { backend: "x".to_string() }.is_no_solution());
    }

    #[test]
    fn test_solution_rounding() {
        let mut model = Model::new("test");
        let b = model.add_binary("b");
        let c = model.add_continuous("c", 0.0, 1.0);
        let solution = Solution::new(0.0, vec![0.9999, 0.25]);
        assert!(solution.is_set(b));
        assert!(!solution.is_set(c));
        let expr = Expr::var(b) + c;
        assert_eq!(solution.evaluate_rounded(&model, &expr), 1.25);
    }
}
