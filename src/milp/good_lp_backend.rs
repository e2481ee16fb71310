
use good_lp::{variable, Expression, IntoAffineExpression, ProblemVariables, ResolutionError, SolverModel, Variable};
use good_lp::Solution as _;
use good_lp::solvers::{SolutionStatus, WithTimeLimit};
use log::trace;
use rustc_hash::FxHashMap;
use serde::Serialize;
use strum_macros::EnumString;

use crate::milp::backend::{MilpBackend, Solution, SolverError};
use crate::milp::expression::{Expr, Monomial, VarId};
use crate::milp::model::{Model, Sense, VarKind};

/// Concrete MILP engine behind `GoodLpBackend`
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum SolverEngine {
    /// Pure Rust solver, always available
    #[default]
    #[strum(ascii_case_insensitive, serialize = "microlp")]
    #[clap(name = "microlp")]
    Microlp,
    /// HiGHS, requires the `highs` feature
    #[strum(ascii_case_insensitive, serialize = "highs")]
    #[clap(name = "highs")]
    Highs,
}

/// `MilpBackend` on top of `good_lp`.
/// Products of binary variables are replaced by one auxiliary variable per distinct product.
#[derive(Clone, Debug, Default)]
pub struct GoodLpBackend {
    engine: SolverEngine,
    /// If set, products in the objective are linearized like those in constraints
    linearize_objective: bool,
    /// Wall-clock limit in seconds, forwarded to the engine
    time_limit: Option<f64>,
}

impl GoodLpBackend {
    /// Constructor
    pub fn new(engine: SolverEngine, linearize_objective: bool, time_limit: Option<f64>) -> Self {
        Self { engine, linearize_objective, time_limit }
    }

    // getters
    pub fn engine(&self) -> SolverEngine {
        self.engine
    }

    pub fn time_limit(&self) -> Option<f64> {
        self.time_limit
    }

    /// Builds the model and hands it to the engine.
    /// A solve that stops at the time limit is reported as `SolverError::TimeLimit`, even with an incumbent.
    fn solve_with<M, F>(&self, model: &Model, objective: &Expr, build: F) -> Result<Solution, SolverError>
    where
        M: SolverModel<Error = ResolutionError> + WithTimeLimit,
        F: FnOnce(ProblemVariables, Expression) -> M
    {
        if !objective.is_linear() && !self.linearize_objective {
            return Err(SolverError::NonlinearObjective { backend: self.name().to_string() });
        }

        let mut linearizer = Linearizer::new(model);
        let mut pending = Vec::with_capacity(model.num_constraints());
        for constraint in model.constraints().iter() {
            let lhs = linearizer.translate(constraint.lhs(), &constraint.to_string())?;
            let rhs = constraint.rhs();
            pending.push(match constraint.sense() {
                Sense::Eq => lhs.eq(rhs),
                Sense::Leq => lhs.leq(rhs),
                Sense::Geq => lhs.geq(rhs),
            });
        }
        let lp_objective = linearizer.translate(objective, "objective")?;
        trace!(
            "{}: {} variables ({} products), {} constraints",
            model.name(), linearizer.lp_vars.len(), linearizer.products.len(), pending.len()
        );

        let Linearizer { vars, lp_vars, linking, .. } = linearizer;
        let mut problem = build(vars, lp_objective);
        if let Some(seconds) = self.time_limit {
            problem = problem.with_time_limit(seconds);
        }
        for constraint in pending.into_iter().chain(linking.into_iter()) {
            problem.add_constraint(constraint);
        }
        let lp_solution = problem.solve()?;
        check_status(lp_solution.status())?;

        let values: Vec<f64> = lp_vars.iter()
            .map(|&v| lp_solution.value(v))
            .collect();
        Ok(Solution::new(objective.evaluate(&values), values))
    }
}

impl MilpBackend for GoodLpBackend {
    fn name(&self) -> &str {
        match self.engine {
            SolverEngine::Microlp => "good_lp/microlp",
            SolverEngine::Highs => "good_lp/highs",
        }
    }

    fn supports_nonlinear_objective(&self) -> bool {
        self.linearize_objective
    }

    fn solve(&self, model: &Model, objective: &Expr) -> Result<Solution, SolverError> {
        match self.engine {
            SolverEngine::Microlp => {
                self.solve_with(model, objective, |vars, lp_objective| {
                    vars.minimise(lp_objective).using(good_lp::solvers::microlp::microlp)
                })
            },
            SolverEngine::Highs => {
                #[cfg(feature = "highs")]
                {
                    self.solve_with(model, objective, |vars, lp_objective| {
                        vars.minimise(lp_objective).using(good_lp::solvers::highs::highs)
                    })
                }
                #[cfg(not(feature = "highs"))]
                {
                    Err(SolverError::Backend("HiGHS solver is disabled. Please recompile with `highs` feature.".to_string()))
                }
            }
        }
    }
}

/// Only an optimal (or gap-limited) solve is usable; anything cut short by the clock is not
fn check_status(status: SolutionStatus) -> Result<(), SolverError> {
    match status {
        SolutionStatus::TimeLimit => Err(SolverError::TimeLimit),
        _ => Ok(())
    }
}

/// Translates model expressions into `good_lp` ones, replacing binary products with auxiliary variables
struct Linearizer<'a> {
    model: &'a Model,
    vars: ProblemVariables,
    /// One `good_lp` variable per model variable, same order
    lp_vars: Vec<Variable>,
    /// Distinct factor set -> product variable
    products: FxHashMap<Vec<VarId>, Variable>,
    /// Constraints tying product variables to their factors
    linking: Vec<good_lp::Constraint>,
}

impl<'a> Linearizer<'a> {
    fn new(model: &'a Model) -> Self {
        let mut vars = ProblemVariables::new();
        let lp_vars = model.variables().iter()
            .map(|def| {
                let definition = match def.kind() {
                    VarKind::Binary => variable().integer().min(0.0).max(1.0),
                    VarKind::Continuous { lower, upper } => {
                        let mut definition = variable();
                        if lower.is_finite() {
                            definition = definition.min(lower);
                        }
                        if upper.is_finite() {
                            definition = definition.max(upper);
                        }
                        definition
                    }
                };
                vars.add(definition.name(def.name()))
            })
            .collect();

        Self {
            model,
            vars,
            lp_vars,
            products: Default::default(),
            linking: vec![]
        }
    }

    fn translate(&mut self, expr: &Expr, context: &str) -> Result<Expression, SolverError> {
        let mut result = Expression::from_other_affine(expr.constant_value());
        for (monomial, coefficient) in expr.terms() {
            let var = self.monomial_var(monomial, context)?;
            result += coefficient * var;
        }
        Ok(result)
    }

    fn monomial_var(&mut self, monomial: &Monomial, context: &str) -> Result<Variable, SolverError> {
        if monomial.degree() == 1 {
            return Ok(self.lp_vars[monomial.vars()[0].index()]);
        }

        if monomial.vars().iter().any(|&v| !self.model.variable(v).is_binary()) {
            let term = monomial.vars().iter()
                .map(|&v| self.model.variable(v).name().to_string())
                .collect::<Vec<_>>()
                .join("*");
            return Err(SolverError::UnsupportedTerm { term, constraint: context.to_string() });
        }

        // x*x == x for binaries
        let mut factors = monomial.vars().to_vec();
        factors.dedup();
        if factors.len() == 1 {
            return Ok(self.lp_vars[factors[0].index()]);
        }
        if let Some(&product) = self.products.get(&factors) {
            return Ok(product);
        }

        let name = format!("prod_{}", factors.iter().map(|v| v.index().to_string()).collect::<Vec<_>>().join("_"));
        let product = self.vars.add(variable().min(0.0).max(1.0).name(name));
        let mut factor_sum = Expression::from_other_affine(0.0);
        for factor in factors.iter() {
            let lp_factor = self.lp_vars[factor.index()];
            self.linking.push(product.into_expression().leq(lp_factor));
            factor_sum += lp_factor;
        }
        let lower_bound = factor_sum - (factors.len() as f64 - 1.0);
        self.linking.push(product.into_expression().geq(lower_bound));
        self.products.insert(factors, product);
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_small_selection() {
        let mut model = Model::new("select");
        let a = model.add_binary("a");
        let b = model.add_binary("b");
        let c = model.add_binary("c");
        model.add_constraint(Model::quicksum([a, b, c]), Sense::Eq, 2.0);
        let objective = Expr::var(a) * 3.0 + b + Expr::var(c) * 2.0;

        let backend = GoodLpBackend::default();
        let solution = model.minimize(&backend, &objective).unwrap();
        assert!(!solution.is_set(a));
        assert!(solution.is_set(b));
        assert!(solution.is_set(c));
        assert_approx_eq!(solution.objective(), 3.0);
    }

    #[test]
    fn test_infeasible() {
        let mut model = Model::new("infeasible");
        let a = model.add_binary("a");
        let b = model.add_binary("b");
        model.add_constraint(Expr::var(a) + b, Sense::Geq, 3.0);

        let backend = GoodLpBackend::default();
        let error = backend.solve(&model, &Expr::var(a)).unwrap_err();
        assert_eq!(error, SolverError::Infeasible);
        assert!(error.is_no_solution());
    }

    #[test]
    fn test_product_constraint() {
        let mut model = Model::new("product");
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        let w = model.add_binary("w");
        // x*y must be 1, and the same product is reused in a second constraint
        model.add_constraint(Expr::var(x) * y, Sense::Eq, 1.0);
        model.add_constraint(Expr::var(x) * y + w, Sense::Leq, 1.0);

        let backend = GoodLpBackend::default();
        let solution = backend.solve(&model, &(Expr::var(x) + y - w)).unwrap();
        assert!(solution.is_set(x));
        assert!(solution.is_set(y));
        assert!(!solution.is_set(w));
        assert_approx_eq!(solution.objective(), 2.0);
    }

    #[test]
    fn test_complement_product() {
        let mut model = Model::new("complement");
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        let e = model.add_free("e");
        // (1 - x)(1 - y) + e == 0.0 with x forced off; minimizing |e| forces y on
        model.add_constraint(Expr::complement(x) * Expr::complement(y) + e, Sense::Eq, 0.0);
        model.add_constraint(x, Sense::Eq, 0.0);
        let abs_e = model.abssum([e]);

        let backend = GoodLpBackend::default();
        let solution = backend.solve(&model, &abs_e).unwrap();
        assert!(solution.is_set(y));
        assert_approx_eq!(solution.value(e) + 1.0, 1.0);
    }

    #[test]
    fn test_nonlinear_objective() {
        let mut model = Model::new("objective");
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.add_constraint(Expr::var(x) + y, Sense::Leq, 2.0);
        let objective = -(Expr::var(x) * y);

        let linear_only = GoodLpBackend::default();
        assert!(!linear_only.supports_nonlinear_objective());
        assert!(matches!(
            linear_only.solve(&model, &objective),
            Err(SolverError::NonlinearObjective { .. })
        ));

        let linearizing = GoodLpBackend::new(SolverEngine::Microlp, true, None);
        assert!(linearizing.supports_nonlinear_objective());
        let solution = linearizing.solve(&model, &objective).unwrap();
        assert_approx_eq!(solution.objective(), -1.0);
    }

    #[test]
    fn test_continuous_product_rejected() {
        let mut model = Model::new("continuous");
        let x = model.add_binary("x");
        let c = model.add_continuous("c", 0.0, 5.0);
        model.add_constraint(Expr::var(x) * c, Sense::Leq, 1.0);

        let backend = GoodLpBackend::default();
        assert!(matches!(
            backend.solve(&model, &Expr::var(x)),
            Err(SolverError::UnsupportedTerm { .. })
        ));
    }

    #[test]
    fn test_time_limit_status() {
        assert_eq!(check_status(SolutionStatus::TimeLimit), Err(SolverError::TimeLimit));
        assert_eq!(check_status(SolutionStatus::Optimal), Ok(()));
        assert!(check_status(SolutionStatus::TimeLimit).unwrap_err().is_no_solution());
    }

    #[test]
    fn test_generous_time_limit() {
        let mut model = Model::new("timed");
        let a = model.add_binary("a");
        let b = model.add_binary("b");
        model.add_constraint(Expr::var(a) + b, Sense::Geq, 1.0);

        // a limit the solve never reaches leaves the result untouched
        let backend = GoodLpBackend::new(SolverEngine::Microlp, false, Some(60.0));
        assert_eq!(backend.time_limit(), Some(60.0));
        let solution = backend.solve(&model, &(Expr::var(a) * 2.0 + b)).unwrap();
        assert!(!solution.is_set(a));
        assert!(solution.is_set(b));
        assert_approx_eq!(solution.objective(), 1.0);
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(SolverEngine::default(), SolverEngine::Microlp);
        assert_eq!("HiGHS".parse::<SolverEngine>().unwrap(), SolverEngine::Highs);
        assert_eq!(SolverEngine::Highs.to_string(), "highs");
        assert_eq!("cplex".parse::<SolverEngine>(), Err(strum::ParseError::VariantNotFound));
    }
}
