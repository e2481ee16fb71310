
use std::fmt;

use crate::milp::backend::{MilpBackend, Solution, SolverError};
use crate::milp::expression::{Expr, VarId};

/// Domain of a model variable
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarKind {
    /// Integer in {0, 1}
    Binary,
    /// Real value in `[lower, upper]`, bounds may be infinite
    Continuous { lower: f64, upper: f64 },
}

/// A named variable in the model arena
#[derive(Clone, Debug)]
pub struct VarDef {
    name: String,
    kind: VarKind,
}

impl VarDef {
    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn is_binary(&self) -> bool {
        self.kind == VarKind::Binary
    }
}

/// Constraint relation
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum Sense {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "<=")]
    Leq,
    #[strum(serialize = ">=")]
    Geq,
}

/// A constraint `lhs <sense> rhs`; the constant part of `lhs` is always folded into `rhs`
#[derive(Clone, Debug)]
pub struct Constraint {
    lhs: Expr,
    sense: Sense,
    rhs: f64,
}

impl Constraint {
    /// Returns true if `values` satisfy this constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.evaluate(values);
        match self.sense {
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
            Sense::Leq => lhs <= self.rhs + tolerance,
            Sense::Geq => lhs >= self.rhs - tolerance,
        }
    }

    // getters
    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.sense, self.rhs)
    }
}

/// Backend-independent mixed-integer program: a variable arena plus constraints.
/// Constraints may be polynomial; it is up to the backend to linearize them.
#[derive(Clone, Debug, Default)]
pub struct Model {
    name: String,
    variables: Vec<VarDef>,
    constraints: Vec<Constraint>,
}

impl Model {
    /// Creates an empty model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn add_var(&mut self, name: String, kind: VarKind) -> VarId {
        let id = VarId::new(self.variables.len());
        self.variables.push(VarDef { name, kind });
        id
    }

    /// Adds a {0, 1} variable
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name.into(), VarKind::Binary)
    }

    /// Adds a bounded real variable
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_var(name.into(), VarKind::Continuous { lower, upper })
    }

    /// Adds an unbounded real variable
    pub fn add_free(&mut self, name: impl Into<String>) -> VarId {
        self.add_continuous(name, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Adds `lhs <sense> rhs`, moving everything to the left-hand side first
    pub fn add_constraint(&mut self, lhs: impl Into<Expr>, sense: Sense, rhs: impl Into<Expr>) {
        let combined = lhs.into() - rhs.into();
        let rhs = 0.0 - combined.constant_value();
        let lhs = combined - Expr::constant(-rhs);
        self.constraints.push(Constraint { lhs, sense, rhs });
    }

    /// Sum of the provided expressions
    pub fn quicksum<I, E>(items: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>
    {
        items.into_iter().map(|e| e.into()).sum()
    }

    /// Builds `sum(|e_i|)` by adding one non-negative auxiliary variable per item bounded below by `e_i` and `-e_i`.
    /// Only valid when the result is minimized.
    pub fn abssum<I, E>(&mut self, items: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>
    {
        let mut total = Expr::default();
        for (index, item) in items.into_iter().enumerate() {
            let item: Expr = item.into();
            let abs_var = self.add_continuous(format!("abs_{index}"), 0.0, f64::INFINITY);
            self.add_constraint(abs_var, Sense::Geq, item.clone());
            self.add_constraint(abs_var, Sense::Geq, -item);
            total += Expr::var(abs_var);
        }
        total
    }

    /// Solves the model with `backend`, minimizing `objective`
    /// # Errors
    /// * if the backend fails or the model has no solution
    pub fn minimize(&self, backend: &dyn MilpBackend, objective: &Expr) -> Result<Solution, SolverError> {
        backend.solve(self, objective)
    }

    /// Returns the definition of a variable
    pub fn variable(&self, var: VarId) -> &VarDef {
        &self.variables[var.index()]
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[VarDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}
