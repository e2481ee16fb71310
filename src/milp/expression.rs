
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Handle to a variable in a `Model` arena
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VarId(usize);

impl VarId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the variable in its model
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A product of variables, kept sorted; repeated variables are allowed
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Monomial(Vec<VarId>);

impl Monomial {
    fn single(var: VarId) -> Self {
        Self(vec![var])
    }

    fn product(&self, other: &Monomial) -> Monomial {
        let mut vars: Vec<VarId> = self.0.iter().chain(other.0.iter()).copied().collect();
        vars.sort();
        Monomial(vars)
    }

    /// Number of factors, counting repeats
    pub fn degree(&self) -> usize {
        self.0.len()
    }

    pub fn vars(&self) -> &[VarId] {
        &self.0
    }
}

/// Polynomial over model variables with `f64` coefficients.
/// Terms are stored by monomial in sorted order, so iteration is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expr {
    constant: f64,
    terms: BTreeMap<Monomial, f64>,
}

impl Expr {
    /// The constant expression `value`
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: Default::default()
        }
    }

    /// A single variable
    pub fn var(var: VarId) -> Self {
        let mut expr = Self::default();
        expr.add_term(Monomial::single(var), 1.0);
        expr
    }

    /// The complement `1 - var`, used for "not present" indicators
    pub fn complement(var: VarId) -> Self {
        Expr::constant(1.0) - Expr::var(var)
    }

    fn add_term(&mut self, monomial: Monomial, coefficient: f64) {
        if monomial.degree() == 0 {
            self.constant += coefficient;
            return;
        }
        let entry = self.terms.entry(monomial).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            // exact cancellation; keep the term map minimal
            self.terms.retain(|_, c| *c != 0.0);
        }
    }

    /// Highest monomial degree, 0 for constants
    pub fn degree(&self) -> usize {
        self.terms.keys().map(|m| m.degree()).max().unwrap_or(0)
    }

    /// Returns true if no term multiplies two variables
    pub fn is_linear(&self) -> bool {
        self.degree() <= 1
    }

    /// Returns true if the expression has no variable terms
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression for the given variable values, indexed by `VarId::index`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant + self.terms.iter()
            .map(|(m, c)| c * m.vars().iter().map(|v| values[v.index()]).product::<f64>())
            .sum::<f64>()
    }

    /// Iterates the non-constant terms in monomial order
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, &c)| (m, c))
    }

    /// Every variable referenced by this expression
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().flat_map(|m| m.vars().iter().copied())
    }

    pub fn constant_value(&self) -> f64 {
        self.constant
    }
}

impl From<VarId> for Expr {
    fn from(var: VarId) -> Self {
        Expr::var(var)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl AddAssign<Expr> for Expr {
    fn add_assign(&mut self, rhs: Expr) {
        self.constant += rhs.constant;
        for (m, c) in rhs.terms.into_iter() {
            self.add_term(m, c);
        }
    }
}

impl AddAssign<&Expr> for Expr {
    fn add_assign(&mut self, rhs: &Expr) {
        self.constant += rhs.constant;
        for (m, &c) in rhs.terms.iter() {
            self.add_term(m.clone(), c);
        }
    }
}

impl SubAssign<Expr> for Expr {
    fn sub_assign(&mut self, rhs: Expr) {
        *self += -rhs;
    }
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(mut self, rhs: T) -> Expr {
        self += rhs.into();
        self
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(mut self, rhs: T) -> Expr {
        self -= rhs.into();
        self
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self * -1.0
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(mut self, rhs: f64) -> Expr {
        if rhs == 0.0 {
            return Expr::default();
        }
        self.constant *= rhs;
        for c in self.terms.values_mut() {
            *c *= rhs;
        }
        self
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        rhs * self
    }
}

impl Mul<&Expr> for &Expr {
    type Output = Expr;

    /// Full polynomial product
    fn mul(self, rhs: &Expr) -> Expr {
        let mut result = Expr::constant(self.constant * rhs.constant);
        if self.constant != 0.0 {
            for (m, &c) in rhs.terms.iter() {
                result.add_term(m.clone(), self.constant * c);
            }
        }
        if rhs.constant != 0.0 {
            for (m, &c) in self.terms.iter() {
                result.add_term(m.clone(), rhs.constant * c);
            }
        }
        for (m1, &c1) in self.terms.iter() {
            for (m2, &c2) in rhs.terms.iter() {
                result.add_term(m1.product(m2), c1 * c2);
            }
        }
        result
    }
}

impl Mul<Expr> for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        &self * &rhs
    }
}

impl Mul<VarId> for Expr {
    type Output = Expr;

    fn mul(self, rhs: VarId) -> Expr {
        &self * &Expr::var(rhs)
    }
}

impl Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Expr {
        iter.fold(Expr::default(), |acc, e| acc + e)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (m, c) in self.terms.iter() {
            let sign = if *c < 0.0 { "-" } else if first { "" } else { "+" };
            let factors = m.vars().iter().map(|v| v.to_string()).collect::<Vec<_>>().join("*");
            if first {
                write!(f, "{sign}{}*{factors}", c.abs())?;
            } else {
                write!(f, " {sign} {}*{factors}", c.abs())?;
            }
            first = false;
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant != 0.0 {
            let sign = if self.constant < 0.0 { "-" } else { "+" };
            write!(f, " {sign} {}", self.constant.abs())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_arithmetic() {
        let x = VarId::new(0);
        let y = VarId::new(1);
        let e = Expr::var(x) * 2.0 + y - 3.0;
        assert!(e.is_linear());
        assert_eq!(e.degree(), 1);
        assert_eq!(e.evaluate(&[1.0, 4.0]), 3.0);

        // exact cancellation removes terms
        let zero = e.clone() - e;
        assert!(zero.is_constant());
        assert_eq!(zero.constant_value(), 0.0);
    }

    #[test]
    fn test_product_of_complements() {
        let a = VarId::new(0);
        let x1 = VarId::new(1);
        let x2 = VarId::new(2);
        // (1 - x1)(1 - x2) * a = a - a*x1 - a*x2 + a*x1*x2
        let e = Expr::complement(x1) * Expr::complement(x2) * a;
        assert_eq!(e.degree(), 3);
        assert_eq!(e.terms().count(), 4);
        for (v1, v2, v3) in [(1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (1.0, 0.0, 1.0), (0.0, 0.0, 0.0), (1.0, 1.0, 1.0)] {
            let expected = v1 * (1.0 - v2) * (1.0 - v3);
            assert_eq!(e.evaluate(&[v1, v2, v3]), expected);
        }
    }

    #[test]
    fn test_sum_and_display() {
        let vars: Vec<VarId> = (0..3).map(VarId::new).collect();
        let e: Expr = vars.iter().map(|&v| Expr::var(v)).sum();
        assert_eq!(e.to_string(), "1*x0 + 1*x1 + 1*x2");
        assert_eq!(Expr::constant(2.5).to_string(), "2.5");
        assert_eq!((Expr::var(vars[0]) - 1.0).to_string(), "1*x0 - 1");
        assert_eq!(e.variables().count(), 3);
    }
}
