use crate::solver::Var;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A sparse linear expression `sum(coeff * var) + constant`.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::solver::{FeasibilitySolver, LinearExpr, SimplexSolver};
/// use rust_decimal_macros::dec;
///
/// let mut solver = SimplexSolver::default();
/// let capital = solver.declare("cap_A");
/// let assets = solver.declare("assets_A");
///
/// // capital - 0.08 * assets
/// let surplus = LinearExpr::var(capital) - LinearExpr::var(assets) * dec!(0.08);
/// assert_eq!(surplus.coefficient(assets), dec!(-0.08));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<Var, Decimal>,
    constant: Decimal,
}

impl LinearExpr {
    /// The empty expression, `0`.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A single variable with coefficient one.
    pub fn var(var: Var) -> Self {
        Self::term(var, Decimal::ONE)
    }

    /// A single term `coeff * var`.
    pub fn term(var: Var, coeff: Decimal) -> Self {
        let mut expr = Self::zero();
        expr.add_term(var, coeff);
        expr
    }

    /// A constant with no variables.
    pub fn constant(value: Decimal) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    /// Add `coeff * var`, merging with any existing term for `var`.
    pub fn add_term(&mut self, var: Var, coeff: Decimal) {
        let entry = self.terms.entry(var).or_insert(Decimal::ZERO);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.remove(&var);
        }
    }

    /// Coefficient of `var`, zero if it does not occur.
    pub fn coefficient(&self, var: Var) -> Decimal {
        self.terms.get(&var).copied().unwrap_or(Decimal::ZERO)
    }

    /// The constant part.
    pub fn constant_term(&self) -> Decimal {
        self.constant
    }

    /// Nonzero terms in variable order.
    pub fn terms(&self) -> impl Iterator<Item = (Var, Decimal)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }

    /// Whether no variable occurs.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate under an assignment.
    pub fn eval(&self, value: impl Fn(Var) -> Decimal) -> Decimal {
        self.terms
            .iter()
            .fold(self.constant, |acc, (v, c)| acc + *c * value(*v))
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        for (v, c) in rhs.terms {
            self.add_term(v, c);
        }
        self.constant += rhs.constant;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> LinearExpr {
        self + (-rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * Decimal::NEGATIVE_ONE
    }
}

impl Mul<Decimal> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, k: Decimal) -> LinearExpr {
        if k.is_zero() {
            return LinearExpr::zero();
        }
        for c in self.terms.values_mut() {
            *c *= k;
        }
        self.constant *= k;
        self
    }
}

impl fmt::Display for LinearExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (v, c) in &self.terms {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{}*{}", c, v)?;
            first = false;
        }
        if first || !self.constant.is_zero() {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{}", self.constant)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Ge,
    Le,
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Ge => f.write_str(">="),
            Relation::Le => f.write_str("<="),
            Relation::Eq => f.write_str("="),
        }
    }
}

/// A linear constraint, normalised to `terms REL bound`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    expr: LinearExpr,
    relation: Relation,
    bound: Decimal,
    label: Option<String>,
}

impl Constraint {
    /// `lhs REL rhs`. Constants move right, variables move left.
    pub fn new(lhs: LinearExpr, relation: Relation, rhs: LinearExpr) -> Self {
        let mut expr = lhs - rhs;
        let bound = -expr.constant;
        expr.constant = Decimal::ZERO;
        Self {
            expr,
            relation,
            bound,
            label: None,
        }
    }

    /// `lhs >= rhs`.
    pub fn ge(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Ge, rhs)
    }

    /// `lhs <= rhs`.
    pub fn le(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Le, rhs)
    }

    /// `lhs = rhs`.
    pub fn eq(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Eq, rhs)
    }

    /// Attach a label naming where the constraint came from.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Left-hand side, with no constant part.
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Right-hand constant.
    pub fn bound(&self) -> Decimal {
        self.bound
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Variables occurring in the constraint.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.expr.terms().map(|(v, _)| v)
    }

    /// Check the constraint under an assignment.
    pub fn is_satisfied_by(&self, value: impl Fn(Var) -> Decimal) -> bool {
        let lhs = self.expr.eval(value);
        match self.relation {
            Relation::Ge => lhs >= self.bound,
            Relation::Le => lhs <= self.bound,
            Relation::Eq => lhs == self.bound,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "[{}] ", label)?;
        }
        write!(f, "{} {} {}", self.expr, self.relation, self.bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_terms_merge_and_cancel() {
        let x = Var::new(0);
        let y = Var::new(1);
        let expr = LinearExpr::var(x) + LinearExpr::term(y, dec!(2)) - LinearExpr::var(x);
        assert_eq!(expr.coefficient(x), Decimal::ZERO);
        assert_eq!(expr.coefficient(y), dec!(2));
        assert_eq!(expr.terms().count(), 1);
    }

    #[test]
    fn test_constraint_normalisation() {
        // c >= 0.08 * a - 2  ==>  c - 0.08a >= -2
        let c = Var::new(0);
        let a = Var::new(1);
        let constraint = Constraint::ge(
            LinearExpr::var(c),
            LinearExpr::var(a) * dec!(0.08) - LinearExpr::constant(dec!(2)),
        );
        assert_eq!(constraint.bound(), dec!(-2));
        assert_eq!(constraint.expr().coefficient(c), dec!(1));
        assert_eq!(constraint.expr().coefficient(a), dec!(-0.08));
        assert_eq!(constraint.expr().constant_term(), Decimal::ZERO);
    }

    #[test]
    fn test_is_satisfied_by() {
        let c = Var::new(0);
        let a = Var::new(1);
        let constraint = Constraint::ge(LinearExpr::var(c), LinearExpr::var(a) * dec!(0.08));
        let values = |v: Var| if v == c { dec!(4) } else { dec!(50) };
        assert!(constraint.is_satisfied_by(values));
        let values = |v: Var| if v == c { dec!(3.99) } else { dec!(50) };
        assert!(!constraint.is_satisfied_by(values));
    }

    #[test]
    fn test_display() {
        let c = Var::new(0);
        let constraint =
            Constraint::eq(LinearExpr::var(c), LinearExpr::constant(dec!(10))).labeled("pin");
        assert_eq!(constraint.to_string(), "[pin] 1*v0 = 10");
    }
}
