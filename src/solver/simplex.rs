use crate::solver::linear::{Constraint, Relation};
use crate::solver::{CheckResult, FeasibilitySolver, SolverError, SolverOptions, UnknownReason, Var};
use log::{debug, trace};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Pivot budget when none is configured: this many pivots per tableau
/// column, and never less than [`MIN_PIVOT_BUDGET`].
const PIVOTS_PER_COLUMN: usize = 20;
const MIN_PIVOT_BUDGET: usize = 10_000;

/// Exact general simplex over `Decimal` for conjunctions of linear constraints.
///
/// Every asserted constraint becomes a tableau row with a bounded slack
/// variable; declared unknowns stay unbounded. `check` starts from the
/// all-zero assignment and repairs bound violations by pivoting, picking
/// both the leaving and the entering variable by smallest index (Bland's
/// rule), which guarantees termination. Each `check` rebuilds the tableau
/// from scratch.
///
/// Arithmetic is exact: bounds are compared without slack, and a step
/// whose result `Decimal` cannot hold exactly (say a division by 3) ends
/// the check with [`UnknownReason::PrecisionLoss`] instead of a guess.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::solver::*;
/// use rust_decimal_macros::dec;
///
/// let mut solver = SimplexSolver::default();
/// let x = solver.declare("x");
/// solver.assert(Constraint::ge(LinearExpr::var(x), LinearExpr::constant(dec!(3)))).unwrap();
/// solver.assert(Constraint::le(LinearExpr::var(x), LinearExpr::constant(dec!(5)))).unwrap();
///
/// assert_eq!(solver.check(), CheckResult::Satisfiable);
/// let value = solver.evaluate(x).unwrap();
/// assert!(value >= dec!(3) && value <= dec!(5));
/// ```
#[derive(Debug, Clone)]
pub struct SimplexSolver {
    options: SolverOptions,
    names: Vec<String>,
    constraints: Vec<Constraint>,
    model: Option<Vec<Decimal>>,
}

impl SimplexSolver {
    /// Create an empty solver with the given work limits.
    pub fn new(options: SolverOptions) -> Self {
        Self {
            options,
            names: Vec::new(),
            constraints: Vec::new(),
            model: None,
        }
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn name(&self, var: Var) -> Option<&str> {
        self.names.get(var.index()).map(String::as_str)
    }

    /// Pivot budget for a tableau with `columns` variables.
    fn pivot_budget(&self, columns: usize) -> usize {
        self.options.max_pivots.unwrap_or_else(|| {
            columns
                .saturating_mul(PIVOTS_PER_COLUMN)
                .max(MIN_PIVOT_BUDGET)
        })
    }

    fn solve(&self) -> Result<Option<Vec<Decimal>>, UnknownReason> {
        let started = Instant::now();
        let var_count = self.names.len();

        let mut rows = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            if constraint.expr().is_constant() {
                if !constraint.is_satisfied_by(|_| Decimal::ZERO) {
                    debug!("constant constraint is false: {}", constraint);
                    return Ok(None);
                }
                continue;
            }
            rows.push(constraint);
        }

        let mut tableau = Tableau::build(var_count, &rows);
        let budget = self.pivot_budget(var_count + rows.len());
        let mut pivots = 0usize;

        loop {
            if let Some(timeout) = self.options.timeout {
                if started.elapsed() >= timeout {
                    debug!("simplex timed out after {} pivots", pivots);
                    return Err(UnknownReason::Timeout);
                }
            }

            let Some((row, target, increase)) = tableau.first_violation() else {
                debug!(
                    "simplex found a witness: {} vars, {} rows, {} pivots",
                    var_count,
                    rows.len(),
                    pivots
                );
                return Ok(Some(tableau.witness(var_count)));
            };

            if pivots >= budget {
                debug!("simplex pivot budget of {} exhausted", budget);
                return Err(UnknownReason::PivotBudgetExhausted);
            }

            let Some(entering) = tableau.entering(row, increase) else {
                debug!(
                    "simplex proved infeasibility at row {} after {} pivots",
                    row, pivots
                );
                if let Some(label) = rows.get(row).and_then(|c| c.label()) {
                    trace!("conflicting row originated from '{}'", label);
                }
                return Ok(None);
            };

            trace!(
                "pivot {}: x{} leaves towards {}, x{} enters",
                pivots,
                tableau.basic[row],
                target,
                entering
            );
            tableau.pivot_and_update(row, entering, target)?;
            pivots += 1;
        }
    }
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

impl FeasibilitySolver for SimplexSolver {
    fn declare(&mut self, name: &str) -> Var {
        self.names.push(name.to_string());
        Var::new(self.names.len() - 1)
    }

    fn assert(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        if let Some(var) = constraint.vars().find(|v| v.index() >= self.names.len()) {
            return Err(SolverError::UndeclaredVariable(var));
        }
        trace!("assert {}", constraint);
        self.model = None;
        self.constraints.push(constraint);
        Ok(())
    }

    fn check(&mut self) -> CheckResult {
        self.model = None;
        match self.solve() {
            Ok(Some(model)) => {
                self.model = Some(model);
                CheckResult::Satisfiable
            }
            Ok(None) => CheckResult::Unsatisfiable,
            Err(reason) => CheckResult::Unknown(reason),
        }
    }

    fn evaluate(&self, var: Var) -> Result<Decimal, SolverError> {
        let model = self.model.as_ref().ok_or(SolverError::NoModel)?;
        model
            .get(var.index())
            .copied()
            .ok_or(SolverError::UndeclaredVariable(var))
    }
}

// Exact arithmetic. `Decimal` rounds silently once a result needs more
// than 28 digits, and rounding always lowers the scale, so a result whose
// scale fell short of what exact arithmetic gives is reported as inexact.

fn exact_add(a: Decimal, b: Decimal) -> Result<Decimal, UnknownReason> {
    if a.is_zero() {
        return Ok(b);
    }
    if b.is_zero() {
        return Ok(a);
    }
    let sum = a.checked_add(b).ok_or(UnknownReason::NumericOverflow)?;
    if !sum.is_zero() && sum.scale() < a.scale().max(b.scale()) {
        return Err(UnknownReason::PrecisionLoss);
    }
    Ok(sum.normalize())
}

fn exact_sub(a: Decimal, b: Decimal) -> Result<Decimal, UnknownReason> {
    exact_add(a, -b)
}

fn exact_mul(a: Decimal, b: Decimal) -> Result<Decimal, UnknownReason> {
    if a.is_zero() || b.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let product = a.checked_mul(b).ok_or(UnknownReason::NumericOverflow)?;
    if product.scale() != a.scale() + b.scale() {
        return Err(UnknownReason::PrecisionLoss);
    }
    Ok(product.normalize())
}

/// `a / b`, accepted only when multiplying back reproduces `a` exactly.
fn exact_div(a: Decimal, b: Decimal) -> Result<Decimal, UnknownReason> {
    let quotient = a
        .checked_div(b)
        .ok_or(UnknownReason::NumericOverflow)?
        .normalize();
    if exact_mul(quotient, b)? != a {
        return Err(UnknownReason::PrecisionLoss);
    }
    Ok(quotient)
}

/// Sparse tableau. Columns `0..var_count` are the declared unknowns,
/// column `var_count + r` is the slack of row `r`.
///
/// Row `r` reads `x[basic[r]] = sum(rows[r][k] * x[k])` over nonbasic `k`.
/// `users[k]` holds the rows in which nonbasic column `k` has a nonzero
/// coefficient.
struct Tableau {
    rows: Vec<BTreeMap<usize, Decimal>>,
    users: Vec<BTreeSet<usize>>,
    basic: Vec<usize>,
    row_of: Vec<Option<usize>>,
    lower: Vec<Option<Decimal>>,
    upper: Vec<Option<Decimal>>,
    values: Vec<Decimal>,
}

impl Tableau {
    fn build(var_count: usize, constraints: &[&Constraint]) -> Self {
        let width = var_count + constraints.len();
        let mut tableau = Tableau {
            rows: Vec::with_capacity(constraints.len()),
            users: vec![BTreeSet::new(); width],
            basic: Vec::with_capacity(constraints.len()),
            row_of: vec![None; width],
            lower: vec![None; width],
            upper: vec![None; width],
            values: vec![Decimal::ZERO; width],
        };

        for (r, constraint) in constraints.iter().enumerate() {
            let slack = var_count + r;
            let mut row = BTreeMap::new();
            for (var, coeff) in constraint.expr().terms() {
                row.insert(var.index(), coeff.normalize());
                tableau.users[var.index()].insert(r);
            }
            let bound = constraint.bound().normalize();
            match constraint.relation() {
                Relation::Ge => tableau.lower[slack] = Some(bound),
                Relation::Le => tableau.upper[slack] = Some(bound),
                Relation::Eq => {
                    tableau.lower[slack] = Some(bound);
                    tableau.upper[slack] = Some(bound);
                }
            }
            tableau.rows.push(row);
            tableau.basic.push(slack);
            tableau.row_of[slack] = Some(r);
        }
        tableau
    }

    /// The out-of-bounds basic variable with the smallest column index, as
    /// `(row, bound it must move to, whether it must increase)`.
    fn first_violation(&self) -> Option<(usize, Decimal, bool)> {
        let mut found: Option<(usize, Decimal, bool)> = None;
        for (r, &b) in self.basic.iter().enumerate() {
            let value = self.values[b];
            let violation = match (self.lower[b], self.upper[b]) {
                (Some(l), _) if value < l => Some((r, l, true)),
                (_, Some(u)) if value > u => Some((r, u, false)),
                _ => None,
            };
            if let Some(v) = violation {
                if found.map_or(true, |(fr, _, _)| b < self.basic[fr]) {
                    found = Some(v);
                }
            }
        }
        found
    }

    fn can_increase(&self, col: usize) -> bool {
        self.upper[col].map_or(true, |u| self.values[col] < u)
    }

    fn can_decrease(&self, col: usize) -> bool {
        self.lower[col].map_or(true, |l| self.values[col] > l)
    }

    /// Smallest nonbasic column that can move the basic variable of `row`
    /// in the required direction without leaving its own bounds.
    fn entering(&self, row: usize, increase: bool) -> Option<usize> {
        self.rows[row].iter().find_map(|(&col, &a)| {
            if self.row_of[col].is_some() || a.is_zero() {
                return None;
            }
            let positive = a > Decimal::ZERO;
            let usable = if increase == positive {
                self.can_increase(col)
            } else {
                self.can_decrease(col)
            };
            usable.then_some(col)
        })
    }

    fn coefficient(&self, row: usize, col: usize) -> Decimal {
        self.rows[row].get(&col).copied().unwrap_or(Decimal::ZERO)
    }

    fn pivot_and_update(
        &mut self,
        row: usize,
        entering: usize,
        target: Decimal,
    ) -> Result<(), UnknownReason> {
        let leaving = self.basic[row];
        let a = self.coefficient(row, entering);
        let theta = exact_div(exact_sub(target, self.values[leaving])?, a)?;

        self.values[leaving] = target;
        self.values[entering] = exact_add(self.values[entering], theta)?;
        for &r in &self.users[entering] {
            if r == row {
                continue;
            }
            let k = self.basic[r];
            let b = self.coefficient(r, entering);
            self.values[k] = exact_add(self.values[k], exact_mul(b, theta)?)?;
        }

        self.pivot(row, entering)
    }

    fn pivot(&mut self, row: usize, entering: usize) -> Result<(), UnknownReason> {
        let leaving = self.basic[row];
        let a = self.coefficient(row, entering);

        // Solve row for the entering column.
        let mut solved = BTreeMap::new();
        for (&k, &c) in &self.rows[row] {
            if k != entering {
                solved.insert(k, exact_div(-c, a)?);
            }
        }
        solved.insert(leaving, exact_div(Decimal::ONE, a)?);

        // Substitute into every other row that mentions it.
        let touched: Vec<usize> = self.users[entering]
            .iter()
            .copied()
            .filter(|&r| r != row)
            .collect();
        let mut updated = Vec::with_capacity(touched.len());
        for &r in &touched {
            let mut coeffs = self.rows[r].clone();
            let b = coeffs.remove(&entering).unwrap_or(Decimal::ZERO);
            for (&k, &s) in &solved {
                let current = coeffs.get(&k).copied().unwrap_or(Decimal::ZERO);
                let next = exact_add(current, exact_mul(b, s)?)?;
                if next.is_zero() {
                    coeffs.remove(&k);
                } else {
                    coeffs.insert(k, next);
                }
            }
            updated.push((r, coeffs));
        }

        // Nothing above failed, so the tableau can change now.
        for &k in self.rows[row].keys() {
            self.users[k].remove(&row);
        }
        for (r, coeffs) in updated {
            for &k in solved.keys() {
                if coeffs.contains_key(&k) {
                    self.users[k].insert(r);
                } else {
                    self.users[k].remove(&r);
                }
            }
            self.rows[r] = coeffs;
        }
        for &k in solved.keys() {
            self.users[k].insert(row);
        }
        self.users[entering].clear();

        self.rows[row] = solved;
        self.basic[row] = entering;
        self.row_of[entering] = Some(row);
        self.row_of[leaving] = None;
        Ok(())
    }

    fn witness(&self, var_count: usize) -> Vec<Decimal> {
        self.values[..var_count]
            .iter()
            .map(|v| v.normalize())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::LinearExpr;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn konst(v: Decimal) -> LinearExpr {
        LinearExpr::constant(v)
    }

    #[test]
    fn test_empty_system_is_satisfiable() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        assert_eq!(solver.evaluate(x).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_bounded_interval() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        solver.assert(Constraint::ge(LinearExpr::var(x), konst(dec!(3)))).unwrap();
        solver.assert(Constraint::le(LinearExpr::var(x), konst(dec!(5)))).unwrap();
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        let v = solver.evaluate(x).unwrap();
        assert!(v >= dec!(3) && v <= dec!(5));
    }

    #[test]
    fn test_empty_interval_is_unsatisfiable() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        solver.assert(Constraint::ge(LinearExpr::var(x), konst(dec!(5)))).unwrap();
        solver.assert(Constraint::le(LinearExpr::var(x), konst(dec!(3)))).unwrap();
        assert_eq!(solver.check(), CheckResult::Unsatisfiable);
        assert_eq!(solver.evaluate(x), Err(SolverError::NoModel));
    }

    #[test]
    fn test_linear_system_solution() {
        // x + y = 10, x - y = 2  =>  x = 6, y = 4
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        let y = solver.declare("y");
        solver
            .assert(Constraint::eq(LinearExpr::var(x) + LinearExpr::var(y), konst(dec!(10))))
            .unwrap();
        solver
            .assert(Constraint::eq(LinearExpr::var(x) - LinearExpr::var(y), konst(dec!(2))))
            .unwrap();
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        assert_eq!(solver.evaluate(x).unwrap(), dec!(6));
        assert_eq!(solver.evaluate(y).unwrap(), dec!(4));
    }

    #[test]
    fn test_capital_floor_breach_is_unsatisfiable() {
        let mut solver = SimplexSolver::default();
        let c = solver.declare("cap_B");
        let a = solver.declare("assets_B");
        solver.assert(Constraint::eq(LinearExpr::var(c), konst(dec!(3)))).unwrap();
        solver.assert(Constraint::eq(LinearExpr::var(a), konst(dec!(50)))).unwrap();
        solver
            .assert(Constraint::ge(LinearExpr::var(c), LinearExpr::var(a) * dec!(0.08)))
            .unwrap();
        assert_eq!(solver.check(), CheckResult::Unsatisfiable);
    }

    #[test]
    fn test_witness_satisfies_every_constraint() {
        let mut solver = SimplexSolver::default();
        let c = solver.declare("c");
        let a = solver.declare("a");
        let l = solver.declare("l");
        let constraints = vec![
            Constraint::ge(LinearExpr::var(c), LinearExpr::var(a) * dec!(0.08)),
            Constraint::ge(LinearExpr::var(a), konst(dec!(120))),
            Constraint::ge(LinearExpr::var(l) + LinearExpr::var(c), konst(dec!(30))),
            Constraint::le(LinearExpr::var(l), konst(dec!(7))),
        ];
        for constraint in &constraints {
            solver.assert(constraint.clone()).unwrap();
        }
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        let value = |v: Var| solver.evaluate(v).unwrap();
        for constraint in &constraints {
            assert!(constraint.is_satisfied_by(value), "violated: {}", constraint);
        }
    }

    #[test]
    fn test_false_constant_constraint() {
        let mut solver = SimplexSolver::default();
        solver.assert(Constraint::ge(konst(Decimal::ZERO), konst(Decimal::ONE))).unwrap();
        assert_eq!(solver.check(), CheckResult::Unsatisfiable);
    }

    #[test]
    fn test_assert_invalidates_model() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        assert!(solver.evaluate(x).is_ok());
        solver.assert(Constraint::ge(LinearExpr::var(x), konst(dec!(1)))).unwrap();
        assert_eq!(solver.evaluate(x), Err(SolverError::NoModel));
    }

    #[test]
    fn test_evaluate_before_check() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        assert_eq!(solver.evaluate(x), Err(SolverError::NoModel));
    }

    #[test]
    fn test_undeclared_variable_rejected() {
        let mut solver = SimplexSolver::default();
        let mut other = SimplexSolver::default();
        other.declare("a");
        let foreign = other.declare("b");
        let err = solver
            .assert(Constraint::ge(LinearExpr::var(foreign), konst(dec!(1))))
            .unwrap_err();
        assert_eq!(err, SolverError::UndeclaredVariable(foreign));
    }

    #[test]
    fn test_zero_timeout_is_unknown() {
        let mut solver = SimplexSolver::new(SolverOptions {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        });
        let x = solver.declare("x");
        solver.assert(Constraint::ge(LinearExpr::var(x), konst(dec!(1)))).unwrap();
        assert_eq!(solver.check(), CheckResult::Unknown(UnknownReason::Timeout));
    }

    #[test]
    fn test_pivot_budget_is_unknown() {
        let mut solver = SimplexSolver::new(SolverOptions {
            max_pivots: Some(0),
            ..Default::default()
        });
        let x = solver.declare("x");
        solver.assert(Constraint::ge(LinearExpr::var(x), konst(dec!(1)))).unwrap();
        assert_eq!(
            solver.check(),
            CheckResult::Unknown(UnknownReason::PivotBudgetExhausted)
        );
    }

    #[test]
    fn test_overflow_is_unknown() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        solver
            .assert(Constraint::eq(
                LinearExpr::term(x, dec!(0.0000000001)),
                konst(Decimal::MAX),
            ))
            .unwrap();
        assert_eq!(
            solver.check(),
            CheckResult::Unknown(UnknownReason::NumericOverflow)
        );
    }

    #[test]
    fn test_breach_in_the_last_digit_is_unsatisfiable() {
        // 3.9999999999999 < 0.08 * 50
        let mut solver = SimplexSolver::default();
        let c = solver.declare("cap_B");
        let a = solver.declare("assets_B");
        solver
            .assert(Constraint::eq(LinearExpr::var(c), konst(dec!(3.9999999999999))))
            .unwrap();
        solver.assert(Constraint::eq(LinearExpr::var(a), konst(dec!(50)))).unwrap();
        solver
            .assert(Constraint::ge(LinearExpr::var(c), LinearExpr::var(a) * dec!(0.08)))
            .unwrap();
        assert_eq!(solver.check(), CheckResult::Unsatisfiable);
    }

    #[test]
    fn test_liquidity_breach_in_the_last_digit_is_unsatisfiable() {
        // 4.9999999999995 < 0.25 * 20
        let mut solver = SimplexSolver::default();
        let l = solver.declare("liq_C");
        let s = solver.declare("short_C");
        solver
            .assert(Constraint::eq(LinearExpr::var(l), konst(dec!(4.9999999999995))))
            .unwrap();
        solver.assert(Constraint::eq(LinearExpr::var(s), konst(dec!(20)))).unwrap();
        solver
            .assert(Constraint::ge(LinearExpr::var(l), LinearExpr::var(s) * dec!(0.25)))
            .unwrap();
        assert_eq!(solver.check(), CheckResult::Unsatisfiable);
    }

    #[test]
    fn test_witness_keeps_full_precision() {
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        solver
            .assert(Constraint::eq(LinearExpr::var(x), konst(dec!(10.0000000000001))))
            .unwrap();
        assert_eq!(solver.check(), CheckResult::Satisfiable);
        assert_eq!(solver.evaluate(x).unwrap(), dec!(10.0000000000001));
    }

    #[test]
    fn test_inexact_division_is_unknown() {
        // 3x = 1 has no finite decimal solution.
        let mut solver = SimplexSolver::default();
        let x = solver.declare("x");
        solver
            .assert(Constraint::eq(LinearExpr::term(x, dec!(3)), konst(Decimal::ONE)))
            .unwrap();
        assert_eq!(
            solver.check(),
            CheckResult::Unknown(UnknownReason::PrecisionLoss)
        );
    }

    #[test]
    fn test_pivot_budget_scales_with_system_size() {
        let solver = SimplexSolver::default();
        assert_eq!(solver.pivot_budget(10), MIN_PIVOT_BUDGET);
        // 2500 institutions: 16 unknowns-and-slacks each plus edges.
        let columns = 2_500 * 16 + 5_000;
        assert_eq!(solver.pivot_budget(columns), columns * PIVOTS_PER_COLUMN);

        let capped = SimplexSolver::new(SolverOptions {
            max_pivots: Some(7),
            ..Default::default()
        });
        assert_eq!(capped.pivot_budget(columns), 7);
    }

    #[test]
    fn test_check_is_deterministic() {
        let build = || {
            let mut solver = SimplexSolver::default();
            let x = solver.declare("x");
            let y = solver.declare("y");
            solver
                .assert(Constraint::ge(LinearExpr::var(x) + LinearExpr::var(y), konst(dec!(7))))
                .unwrap();
            solver
                .assert(Constraint::le(LinearExpr::var(x) - LinearExpr::var(y), konst(dec!(1))))
                .unwrap();
            assert_eq!(solver.check(), CheckResult::Satisfiable);
            (solver.evaluate(x).unwrap(), solver.evaluate(y).unwrap())
        };
        assert_eq!(build(), build());
    }
}
