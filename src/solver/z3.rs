//! Z3-backed feasibility checking.

use crate::solver::linear::{Constraint, LinearExpr, Relation};
use crate::solver::{CheckResult, FeasibilitySolver, SolverError, SolverOptions, UnknownReason, Var};
use log::{debug, trace, warn};
use rust_decimal::Decimal;
use ::z3::ast::{Ast, Bool, Real};
use ::z3::{Config, Context, Params, SatResult, Solver};

/// [`FeasibilitySolver`] that hands the system to Z3's linear real
/// arithmetic engine.
///
/// Declarations and constraints are recorded on the Rust side. Every
/// `check` builds a fresh Z3 context, translates the system with exact
/// rational constants, and copies the model back as `Decimal`s, so no Z3
/// object outlives the call.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::solver::*;
/// use rust_decimal_macros::dec;
///
/// let mut solver = Z3Solver::default();
/// let x = solver.declare("x");
/// solver.assert(Constraint::ge(LinearExpr::var(x), LinearExpr::constant(dec!(3)))).unwrap();
/// solver.assert(Constraint::le(LinearExpr::var(x), LinearExpr::constant(dec!(3)))).unwrap();
///
/// assert_eq!(solver.check(), CheckResult::Satisfiable);
/// assert_eq!(solver.evaluate(x).unwrap(), dec!(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Z3Solver {
    options: SolverOptions,
    names: Vec<String>,
    constraints: Vec<Constraint>,
    model: Option<Vec<Option<Decimal>>>,
}

impl Z3Solver {
    /// Create an empty solver. Only `options.timeout` applies to Z3.
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

    fn solve(&self) -> Result<Option<Vec<Option<Decimal>>>, UnknownReason> {
        let timeout_ms = match self.options.timeout {
            // An exhausted budget never reaches Z3.
            Some(t) if t.is_zero() => return Err(UnknownReason::Timeout),
            Some(t) => Some(u32::try_from(t.as_millis()).unwrap_or(u32::MAX)),
            None => None,
        };

        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        if let Some(ms) = timeout_ms {
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", ms);
            solver.set_params(&params);
        }

        let vars: Vec<Real> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| Real::new_const(&ctx, format!("{}#{}", name, i)))
            .collect();
        for constraint in &self.constraints {
            solver.assert(&encode(&ctx, &vars, constraint)?);
        }

        match solver.check() {
            SatResult::Sat => {
                let model = solver.get_model().ok_or(UnknownReason::Incomplete)?;
                let values = vars
                    .iter()
                    .map(|v| model.eval(v, true).and_then(|value| to_decimal(&value)))
                    .collect();
                debug!(
                    "z3 found a witness: {} vars, {} constraints",
                    vars.len(),
                    self.constraints.len()
                );
                Ok(Some(values))
            }
            SatResult::Unsat => {
                debug!("z3 proved infeasibility of {} constraints", self.constraints.len());
                Ok(None)
            }
            SatResult::Unknown => {
                let reason = solver.get_reason_unknown().unwrap_or_default();
                warn!("z3 returned unknown: {}", reason);
                if reason.contains("timeout") || reason.contains("canceled") {
                    Err(UnknownReason::Timeout)
                } else {
                    Err(UnknownReason::Incomplete)
                }
            }
        }
    }
}

impl FeasibilitySolver for Z3Solver {
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
            .ok_or(SolverError::UndeclaredVariable(var))?
            .ok_or(SolverError::Unrepresentable(var))
    }
}

/// `expr <relation> bound` as a Z3 formula.
fn encode<'ctx>(
    ctx: &'ctx Context,
    vars: &[Real<'ctx>],
    constraint: &Constraint,
) -> Result<Bool<'ctx>, UnknownReason> {
    let lhs = linear(ctx, vars, constraint.expr())?;
    let rhs = rational(ctx, constraint.bound())?;
    Ok(match constraint.relation() {
        Relation::Ge => lhs.ge(&rhs),
        Relation::Le => lhs.le(&rhs),
        Relation::Eq => lhs._eq(&rhs),
    })
}

fn linear<'ctx>(
    ctx: &'ctx Context,
    vars: &[Real<'ctx>],
    expr: &LinearExpr,
) -> Result<Real<'ctx>, UnknownReason> {
    let mut terms = Vec::new();
    for (var, coeff) in expr.terms() {
        let c = rational(ctx, coeff)?;
        terms.push(Real::mul(ctx, &[&c, &vars[var.index()]]));
    }
    terms.push(rational(ctx, expr.constant_term())?);
    let refs: Vec<&Real> = terms.iter().collect();
    Ok(Real::add(ctx, &refs))
}

/// `value` as the exact rational `mantissa / 10^scale`.
fn rational<'ctx>(ctx: &'ctx Context, value: Decimal) -> Result<Real<'ctx>, UnknownReason> {
    let value = value.normalize();
    let denominator = format!("1{}", "0".repeat(value.scale() as usize));
    Real::from_real_str(ctx, &value.mantissa().to_string(), &denominator)
        .ok_or(UnknownReason::NumericOverflow)
}

/// Model value back as a `Decimal`. Terminating fractions are exact;
/// anything else keeps 28 significant digits.
fn to_decimal(value: &Real) -> Option<Decimal> {
    let (num, den) = value.as_real()?;
    Decimal::from(num)
        .checked_div(Decimal::from(den))
        .map(|d| d.normalize())
}
