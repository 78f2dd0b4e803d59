//! Linear real-arithmetic feasibility checking.
//!
//! [`FeasibilitySolver`] is the narrow surface the engine talks to:
//! declare unknowns, assert linear constraints, check, then read back a
//! witness. [`z3::Z3Solver`] hands the system to Z3 and is what the engine
//! uses by default. [`simplex::SimplexSolver`] is an exact in-process
//! simplex for builds without the `z3` feature and for tests.

pub mod linear;
pub mod simplex;
#[cfg(feature = "z3")]
pub mod z3;

pub use linear::{Constraint, LinearExpr, Relation};
pub use simplex::SimplexSolver;
#[cfg(feature = "z3")]
pub use self::z3::Z3Solver;

/// The backend [`crate::analysis::engine::RiskEngine::evaluate`] builds.
#[cfg(feature = "z3")]
pub type DefaultSolver = Z3Solver;
/// The backend [`crate::analysis::engine::RiskEngine::evaluate`] builds.
#[cfg(not(feature = "z3"))]
pub type DefaultSolver = SimplexSolver;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Handle to a real-valued unknown declared on one solver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    pub(crate) fn new(index: usize) -> Self {
        Var(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Why a check ended without a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    Timeout,
    PivotBudgetExhausted,
    NumericOverflow,
    /// An intermediate value could not be represented exactly.
    PrecisionLoss,
    /// The backend gave up for a reason of its own.
    Incomplete,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::Timeout => f.write_str("timeout exceeded"),
            UnknownReason::PivotBudgetExhausted => f.write_str("pivot budget exhausted"),
            UnknownReason::NumericOverflow => f.write_str("numeric overflow"),
            UnknownReason::PrecisionLoss => f.write_str("inexact arithmetic"),
            UnknownReason::Incomplete => f.write_str("solver incomplete"),
        }
    }
}

/// Outcome of [`FeasibilitySolver::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Satisfiable,
    Unsatisfiable,
    Unknown(UnknownReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("variable {0} was not declared on this solver")]
    UndeclaredVariable(Var),
    #[error("no model available: the last check was not satisfiable or constraints changed since")]
    NoModel,
    #[error("the value of {0} in the model does not fit a decimal")]
    Unrepresentable(Var),
}

/// Work limits for a single check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverOptions {
    pub timeout: Option<Duration>,
    /// Pivot budget for backends that pivot. `None` scales the budget with
    /// the size of the system.
    pub max_pivots: Option<usize>,
}

/// A decision procedure for conjunctions of linear constraints over the reals.
///
/// `evaluate` is only meaningful after `check` returned
/// [`CheckResult::Satisfiable`] and before any further `assert`.
/// Instances are single-owner; nothing here needs to be reentrant.
pub trait FeasibilitySolver {
    /// Declare a fresh real-valued unknown.
    fn declare(&mut self, name: &str) -> Var;

    /// Add a constraint to the system. Invalidates any previous model.
    fn assert(&mut self, constraint: Constraint) -> Result<(), SolverError>;

    /// Decide the conjunction of all asserted constraints.
    fn check(&mut self) -> CheckResult;

    /// Value of `var` in the witness found by the last satisfiable check.
    fn evaluate(&self, var: Var) -> Result<Decimal, SolverError>;
}

impl<S: FeasibilitySolver + ?Sized> FeasibilitySolver for &mut S {
    fn declare(&mut self, name: &str) -> Var {
        (**self).declare(name)
    }

    fn assert(&mut self, constraint: Constraint) -> Result<(), SolverError> {
        (**self).assert(constraint)
    }

    fn check(&mut self) -> CheckResult {
        (**self).check()
    }

    fn evaluate(&self, var: Var) -> Result<Decimal, SolverError> {
        (**self).evaluate(var)
    }
}
