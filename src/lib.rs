//! # systemic-risk-engine
//!
//! Feasibility checking for interbank exposure networks.
//!
//! Given a directed graph of institutions and the exposures between them,
//! this engine encodes capital adequacy, liquidity coverage and exposure
//! propagation as linear constraints and asks a solver whether every
//! institution can meet its regulatory floors at once.
//!
//! The `z3` feature (on by default) checks feasibility with Z3. Without it
//! the engine falls back to an exact simplex over `Decimal`.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: institutions, exposures, policy, configuration, errors
//! - **graph** — The exposure network and its JSON document form
//! - **solver** — Linear feasibility solver trait, the Z3 backend and an exact in-process simplex
//! - **analysis** — Constraint encoding, result interpretation, the evaluation engine
//! - **simulation** — Sensitivity sweeps over a single balance-sheet field

pub mod analysis;
pub mod core;
pub mod graph;
pub mod simulation;
pub mod solver;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::analysis::engine::RiskEngine;
    pub use crate::analysis::interpreter::{RiskReport, Shortfall, Verdict};
    pub use crate::core::config::{BindingMode, EngineConfig, ScenarioConfig};
    pub use crate::core::error::EngineError;
    pub use crate::core::exposure::Exposure;
    pub use crate::core::institution::{BalanceField, InstitutionId, InstitutionRecord, NodeParams};
    pub use crate::core::policy::RegulatoryPolicy;
    pub use crate::graph::network::FinancialNetwork;
    pub use crate::simulation::sweep::{run_sweep, SweepResult, SweepRange};
    pub use crate::solver::{CheckResult, DefaultSolver, FeasibilitySolver, SimplexSolver};
}
