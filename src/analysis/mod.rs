//! From network and scenario to verdict.
//!
//! - **encoder** — builds the linear constraint system
//! - **interpreter** — maps a solver result to a [`interpreter::RiskReport`]
//! - **engine** — the evaluation boundary tying the two together

pub mod encoder;
pub mod engine;
pub mod interpreter;
