//! Scenario exploration on top of single evaluations.

pub mod sweep;
