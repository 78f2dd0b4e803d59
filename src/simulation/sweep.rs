//! Sensitivity sweeps over one balance-sheet field.
//!
//! A sweep pins a single institution's field to each value in a range and
//! evaluates the network at every point, which locates the value at which
//! the system tips between stable and fragile.

use crate::analysis::engine::RiskEngine;
use crate::analysis::interpreter::Verdict;
use crate::core::config::ScenarioConfig;
use crate::core::error::EngineError;
use crate::core::institution::{BalanceField, InstitutionId};
use crate::graph::network::FinancialNetwork;
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper bound on the number of points one sweep may evaluate.
pub const MAX_SWEEP_POINTS: usize = 10_000;

/// Range of values to try for one institution's field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRange {
    pub institution: InstitutionId,
    pub field: BalanceField,
    pub start: Decimal,
    pub end: Decimal,
    pub step: Decimal,
}

impl SweepRange {
    pub fn new(
        institution: impl Into<InstitutionId>,
        field: BalanceField,
        start: Decimal,
        end: Decimal,
        step: Decimal,
    ) -> Self {
        Self {
            institution: institution.into(),
            field,
            start,
            end,
            step,
        }
    }

    /// The values visited, `start` through `end` inclusive.
    pub fn values(&self) -> Result<Vec<Decimal>, EngineError> {
        if self.step <= Decimal::ZERO {
            return Err(EngineError::invalid(
                "sweep",
                "step",
                format!("must be positive, got {}", self.step),
            ));
        }
        if self.start < Decimal::ZERO {
            return Err(EngineError::invalid(
                "sweep",
                "from",
                format!("must be non-negative, got {}", self.start),
            ));
        }
        if self.start > self.end {
            return Err(EngineError::invalid(
                "sweep",
                "to",
                format!("{} is below the start value {}", self.end, self.start),
            ));
        }

        let mut values = Vec::new();
        let mut value = self.start;
        while value <= self.end {
            if values.len() == MAX_SWEEP_POINTS {
                return Err(EngineError::invalid(
                    "sweep",
                    "step",
                    format!("range needs more than {} points", MAX_SWEEP_POINTS),
                ));
            }
            values.push(value);
            value = match value.checked_add(self.step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: Decimal,
    pub verdict: Verdict,
}

/// A change of verdict between two neighbouring points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub below: Decimal,
    pub at: Decimal,
    pub from: Verdict,
    pub to: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub institution: InstitutionId,
    pub field: BalanceField,
    pub points: Vec<SweepPoint>,
}

impl SweepResult {
    pub fn transitions(&self) -> Vec<Transition> {
        self.points
            .windows(2)
            .filter(|w| w[0].verdict != w[1].verdict)
            .map(|w| Transition {
                below: w[0].value,
                at: w[1].value,
                from: w[0].verdict,
                to: w[1].verdict,
            })
            .collect()
    }

    pub fn first_stable(&self) -> Option<Decimal> {
        self.first(Verdict::Stable)
    }

    pub fn first_fragile(&self) -> Option<Decimal> {
        self.first(Verdict::Fragile)
    }

    fn first(&self, verdict: Verdict) -> Option<Decimal> {
        self.points
            .iter()
            .find(|p| p.verdict == verdict)
            .map(|p| p.value)
    }
}

/// Evaluate `base` with the swept field overridden at every point.
///
/// The base scenario is not modified. Each point runs on its own solver.
pub fn run_sweep(
    engine: &RiskEngine,
    network: &FinancialNetwork,
    base: &ScenarioConfig,
    range: &SweepRange,
) -> Result<SweepResult, EngineError> {
    if !network.contains(&range.institution) {
        return Err(EngineError::invalid(
            range.institution.as_str(),
            "id",
            "sweep targets an institution the network does not declare",
        ));
    }

    let values = range.values()?;
    let mut points = Vec::with_capacity(values.len());
    for value in values {
        let mut scenario = base.clone();
        scenario.set(range.institution.clone(), range.field, value);
        let report = engine.evaluate(network, &scenario)?;
        points.push(SweepPoint {
            value,
            verdict: report.verdict(),
        });
    }

    let result = SweepResult {
        institution: range.institution.clone(),
        field: range.field,
        points,
    };
    info!(
        "swept {}.{} over {} points, {} transitions",
        range.institution,
        range.field,
        result.points.len(),
        result.transitions().len()
    );
    Ok(result)
}
