use crate::analysis::encoder::EncodedSystem;
use crate::core::error::EngineError;
use crate::core::institution::InstitutionId;
use crate::core::policy::RegulatoryPolicy;
use crate::solver::{CheckResult, FeasibilitySolver, UnknownReason};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STABLE_MARKER: &str = "✅ System is stable under current constraints.";
pub const FRAGILE_MARKER: &str = "❌ Constraint violation: potential systemic risk detected.";

/// Machine-readable outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The constraint system is satisfiable.
    Stable,
    /// The constraint system is unsatisfiable.
    Fragile,
    /// The solver could not decide.
    Indeterminate,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Stable => "stable",
            Verdict::Fragile => "fragile",
            Verdict::Indeterminate => "indeterminate",
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Verdict::Stable)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Witness values reported for one institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeWitness {
    pub id: InstitutionId,
    pub capital: Decimal,
    pub liquidity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallKind {
    CapitalAdequacy,
    LiquidityCoverage,
}

/// A pinned institution that fails its own regulatory floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub id: InstitutionId,
    pub kind: ShortfallKind,
    pub actual: Decimal,
    pub required: Decimal,
}

impl Shortfall {
    pub fn gap(&self) -> Decimal {
        self.required - self.actual
    }
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ShortfallKind::CapitalAdequacy => "capital",
            ShortfallKind::LiquidityCoverage => "liquidity",
        };
        write!(
            f,
            "Node {}: {} {} below required {} (shortfall {})",
            self.id,
            what,
            self.actual.normalize(),
            self.required.normalize(),
            self.gap().normalize()
        )
    }
}

/// The report handed to presentation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    verdict: Verdict,
    lines: Vec<String>,
    witness: Vec<NodeWitness>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    shortfalls: Vec<Shortfall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unknown_reason: Option<UnknownReason>,
}

impl RiskReport {
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_stable(&self) -> bool {
        self.verdict.is_stable()
    }

    /// Human-readable lines, marker first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Per-institution values, in declaration order. Empty unless stable.
    pub fn witness(&self) -> &[NodeWitness] {
        &self.witness
    }

    pub fn witness_for(&self, id: &InstitutionId) -> Option<&NodeWitness> {
        self.witness.iter().find(|w| &w.id == id)
    }

    /// Local floor breaches found when the system is fragile.
    pub fn shortfalls(&self) -> &[Shortfall] {
        &self.shortfalls
    }

    pub fn unknown_reason(&self) -> Option<UnknownReason> {
        self.unknown_reason
    }
}

impl fmt::Display for RiskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Turns a solver verdict into a [`RiskReport`].
pub struct ResultInterpreter<'a> {
    policy: &'a RegulatoryPolicy,
}

impl<'a> ResultInterpreter<'a> {
    pub fn new(policy: &'a RegulatoryPolicy) -> Self {
        Self { policy }
    }

    pub fn interpret<S: FeasibilitySolver>(
        &self,
        result: CheckResult,
        solver: &S,
        system: &EncodedSystem,
    ) -> Result<RiskReport, EngineError> {
        match result {
            CheckResult::Satisfiable => self.stable(solver, system),
            CheckResult::Unsatisfiable => Ok(self.fragile(system)),
            CheckResult::Unknown(reason) => Ok(RiskReport {
                verdict: Verdict::Indeterminate,
                lines: vec![format!(
                    "⚠ Solver could not decide feasibility: {}.",
                    reason
                )],
                witness: Vec::new(),
                shortfalls: Vec::new(),
                unknown_reason: Some(reason),
            }),
        }
    }

    fn stable<S: FeasibilitySolver>(
        &self,
        solver: &S,
        system: &EncodedSystem,
    ) -> Result<RiskReport, EngineError> {
        let mut lines = vec![STABLE_MARKER.to_string()];
        let mut witness = Vec::with_capacity(system.nodes().len());

        for node in system.nodes() {
            let capital = solver.evaluate(node.vars.capital)?;
            let liquidity = solver.evaluate(node.vars.liquidity)?;
            lines.push(format!(
                "Node {}: capital = {}, liquidity = {}",
                node.institution.id, capital, liquidity
            ));
            witness.push(NodeWitness {
                id: node.institution.id.clone(),
                capital,
                liquidity,
            });
        }

        Ok(RiskReport {
            verdict: Verdict::Stable,
            lines,
            witness,
            shortfalls: Vec::new(),
            unknown_reason: None,
        })
    }

    fn fragile(&self, system: &EncodedSystem) -> RiskReport {
        let shortfalls = self.shortfalls(system);
        let mut lines = vec![FRAGILE_MARKER.to_string()];
        if shortfalls.is_empty() {
            lines.push(
                "No single institution breaches its own floor; the conflict spans several constraints."
                    .to_string(),
            );
        }
        lines.extend(shortfalls.iter().map(|s| s.to_string()));

        RiskReport {
            verdict: Verdict::Fragile,
            lines,
            witness: Vec::new(),
            shortfalls,
            unknown_reason: None,
        }
    }

    /// Floors broken by pinned values alone. Only institutions with both
    /// sides of a ratio pinned can be judged locally.
    fn shortfalls(&self, system: &EncodedSystem) -> Vec<Shortfall> {
        let mut found = Vec::new();
        for node in system.nodes() {
            let pinned = &node.pinned;
            if let (Some(capital), Some(assets)) = (pinned.capital, pinned.assets) {
                let required = self.policy.capital_floor(assets);
                if capital < required {
                    found.push(Shortfall {
                        id: node.institution.id.clone(),
                        kind: ShortfallKind::CapitalAdequacy,
                        actual: capital,
                        required,
                    });
                }
            }
            if let (Some(liquidity), Some(short_term)) = (pinned.liquidity, pinned.short_term) {
                let required = self.policy.liquidity_floor(short_term);
                if liquidity < required {
                    found.push(Shortfall {
                        id: node.institution.id.clone(),
                        kind: ShortfallKind::LiquidityCoverage,
                        actual: liquidity,
                        required,
                    });
                }
            }
        }
        found
    }
}
