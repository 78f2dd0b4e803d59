use crate::core::error::EngineError;
use crate::core::institution::{BalanceField, BalanceSheetDefaults, InstitutionId, NodeParams};
use crate::core::policy::RegulatoryPolicy;
use crate::solver::SolverOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How balance-sheet unknowns are bound before solving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Every unknown is pinned to its resolved value
    /// (scenario override, then declared value, then default).
    #[default]
    Pinned,
    /// Only fields set in the scenario configuration are pinned; the rest
    /// are free non-negative unknowns for the solver to choose.
    Exploratory,
}

impl std::str::FromStr for BindingMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pinned" => Ok(BindingMode::Pinned),
            "exploratory" => Ok(BindingMode::Exploratory),
            other => Err(EngineError::invalid(
                "engine",
                "mode",
                format!("expected 'pinned' or 'exploratory', got '{}'", other),
            )),
        }
    }
}

/// Engine-wide settings. Every field has a default, so a partial JSON
/// document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub policy: RegulatoryPolicy,
    pub defaults: BalanceSheetDefaults,
    pub mode: BindingMode,
    /// Wall-clock budget for a single `check`. `None` means unbounded.
    pub timeout_ms: Option<u64>,
    /// Pivot budget for a single `check` on a pivoting backend. `None`
    /// scales it with the size of the system.
    pub max_pivots: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: RegulatoryPolicy::default(),
            defaults: BalanceSheetDefaults::default(),
            mode: BindingMode::Pinned,
            timeout_ms: None,
            max_pivots: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate an engine configuration. Missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject negative ratios and negative default balances.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.policy.validate()?;
        self.defaults.validate()
    }

    /// Set the binding mode.
    pub fn with_mode(mut self, mode: BindingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the wall-clock budget for each check.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Work limits handed to each solver the engine builds.
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
            max_pivots: self.max_pivots,
        }
    }
}

/// Per-node overrides for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub nodes: BTreeMap<InstitutionId, NodeParams>,
}

impl ScenarioConfig {
    /// Create an empty scenario with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a scenario document. A non-numeric value is an input error.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set a single field override for one institution.
    pub fn with(mut self, id: impl Into<InstitutionId>, field: BalanceField, value: Decimal) -> Self {
        self.set(id.into(), field, value);
        self
    }

    /// Set a single field override in place.
    pub fn set(&mut self, id: InstitutionId, field: BalanceField, value: Decimal) {
        self.nodes.entry(id).or_default().set(field, value);
    }

    /// Overrides for one institution, if any.
    pub fn node(&self, id: &InstitutionId) -> Option<&NodeParams> {
        self.nodes.get(id)
    }

    /// Whether the scenario overrides nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_engine_config() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, BindingMode::Pinned);
        assert_eq!(config.policy.capital_ratio, dec!(0.08));
        assert!(config.solver_options().timeout.is_none());
        assert!(config.solver_options().max_pivots.is_none());
    }

    #[test]
    fn test_engine_config_from_partial_json() {
        let config =
            EngineConfig::from_json(r#"{ "mode": "exploratory", "timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.mode, BindingMode::Exploratory);
        assert_eq!(config.solver_options().timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.defaults.capital, dec!(10));
        assert_eq!(config.max_pivots, None);
    }

    #[test]
    fn test_engine_config_pivot_budget_from_json() {
        let config = EngineConfig::from_json(r#"{ "max_pivots": 500 }"#).unwrap();
        assert_eq!(config.solver_options().max_pivots, Some(500));
    }

    #[test]
    fn test_engine_config_rejects_negative_default() {
        let err = EngineConfig::from_json(r#"{ "defaults": { "assets": -1 } }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[test]
    fn test_scenario_from_json() {
        let scenario =
            ScenarioConfig::from_json(r#"{ "nodes": { "B": { "capital": 3.0 } } }"#).unwrap();
        let b = scenario.node(&InstitutionId::new("B")).unwrap();
        assert_eq!(b.capital, Some(dec!(3.0)));
        assert_eq!(b.assets, None);
    }

    #[test]
    fn test_scenario_non_numeric_rejected() {
        let err = ScenarioConfig::from_json(r#"{ "nodes": { "B": { "capital": "lots" } } }"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("exploratory".parse::<BindingMode>().unwrap(), BindingMode::Exploratory);
        assert!("loose".parse::<BindingMode>().is_err());
    }
}
