use crate::analysis::encoder::ConstraintEncoder;
use crate::analysis::interpreter::{ResultInterpreter, RiskReport};
use crate::core::config::{EngineConfig, ScenarioConfig};
use crate::core::error::EngineError;
use crate::graph::network::FinancialNetwork;
use crate::solver::{DefaultSolver, FeasibilitySolver};
use log::{debug, info, warn};

/// Evaluates scenarios against a network.
///
/// Each call builds a fresh solver, so evaluations are independent and the
/// engine itself holds nothing but configuration.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let network = FinancialNetwork::from_json(
///     r#"{ "nodes": [{ "id": "A" }, { "id": "B" }],
///          "edges": [{ "source": "A", "target": "B", "weight": 2.0 }] }"#,
/// ).unwrap();
///
/// let engine = RiskEngine::default();
/// let report = engine.evaluate(&network, &ScenarioConfig::new()).unwrap();
/// assert_eq!(report.verdict(), Verdict::Stable);
///
/// let stressed = ScenarioConfig::new().with("B", BalanceField::Capital, dec!(3.0));
/// let report = engine.evaluate(&network, &stressed).unwrap();
/// assert_eq!(report.verdict(), Verdict::Fragile);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: EngineConfig,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one scenario with a new [`DefaultSolver`]: Z3 when the
    /// `z3` feature is on, the exact simplex otherwise.
    pub fn evaluate(
        &self,
        network: &FinancialNetwork,
        scenario: &ScenarioConfig,
    ) -> Result<RiskReport, EngineError> {
        let solver = DefaultSolver::new(self.config.solver_options());
        self.evaluate_with(solver, network, scenario)
    }

    /// Evaluate one scenario on a caller-supplied solver.
    ///
    /// The solver should be empty; constraints already asserted on it
    /// take part in the check.
    pub fn evaluate_with<S: FeasibilitySolver>(
        &self,
        mut solver: S,
        network: &FinancialNetwork,
        scenario: &ScenarioConfig,
    ) -> Result<RiskReport, EngineError> {
        let system = ConstraintEncoder::new(&self.config).encode(network, scenario, &mut solver)?;
        let result = solver.check();
        debug!("check finished: {:?}", result);

        let report = ResultInterpreter::new(&self.config.policy).interpret(result, &solver, &system)?;
        info!(
            "evaluated {} institutions, {} constraints: {}",
            system.nodes().len(),
            system.constraint_count(),
            report.verdict()
        );
        Ok(report)
    }

    /// Evaluate each scenario independently. A rejected scenario yields an
    /// error in its slot and does not stop the rest.
    pub fn evaluate_batch(
        &self,
        network: &FinancialNetwork,
        scenarios: &[ScenarioConfig],
    ) -> Vec<Result<RiskReport, EngineError>> {
        scenarios
            .iter()
            .enumerate()
            .map(|(i, scenario)| {
                let outcome = self.evaluate(network, scenario);
                if let Err(e) = &outcome {
                    warn!("scenario {} rejected: {}", i, e);
                }
                outcome
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::interpreter::Verdict;
    use crate::core::config::BindingMode;
    use crate::core::institution::BalanceField;
    use crate::solver::{SimplexSolver, SolverOptions, UnknownReason};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn cycle() -> FinancialNetwork {
        FinancialNetwork::from_json(
            r#"{
                "nodes": [{ "id": "A" }, { "id": "B" }, { "id": "C" }, { "id": "D" }],
                "edges": [
                    { "source": "A", "target": "B", "weight": 2.0 },
                    { "source": "B", "target": "C", "weight": 1.5 },
                    { "source": "C", "target": "D", "weight": 2.2 },
                    { "source": "D", "target": "A", "weight": 1.0 }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_cycle_is_stable() {
        let report = RiskEngine::default()
            .evaluate(&cycle(), &ScenarioConfig::new())
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Stable);
        assert_eq!(report.witness().len(), 4);
        assert_eq!(report.lines().len(), 5);
    }

    #[test]
    fn test_low_capital_is_fragile() {
        let scenario = ScenarioConfig::new().with("B", BalanceField::Capital, dec!(3.0));
        let report = RiskEngine::default().evaluate(&cycle(), &scenario).unwrap();
        assert_eq!(report.verdict(), Verdict::Fragile);
        assert!(report.witness().is_empty());
    }

    #[test]
    fn test_zero_timeout_is_indeterminate() {
        let config = EngineConfig::default().with_timeout(Duration::ZERO);
        let report = RiskEngine::new(config)
            .evaluate(&cycle(), &ScenarioConfig::new())
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Indeterminate);
        assert_eq!(report.unknown_reason(), Some(UnknownReason::Timeout));
    }

    #[test]
    fn test_exploratory_without_overrides_is_stable() {
        let config = EngineConfig::default().with_mode(BindingMode::Exploratory);
        let report = RiskEngine::new(config)
            .evaluate(&cycle(), &ScenarioConfig::new())
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Stable);
    }

    #[test]
    fn test_evaluate_with_borrowed_solver() {
        let mut solver = SimplexSolver::default();
        let report = RiskEngine::default()
            .evaluate_with(&mut solver, &cycle(), &ScenarioConfig::new())
            .unwrap();
        assert!(report.is_stable());
        assert_eq!(solver.var_count(), 16);
    }

    #[test]
    fn test_pivot_budget_on_simplex_is_indeterminate() {
        let solver = SimplexSolver::new(SolverOptions {
            max_pivots: Some(0),
            ..Default::default()
        });
        let report = RiskEngine::default()
            .evaluate_with(solver, &cycle(), &ScenarioConfig::new())
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Indeterminate);
        assert_eq!(
            report.unknown_reason(),
            Some(UnknownReason::PivotBudgetExhausted)
        );
    }

    #[test]
    fn test_both_backends_agree_on_the_cycle() {
        let engine = RiskEngine::default();
        for capital in [dec!(3.0), dec!(3.9999999999999), dec!(4), dec!(10.0000000000001)] {
            let scenario = ScenarioConfig::new().with("B", BalanceField::Capital, capital);
            let default = engine.evaluate(&cycle(), &scenario).unwrap();
            let simplex = engine
                .evaluate_with(SimplexSolver::default(), &cycle(), &scenario)
                .unwrap();
            assert_eq!(default, simplex, "capital {}", capital);
        }
    }

    #[test]
    fn test_batch_continues_past_bad_scenario() {
        let scenarios = vec![
            ScenarioConfig::new(),
            ScenarioConfig::new().with("Z", BalanceField::Capital, dec!(1)),
            ScenarioConfig::new().with("B", BalanceField::Capital, dec!(3)),
        ];
        let results = RiskEngine::default().evaluate_batch(&cycle(), &scenarios);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().verdict(), Verdict::Stable);
        assert!(results[1].as_ref().unwrap_err().is_input_error());
        assert_eq!(results[2].as_ref().unwrap().verdict(), Verdict::Fragile);
    }
}
