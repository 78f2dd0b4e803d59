use crate::core::config::{BindingMode, EngineConfig, ScenarioConfig};
use crate::core::error::EngineError;
use crate::core::institution::{BalanceField, Institution, InstitutionId, NodeParams};
use crate::graph::network::FinancialNetwork;
use crate::solver::{Constraint, FeasibilitySolver, LinearExpr, Var};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Solver handles for one institution's four unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeVars {
    pub capital: Var,
    pub assets: Var,
    pub liquidity: Var,
    pub short_term: Var,
}

impl NodeVars {
    pub fn get(&self, field: BalanceField) -> Var {
        match field {
            BalanceField::Capital => self.capital,
            BalanceField::Assets => self.assets,
            BalanceField::Liquidity => self.liquidity,
            BalanceField::ShortTerm => self.short_term,
        }
    }
}

/// One institution after encoding.
#[derive(Debug, Clone)]
pub struct EncodedNode {
    /// Values the institution resolves to (override, declared, default).
    pub institution: Institution,
    pub vars: NodeVars,
    /// The subset of values that were pinned by equality constraints.
    pub pinned: NodeParams,
}

/// What the encoder submitted to a solver, kept for reading the result back.
#[derive(Debug, Clone)]
pub struct EncodedSystem {
    nodes: Vec<EncodedNode>,
    constraint_count: usize,
}

impl EncodedSystem {
    /// Encoded institutions in declaration order.
    pub fn nodes(&self) -> &[EncodedNode] {
        &self.nodes
    }

    pub fn node(&self, id: &InstitutionId) -> Option<&EncodedNode> {
        self.nodes.iter().find(|n| &n.institution.id == id)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_count
    }
}

/// Translates a network plus scenario overrides into linear constraints.
///
/// Per institution `i`:
///
/// - `cap_i`, `assets_i`, `liq_i`, `short_i` are declared as unknowns
/// - pinned fields get `x_i = value`
/// - `cap_i >= capital_ratio * assets_i`
/// - `liq_i >= liquidity_ratio * short_i`
///
/// Per exposure `s -> t` with weight `w`:
///
/// - `cap_t >= capital_ratio * assets_t - w`
///
/// All input is validated before the first constraint reaches the solver,
/// so a rejected scenario never leaves a partial system behind.
pub struct ConstraintEncoder<'a> {
    config: &'a EngineConfig,
}

impl<'a> ConstraintEncoder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn encode<S: FeasibilitySolver>(
        &self,
        network: &FinancialNetwork,
        scenario: &ScenarioConfig,
        solver: &mut S,
    ) -> Result<EncodedSystem, EngineError> {
        self.config.validate()?;
        network.validate()?;
        self.validate_scenario(network, scenario)?;
        if scenario.is_empty() {
            debug!("no scenario overrides, every institution uses declared or default values");
        }

        let resolved = network
            .institutions()
            .iter()
            .map(|record| {
                let overrides = scenario.node(&record.id);
                let institution =
                    Institution::resolve(record, overrides, &self.config.defaults)?;
                let pinned = self.pins(&institution, overrides);
                Ok((institution, pinned))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let policy = &self.config.policy;
        let mut count = 0usize;
        let mut nodes = Vec::with_capacity(resolved.len());

        for (institution, pinned) in resolved {
            let id = institution.id.as_str();
            let vars = NodeVars {
                capital: solver.declare(&var_name(BalanceField::Capital, id)),
                assets: solver.declare(&var_name(BalanceField::Assets, id)),
                liquidity: solver.declare(&var_name(BalanceField::Liquidity, id)),
                short_term: solver.declare(&var_name(BalanceField::ShortTerm, id)),
            };

            for field in BalanceField::ALL {
                let var = vars.get(field);
                let constraint = match pinned.get(field) {
                    Some(value) => Constraint::eq(LinearExpr::var(var), LinearExpr::constant(value))
                        .labeled(format!("pin {}.{}", id, field)),
                    None => Constraint::ge(LinearExpr::var(var), LinearExpr::zero())
                        .labeled(format!("non-negative {}.{}", id, field)),
                };
                submit(solver, constraint, &mut count)?;
            }

            submit(
                solver,
                Constraint::ge(
                    LinearExpr::var(vars.capital),
                    LinearExpr::var(vars.assets) * policy.capital_ratio,
                )
                .labeled(format!("capital adequacy {}", id)),
                &mut count,
            )?;
            submit(
                solver,
                Constraint::ge(
                    LinearExpr::var(vars.liquidity),
                    LinearExpr::var(vars.short_term) * policy.liquidity_ratio,
                )
                .labeled(format!("liquidity coverage {}", id)),
                &mut count,
            )?;

            nodes.push(EncodedNode {
                institution,
                vars,
                pinned,
            });
        }

        if network.exposures().is_empty() {
            debug!("network has no exposures, only regulatory floors apply");
        }
        let by_id: BTreeMap<&InstitutionId, NodeVars> = nodes
            .iter()
            .map(|n| (&n.institution.id, n.vars))
            .collect();
        for exposure in network.exposures().exposures() {
            let target = by_id
                .get(exposure.target())
                .copied()
                .ok_or_else(|| EngineError::UnknownReference {
                    from: exposure.source().clone(),
                    to: exposure.target().clone(),
                    missing: exposure.target().clone(),
                })?;

            submit(
                solver,
                Constraint::ge(
                    LinearExpr::var(target.capital),
                    LinearExpr::var(target.assets) * policy.capital_ratio
                        - LinearExpr::constant(exposure.weight()),
                )
                .labeled(format!(
                    "exposure {} -> {} ({})",
                    exposure.source(),
                    exposure.target(),
                    exposure.weight()
                )),
                &mut count,
            )?;
        }

        debug!(
            "encoded {} institutions and {} exposures into {} constraints ({:?} mode)",
            nodes.len(),
            network.exposure_count(),
            count,
            self.config.mode
        );

        Ok(EncodedSystem {
            nodes,
            constraint_count: count,
        })
    }

    fn validate_scenario(
        &self,
        network: &FinancialNetwork,
        scenario: &ScenarioConfig,
    ) -> Result<(), EngineError> {
        for (id, params) in &scenario.nodes {
            if !network.contains(id) {
                warn!("scenario configures undeclared institution '{}'", id);
                return Err(EngineError::invalid(
                    id.as_str(),
                    "id",
                    "scenario configures an institution the network does not declare",
                ));
            }
            params.validate(id.as_str())?;
        }
        Ok(())
    }

    /// Values to pin for one institution under the configured mode.
    fn pins(&self, institution: &Institution, overrides: Option<&NodeParams>) -> NodeParams {
        let mut pinned = NodeParams::new();
        for field in BalanceField::ALL {
            let value: Option<Decimal> = match self.config.mode {
                BindingMode::Pinned => Some(institution.get(field)),
                BindingMode::Exploratory => overrides.and_then(|o| o.get(field)),
            };
            if let Some(v) = value {
                pinned.set(field, v);
            }
        }
        pinned
    }
}

fn var_name(field: BalanceField, id: &str) -> String {
    format!("{}_{}", field.var_prefix(), id)
}

fn submit<S: FeasibilitySolver>(
    solver: &mut S,
    constraint: Constraint,
    count: &mut usize,
) -> Result<(), EngineError> {
    solver.assert(constraint)?;
    *count += 1;
    Ok(())
}
