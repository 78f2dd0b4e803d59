use crate::core::error::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Regulatory floors applied to every institution.
///
/// - capital adequacy: `capital >= capital_ratio * assets`
/// - liquidity coverage: `liquidity >= liquidity_ratio * short_term`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatoryPolicy {
    pub capital_ratio: Decimal,
    pub liquidity_ratio: Decimal,
}

impl Default for RegulatoryPolicy {
    fn default() -> Self {
        Self {
            capital_ratio: dec!(0.08),
            liquidity_ratio: dec!(0.25),
        }
    }
}

impl RegulatoryPolicy {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.capital_ratio < Decimal::ZERO {
            return Err(EngineError::invalid(
                "policy",
                "capital_ratio",
                format!("must be non-negative, got {}", self.capital_ratio),
            ));
        }
        if self.liquidity_ratio < Decimal::ZERO {
            return Err(EngineError::invalid(
                "policy",
                "liquidity_ratio",
                format!("must be non-negative, got {}", self.liquidity_ratio),
            ));
        }
        Ok(())
    }

    /// Minimum capital for a given asset base.
    pub fn capital_floor(&self, assets: Decimal) -> Decimal {
        self.capital_ratio * assets
    }

    /// Minimum liquid assets for a given short-term obligation load.
    pub fn liquidity_floor(&self, short_term: Decimal) -> Decimal {
        self.liquidity_ratio * short_term
    }
}
