use crate::core::error::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an institution in the exposure network.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::core::institution::InstitutionId;
///
/// let a = InstitutionId::new("BANK-A");
/// let b = InstitutionId::new("BANK-B");
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstitutionId(String);

impl InstitutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstitutionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstitutionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One of the four balance-sheet quantities that become solver unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceField {
    Capital,
    Assets,
    Liquidity,
    ShortTerm,
}

impl BalanceField {
    pub const ALL: [BalanceField; 4] = [
        BalanceField::Capital,
        BalanceField::Assets,
        BalanceField::Liquidity,
        BalanceField::ShortTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceField::Capital => "capital",
            BalanceField::Assets => "assets",
            BalanceField::Liquidity => "liquidity",
            BalanceField::ShortTerm => "short_term",
        }
    }

    /// Prefix used when declaring the solver variable for this field.
    pub fn var_prefix(&self) -> &'static str {
        match self {
            BalanceField::Capital => "cap",
            BalanceField::Assets => "assets",
            BalanceField::Liquidity => "liq",
            BalanceField::ShortTerm => "short",
        }
    }
}

impl fmt::Display for BalanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BalanceField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capital" => Ok(BalanceField::Capital),
            "assets" => Ok(BalanceField::Assets),
            "liquidity" => Ok(BalanceField::Liquidity),
            "short_term" => Ok(BalanceField::ShortTerm),
            other => Err(EngineError::invalid(
                "field",
                other,
                "expected one of capital, assets, liquidity, short_term",
            )),
        }
    }
}

/// Optional balance-sheet parameters.
///
/// Used both for what the network declares about an institution and for
/// per-node scenario overrides. Absent fields fall back to the next layer
/// when an [`Institution`] is resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_term: Option<Decimal>,
    /// Tolerated loss ceiling. Carried as data; no constraint reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_cap: Option<Decimal>,
}

impl NodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: BalanceField, value: Decimal) -> Self {
        self.set(field, value);
        self
    }

    pub fn with_exposure_cap(mut self, value: Decimal) -> Self {
        self.exposure_cap = Some(value);
        self
    }

    pub fn get(&self, field: BalanceField) -> Option<Decimal> {
        match field {
            BalanceField::Capital => self.capital,
            BalanceField::Assets => self.assets,
            BalanceField::Liquidity => self.liquidity,
            BalanceField::ShortTerm => self.short_term,
        }
    }

    pub fn set(&mut self, field: BalanceField, value: Decimal) {
        let slot = match field {
            BalanceField::Capital => &mut self.capital,
            BalanceField::Assets => &mut self.assets,
            BalanceField::Liquidity => &mut self.liquidity,
            BalanceField::ShortTerm => &mut self.short_term,
        };
        *slot = Some(value);
    }

    /// Reject any negative value. `subject` names the owner in the error.
    pub fn validate(&self, subject: &str) -> Result<(), EngineError> {
        let fields = BalanceField::ALL
            .iter()
            .map(|f| (f.as_str(), self.get(*f)))
            .chain(std::iter::once(("exposure_cap", self.exposure_cap)));

        for (name, value) in fields {
            if let Some(v) = value {
                if v < Decimal::ZERO {
                    return Err(EngineError::invalid(
                        subject,
                        name,
                        format!("must be non-negative, got {}", v),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fields set in `overrides` win; everything else comes from `self`.
    pub fn overlay(&self, overrides: &NodeParams) -> NodeParams {
        NodeParams {
            capital: overrides.capital.or(self.capital),
            assets: overrides.assets.or(self.assets),
            liquidity: overrides.liquidity.or(self.liquidity),
            short_term: overrides.short_term.or(self.short_term),
            exposure_cap: overrides.exposure_cap.or(self.exposure_cap),
        }
    }
}

/// Values assumed for any balance-sheet field nobody supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceSheetDefaults {
    pub capital: Decimal,
    pub assets: Decimal,
    pub liquidity: Decimal,
    pub short_term: Decimal,
    pub exposure_cap: Decimal,
}

impl Default for BalanceSheetDefaults {
    fn default() -> Self {
        Self {
            capital: dec!(10.0),
            assets: dec!(50.0),
            liquidity: dec!(5.0),
            short_term: dec!(20.0),
            exposure_cap: dec!(10.0),
        }
    }
}

impl BalanceSheetDefaults {
    pub fn get(&self, field: BalanceField) -> Decimal {
        match field {
            BalanceField::Capital => self.capital,
            BalanceField::Assets => self.assets,
            BalanceField::Liquidity => self.liquidity,
            BalanceField::ShortTerm => self.short_term,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        NodeParams {
            capital: Some(self.capital),
            assets: Some(self.assets),
            liquidity: Some(self.liquidity),
            short_term: Some(self.short_term),
            exposure_cap: Some(self.exposure_cap),
        }
        .validate("defaults")
    }
}

/// An institution as declared by the network description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    pub id: InstitutionId,
    #[serde(flatten)]
    pub params: NodeParams,
}

impl InstitutionRecord {
    /// A record with no declared values; every field resolves to its default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: InstitutionId::new(id),
            params: NodeParams::default(),
        }
    }

    pub fn with_params(id: impl Into<String>, params: NodeParams) -> Self {
        Self {
            id: InstitutionId::new(id),
            params,
        }
    }
}

/// A fully resolved institution for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub capital: Decimal,
    pub assets: Decimal,
    pub liquidity: Decimal,
    pub short_term: Decimal,
    pub exposure_cap: Decimal,
}

impl Institution {
    /// Resolve each field from the scenario override, then the declared
    /// record, then the defaults.
    pub fn resolve(
        record: &InstitutionRecord,
        overrides: Option<&NodeParams>,
        defaults: &BalanceSheetDefaults,
    ) -> Result<Self, EngineError> {
        record.params.validate(record.id.as_str())?;
        let merged = match overrides {
            Some(o) => {
                o.validate(record.id.as_str())?;
                record.params.overlay(o)
            }
            None => record.params.clone(),
        };

        Ok(Self {
            id: record.id.clone(),
            capital: merged.capital.unwrap_or(defaults.capital),
            assets: merged.assets.unwrap_or(defaults.assets),
            liquidity: merged.liquidity.unwrap_or(defaults.liquidity),
            short_term: merged.short_term.unwrap_or(defaults.short_term),
            exposure_cap: merged.exposure_cap.unwrap_or(defaults.exposure_cap),
        })
    }

    pub fn get(&self, field: BalanceField) -> Decimal {
        match field {
            BalanceField::Capital => self.capital,
            BalanceField::Assets => self.assets,
            BalanceField::Liquidity => self.liquidity,
            BalanceField::ShortTerm => self.short_term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_institution_id_equality() {
        let a = InstitutionId::new("A");
        let b = InstitutionId::new("A");
        let c = InstitutionId::new("B");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(format!("{}", c), "B");
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let inst = Institution::resolve(
            &InstitutionRecord::new("A"),
            None,
            &BalanceSheetDefaults::default(),
        )
        .unwrap();
        assert_eq!(inst.capital, dec!(10));
        assert_eq!(inst.assets, dec!(50));
        assert_eq!(inst.liquidity, dec!(5));
        assert_eq!(inst.short_term, dec!(20));
        assert_eq!(inst.exposure_cap, dec!(10));
    }

    #[test]
    fn test_resolve_precedence() {
        let record = InstitutionRecord::with_params(
            "A",
            NodeParams::new()
                .with(BalanceField::Capital, dec!(12))
                .with(BalanceField::Assets, dec!(80)),
        );
        let overrides = NodeParams::new().with(BalanceField::Capital, dec!(3));
        let inst =
            Institution::resolve(&record, Some(&overrides), &BalanceSheetDefaults::default())
                .unwrap();
        assert_eq!(inst.capital, dec!(3));
        assert_eq!(inst.assets, dec!(80));
        assert_eq!(inst.liquidity, dec!(5));
    }

    #[test]
    fn test_negative_value_rejected() {
        let overrides = NodeParams::new().with(BalanceField::Liquidity, dec!(-1));
        let err = Institution::resolve(
            &InstitutionRecord::new("A"),
            Some(&overrides),
            &BalanceSheetDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { ref field, .. } if field == "liquidity"));
    }

    #[test]
    fn test_negative_exposure_cap_rejected() {
        let params = NodeParams::new().with_exposure_cap(dec!(-0.5));
        assert!(params.validate("A").is_err());
    }

    #[test]
    fn test_record_deserializes_flat() {
        let record: InstitutionRecord =
            serde_json::from_str(r#"{ "id": "A", "capital": 7.5, "short_term": 12 }"#).unwrap();
        assert_eq!(record.id.as_str(), "A");
        assert_eq!(record.params.capital, Some(dec!(7.5)));
        assert_eq!(record.params.short_term, Some(dec!(12)));
        assert_eq!(record.params.assets, None);
    }

    #[test]
    fn test_field_parse() {
        assert_eq!("short_term".parse::<BalanceField>().unwrap(), BalanceField::ShortTerm);
        assert!("equity".parse::<BalanceField>().is_err());
    }
}
