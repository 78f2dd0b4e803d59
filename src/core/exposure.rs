use crate::core::error::EngineError;
use crate::core::institution::InstitutionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A directed exposure between two institutions.
///
/// If `source` defaults, `target` absorbs a capital loss of `weight`.
/// This is the atomic unit of the exposure network.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::core::exposure::Exposure;
/// use systemic_risk_engine::core::institution::InstitutionId;
/// use rust_decimal_macros::dec;
///
/// let exposure = Exposure::new(
///     InstitutionId::new("A"),
///     InstitutionId::new("B"),
///     dec!(2.0),
/// ).unwrap();
///
/// assert_eq!(exposure.weight(), dec!(2.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    source: InstitutionId,
    target: InstitutionId,
    weight: Decimal,
}

impl Exposure {
    /// Create a new exposure. Weights must be non-negative.
    pub fn new(
        source: InstitutionId,
        target: InstitutionId,
        weight: Decimal,
    ) -> Result<Self, EngineError> {
        let exposure = Self {
            source,
            target,
            weight,
        };
        exposure.validate()?;
        Ok(exposure)
    }

    /// Deserialized exposures bypass `new`, so the network re-checks them here.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.weight < Decimal::ZERO {
            return Err(EngineError::invalid(
                format!("exposure {} -> {}", self.source, self.target),
                "weight",
                format!("must be non-negative, got {}", self.weight),
            ));
        }
        Ok(())
    }

    /// The institution whose default causes the loss.
    pub fn source(&self) -> &InstitutionId {
        &self.source
    }

    /// The institution that absorbs the loss.
    pub fn target(&self) -> &InstitutionId {
        &self.target
    }

    /// Capital loss absorbed by `target`.
    pub fn weight(&self) -> Decimal {
        self.weight
    }
}

/// An ordered collection of exposures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExposureSet {
    exposures: Vec<Exposure>,
}

impl ExposureSet {
    /// Create an empty exposure set.
    pub fn new() -> Self {
        Self {
            exposures: Vec::new(),
        }
    }

    /// Append an exposure, keeping insertion order.
    pub fn add(&mut self, exposure: Exposure) {
        self.exposures.push(exposure);
    }

    /// All exposures in insertion order.
    pub fn exposures(&self) -> &[Exposure] {
        &self.exposures
    }

    /// Number of exposures.
    pub fn len(&self) -> usize {
        self.exposures.len()
    }

    /// Whether the set holds no exposures.
    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }

    /// Exposures that land on `target`.
    pub fn incoming<'a>(&'a self, target: &'a InstitutionId) -> impl Iterator<Item = &'a Exposure> {
        self.exposures.iter().filter(move |e| e.target() == target)
    }
}

impl FromIterator<Exposure> for ExposureSet {
    fn from_iter<T: IntoIterator<Item = Exposure>>(iter: T) -> Self {
        Self {
            exposures: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exposure(from: &str, to: &str, w: Decimal) -> Exposure {
        Exposure::new(InstitutionId::new(from), InstitutionId::new(to), w).unwrap()
    }

    #[test]
    fn test_exposure_creation() {
        let e = exposure("A", "B", dec!(1.5));
        assert_eq!(e.source().as_str(), "A");
        assert_eq!(e.target().as_str(), "B");
        assert_eq!(e.weight(), dec!(1.5));
    }

    #[test]
    fn test_zero_weight_allowed() {
        assert!(Exposure::new(InstitutionId::new("A"), InstitutionId::new("B"), Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = Exposure::new(InstitutionId::new("A"), InstitutionId::new("B"), dec!(-2))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { ref field, .. } if field == "weight"));
    }

    #[test]
    fn test_exposure_set_queries() {
        let set: ExposureSet = vec![
            exposure("A", "B", dec!(2)),
            exposure("C", "B", dec!(1)),
            exposure("B", "C", dec!(4)),
        ]
        .into_iter()
        .collect();

        let b = InstitutionId::new("B");
        assert_eq!(set.len(), 3);
        assert!(!set.is_empty());
        assert_eq!(set.incoming(&b).count(), 2);
        assert!(ExposureSet::new().is_empty());
    }

    #[test]
    fn test_exposure_json_shape() {
        let e: Exposure =
            serde_json::from_str(r#"{ "source": "A", "target": "B", "weight": 2.2 }"#).unwrap();
        assert_eq!(e.weight(), dec!(2.2));
    }
}
