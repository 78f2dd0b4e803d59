use crate::core::error::EngineError;
use crate::core::exposure::{Exposure, ExposureSet};
use crate::core::institution::{InstitutionId, InstitutionRecord};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// On-disk shape of a network: `{ "nodes": [...], "edges": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub nodes: Vec<InstitutionRecord>,
    #[serde(default)]
    pub edges: Vec<Exposure>,
}

/// A directed, weighted network of interbank exposures.
///
/// Institutions keep their declaration order, which is the order used in
/// reports. Exposures are stored as given; referential integrity is
/// checked by [`FinancialNetwork::validate`], which the encoder runs
/// before building any constraints.
///
/// # Examples
///
/// ```
/// use systemic_risk_engine::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let mut network = FinancialNetwork::new();
/// network.add_institution(InstitutionRecord::new("A")).unwrap();
/// network.add_institution(InstitutionRecord::new("B")).unwrap();
/// network.add_exposure(Exposure::new("A".into(), "B".into(), dec!(2.0)).unwrap());
///
/// assert_eq!(network.institution_count(), 2);
/// assert_eq!(network.incoming_weight(&"B".into()), dec!(2.0));
/// assert!(network.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialNetwork {
    institutions: Vec<InstitutionRecord>,
    index: HashMap<InstitutionId, usize>,
    exposures: ExposureSet,
}

impl FinancialNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an institution. Ids must be unique.
    pub fn add_institution(&mut self, record: InstitutionRecord) -> Result<(), EngineError> {
        if self.index.contains_key(&record.id) {
            return Err(EngineError::invalid(
                record.id.as_str(),
                "id",
                "institution declared more than once",
            ));
        }
        self.index.insert(record.id.clone(), self.institutions.len());
        self.institutions.push(record);
        Ok(())
    }

    /// Add an exposure. Endpoints are not checked here; see [`Self::validate`].
    pub fn add_exposure(&mut self, exposure: Exposure) {
        self.exposures.add(exposure);
    }

    pub fn from_document(doc: NetworkDocument) -> Result<Self, EngineError> {
        let mut network = Self::new();
        for record in doc.nodes {
            network.add_institution(record)?;
        }
        for exposure in doc.edges {
            network.add_exposure(exposure);
        }
        Ok(network)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let doc: NetworkDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    pub fn to_document(&self) -> NetworkDocument {
        NetworkDocument {
            nodes: self.institutions.clone(),
            edges: self.exposures.exposures().to_vec(),
        }
    }

    /// Check declared values, exposure weights and exposure endpoints.
    pub fn validate(&self) -> Result<(), EngineError> {
        for record in &self.institutions {
            record.params.validate(record.id.as_str())?;
        }
        for exposure in self.exposures.exposures() {
            exposure.validate()?;
            for endpoint in [exposure.source(), exposure.target()] {
                if !self.contains(endpoint) {
                    warn!(
                        "exposure {} -> {} names undeclared institution '{}'",
                        exposure.source(),
                        exposure.target(),
                        endpoint
                    );
                    return Err(EngineError::UnknownReference {
                        from: exposure.source().clone(),
                        to: exposure.target().clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &InstitutionId) -> bool {
        self.index.contains_key(id)
    }

    /// Institutions in declaration order.
    pub fn institutions(&self) -> &[InstitutionRecord] {
        &self.institutions
    }

    pub fn exposures(&self) -> &ExposureSet {
        &self.exposures
    }

    pub fn institution_count(&self) -> usize {
        self.institutions.len()
    }

    pub fn exposure_count(&self) -> usize {
        self.exposures.len()
    }

    /// Exposures landing on `id`, as (source, weight).
    pub fn incoming(&self, id: &InstitutionId) -> Vec<(&InstitutionId, Decimal)> {
        self.exposures
            .exposures()
            .iter()
            .filter(|e| e.target() == id)
            .map(|e| (e.source(), e.weight()))
            .collect()
    }

    /// Exposures leaving `id`, as (target, weight).
    pub fn outgoing(&self, id: &InstitutionId) -> Vec<(&InstitutionId, Decimal)> {
        self.exposures
            .exposures()
            .iter()
            .filter(|e| e.source() == id)
            .map(|e| (e.target(), e.weight()))
            .collect()
    }

    /// Total loss `id` would absorb if every one of its sources defaulted.
    pub fn incoming_weight(&self, id: &InstitutionId) -> Decimal {
        self.exposures.incoming(id).map(|e| e.weight()).sum()
    }
}
