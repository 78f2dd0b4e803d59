//! Foundational types: institutions, exposures, policy, configuration, errors.

pub mod config;
pub mod error;
pub mod exposure;
pub mod institution;
pub mod policy;
