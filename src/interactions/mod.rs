//! # Interactions
//!
//! Cross-section models and their grouping per primary type.
//!
//! A model reports total cross sections for (primary, target) pairs and
//! samples the final state of an interaction into an [`InteractionRecord`].
//! All cross sections are in m².

pub mod spline;

pub use spline::{
    CrossSectionUnit, DifferentialCrossSectionTable, DisFromSpline, InteractionKind,
    TotalCrossSectionTable,
};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::dataclasses::{InteractionRecord, InteractionSignature, ParticleType};
use crate::error::{InjectorError, InjectorResult};
use crate::stochastic::RandomGenerator;

/// A cross-section model
pub trait CrossSection: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Total cross section (m²), zero for unsupported pairs
    fn total_cross_section(&self, primary: ParticleType, energy: f64, target: ParticleType) -> f64;

    /// Fill the secondaries and interaction parameters of `record`.
    ///
    /// The primary and target must already be set. Returns an injection
    /// failure when the sampled kinematics are not physical.
    fn sample_final_state(&self, record: &mut InteractionRecord, rng: &mut RandomGenerator) -> InjectorResult<()>;

    fn possible_primaries(&self) -> Vec<ParticleType>;

    fn possible_targets(&self) -> Vec<ParticleType>;

    /// Signatures this model can produce for a primary
    fn signatures(&self, primary: ParticleType) -> Vec<InteractionSignature>;
}

// ============================================================================
// INTERACTION COLLECTION
// ============================================================================

/// The models applicable to one primary type
#[derive(Debug, Clone)]
pub struct InteractionCollection {
    primary_type: ParticleType,
    cross_sections: Vec<Arc<dyn CrossSection>>,
    target_types: BTreeSet<ParticleType>,
}

impl InteractionCollection {
    /// Group models under a primary type; every model must accept it
    pub fn new(primary_type: ParticleType, cross_sections: Vec<Arc<dyn CrossSection>>) -> InjectorResult<Self> {
        if cross_sections.is_empty() {
            return Err(InjectorError::configuration(format!(
                "interaction collection for {} has no cross sections",
                primary_type
            )));
        }
        for xs in &cross_sections {
            if !xs.possible_primaries().contains(&primary_type) {
                return Err(InjectorError::configuration(format!(
                    "cross section '{}' does not accept primary {}",
                    xs.name(),
                    primary_type
                )));
            }
        }

        let target_types = cross_sections
            .iter()
            .flat_map(|xs| xs.possible_targets())
            .collect();

        Ok(Self {
            primary_type,
            cross_sections,
            target_types,
        })
    }

    pub fn primary_type(&self) -> ParticleType {
        self.primary_type
    }

    pub fn cross_sections(&self) -> &[Arc<dyn CrossSection>] {
        &self.cross_sections
    }

    /// Targets any model interacts with, sorted
    pub fn target_types(&self) -> Vec<ParticleType> {
        self.target_types.iter().copied().collect()
    }

    pub fn has_target(&self, target: ParticleType) -> bool {
        self.target_types.contains(&target)
    }

    /// Models interacting with `target`
    pub fn cross_sections_for_target(&self, target: ParticleType) -> Vec<&Arc<dyn CrossSection>> {
        self.cross_sections
            .iter()
            .filter(|xs| xs.possible_targets().contains(&target))
            .collect()
    }

    /// Sum over models of the total cross section on `target` (m²)
    pub fn total_cross_section(&self, energy: f64, target: ParticleType) -> f64 {
        self.cross_sections
            .iter()
            .map(|xs| xs.total_cross_section(self.primary_type, energy, target))
            .sum()
    }

    /// Total cross section on each of `targets`, in order
    pub fn total_cross_sections(&self, energy: f64, targets: &[ParticleType]) -> Vec<f64> {
        targets
            .iter()
            .map(|t| self.total_cross_section(energy, *t))
            .collect()
    }
}
