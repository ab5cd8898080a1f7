//! # Distributions
//!
//! Samplers for the primary's kinematics and interaction vertex.
//!
//! Each quantity has a closed set of variants. A [`DistributionSet`] holds at
//! most one distribution per [`DistributionKey`]; the injector samples from
//! one set and the weighter evaluates a second ("physical") set against it.

pub mod direction;
pub mod energy;
pub mod position;

pub use direction::DirectionDistribution;
pub use energy::EnergyDistribution;
pub use position::{DepthFunction, PositionDistribution, PositionSample};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::dataclasses::{InteractionRecord, ParticleType};
use crate::detector::DetectorModel;
use crate::error::{InjectorError, InjectorResult};
use crate::interactions::InteractionCollection;
use crate::stochastic::RandomGenerator;

/// What sampling needs besides the record itself
#[derive(Debug, Clone, Copy)]
pub struct SamplingContext<'a> {
    pub detector: &'a DetectorModel,
    pub interactions: &'a InteractionCollection,
}

// ============================================================================
// HELICITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum HelicityDistribution {
    /// Left-handed neutrinos, right-handed antineutrinos
    PrimaryNeutrino,
}

impl HelicityDistribution {
    pub fn helicity_for(&self, primary: ParticleType) -> f64 {
        match self {
            HelicityDistribution::PrimaryNeutrino => {
                if primary.is_antiparticle() {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    pub fn sample(&self, record: &mut InteractionRecord) {
        record.primary_helicity = self.helicity_for(record.signature.primary_type);
    }

    pub fn density(&self, record: &InteractionRecord) -> f64 {
        if record.primary_helicity == self.helicity_for(record.signature.primary_type) {
            1.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// KEYS AND SETS
// ============================================================================

/// The quantity a distribution samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKey {
    Energy,
    Direction,
    Position,
    Helicity,
}

impl DistributionKey {
    pub const ALL: [DistributionKey; 4] = [
        DistributionKey::Energy,
        DistributionKey::Direction,
        DistributionKey::Position,
        DistributionKey::Helicity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionKey::Energy => "energy",
            DistributionKey::Direction => "direction",
            DistributionKey::Position => "position",
            DistributionKey::Helicity => "helicity",
        }
    }
}

impl fmt::Display for DistributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionKey {
    type Err = InjectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DistributionKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| InjectorError::configuration(format!("unknown distribution key '{}'", s)))
    }
}

/// One distribution of any kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryDistribution {
    Energy(EnergyDistribution),
    Direction(DirectionDistribution),
    Position(PositionDistribution),
    Helicity(HelicityDistribution),
}

impl PrimaryDistribution {
    pub fn key(&self) -> DistributionKey {
        match self {
            PrimaryDistribution::Energy(_) => DistributionKey::Energy,
            PrimaryDistribution::Direction(_) => DistributionKey::Direction,
            PrimaryDistribution::Position(_) => DistributionKey::Position,
            PrimaryDistribution::Helicity(_) => DistributionKey::Helicity,
        }
    }

    pub fn validate(&self) -> InjectorResult<()> {
        match self {
            PrimaryDistribution::Energy(d) => d.validate(),
            PrimaryDistribution::Direction(d) => d.validate(),
            PrimaryDistribution::Position(d) => d.validate(),
            PrimaryDistribution::Helicity(_) => Ok(()),
        }
    }

    /// Generation density of the quantity this distribution controls
    pub fn density(&self, ctx: &SamplingContext<'_>, record: &InteractionRecord) -> f64 {
        match self {
            PrimaryDistribution::Energy(d) => d.density(record),
            PrimaryDistribution::Direction(d) => d.density(record),
            PrimaryDistribution::Position(d) => d.density(ctx, record),
            PrimaryDistribution::Helicity(d) => d.density(record),
        }
    }
}

impl From<EnergyDistribution> for PrimaryDistribution {
    fn from(d: EnergyDistribution) -> Self {
        PrimaryDistribution::Energy(d)
    }
}

impl From<DirectionDistribution> for PrimaryDistribution {
    fn from(d: DirectionDistribution) -> Self {
        PrimaryDistribution::Direction(d)
    }
}

impl From<PositionDistribution> for PrimaryDistribution {
    fn from(d: PositionDistribution) -> Self {
        PrimaryDistribution::Position(d)
    }
}

impl From<HelicityDistribution> for PrimaryDistribution {
    fn from(d: HelicityDistribution) -> Self {
        PrimaryDistribution::Helicity(d)
    }
}

/// At most one distribution per key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSet {
    distributions: BTreeMap<DistributionKey, PrimaryDistribution>,
}

impl DistributionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the distribution's own key, replacing any previous one
    pub fn insert(&mut self, dist: impl Into<PrimaryDistribution>) {
        let dist = dist.into();
        self.distributions.insert(dist.key(), dist);
    }

    /// Insert under a string key, which must name the distribution's kind
    pub fn insert_named(&mut self, name: &str, dist: impl Into<PrimaryDistribution>) -> InjectorResult<()> {
        let key: DistributionKey = name.parse()?;
        let dist = dist.into();
        if dist.key() != key {
            return Err(InjectorError::configuration(format!(
                "a {} distribution cannot be registered as '{}'",
                dist.key(),
                key
            )));
        }
        self.distributions.insert(key, dist);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, dist: impl Into<PrimaryDistribution>) -> Self {
        self.insert(dist);
        self
    }

    pub fn get(&self, key: DistributionKey) -> Option<&PrimaryDistribution> {
        self.distributions.get(&key)
    }

    pub fn remove(&mut self, key: DistributionKey) -> Option<PrimaryDistribution> {
        self.distributions.remove(&key)
    }

    pub fn contains(&self, key: DistributionKey) -> bool {
        self.distributions.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<DistributionKey> {
        self.distributions.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DistributionKey, &PrimaryDistribution)> {
        self.distributions.iter()
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    pub fn energy(&self) -> Option<&EnergyDistribution> {
        match self.get(DistributionKey::Energy) {
            Some(PrimaryDistribution::Energy(d)) => Some(d),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<&DirectionDistribution> {
        match self.get(DistributionKey::Direction) {
            Some(PrimaryDistribution::Direction(d)) => Some(d),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&PositionDistribution> {
        match self.get(DistributionKey::Position) {
            Some(PrimaryDistribution::Position(d)) => Some(d),
            _ => None,
        }
    }

    pub fn helicity(&self) -> Option<&HelicityDistribution> {
        match self.get(DistributionKey::Helicity) {
            Some(PrimaryDistribution::Helicity(d)) => Some(d),
            _ => None,
        }
    }

    pub fn validate(&self) -> InjectorResult<()> {
        self.distributions.values().try_for_each(|d| d.validate())
    }

    /// Sample energy, direction and helicity of the primary
    pub fn sample_kinematics(&self, record: &mut InteractionRecord, rng: &mut RandomGenerator) {
        if let Some(d) = self.energy() {
            d.sample(record, rng);
        }
        if let Some(d) = self.direction() {
            d.sample(record, rng);
        }
        if let Some(d) = self.helicity() {
            d.sample(record);
        }
    }
}
