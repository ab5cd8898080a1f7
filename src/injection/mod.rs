//! # Injection
//!
//! Event sampling and weighting for one primary process.
//!
//! ## Per-Event Sequence
//!
//! 1. Energy, direction and helicity of the primary
//! 2. Interaction vertex from the position distribution
//! 3. Target, chosen in proportion to σ_t · n_t at the vertex
//! 4. Cross-section model, chosen in proportion to its total cross section
//! 5. Final state from the model
//! 6. Weight from the physical and injection densities
//!
//! A step may reject the attempt with an injection failure; the event is then
//! resampled from its own random stream, up to a fixed number of attempts.

use rand::distributions::{Distribution, WeightedIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataclasses::{InteractionRecord, ParticleType};
use crate::detector::DetectorModel;
use crate::distributions::{DistributionKey, DistributionSet, SamplingContext};
use crate::error::{InjectorError, InjectorResult};
use crate::events::Event;
use crate::interactions::InteractionCollection;
use crate::stochastic::RandomGenerator;

/// Default attempt budget per event
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Keys every injection set must provide
pub const REQUIRED_INJECTION_KEYS: [DistributionKey; 3] = [
    DistributionKey::Energy,
    DistributionKey::Direction,
    DistributionKey::Position,
];

/// Keys every physical set must provide
pub const REQUIRED_PHYSICAL_KEYS: [DistributionKey; 2] = [DistributionKey::Energy, DistributionKey::Direction];

/// Injection (proposal) and physical (target) distributions of one primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryProcess {
    pub primary_type: ParticleType,
    pub injection: DistributionSet,
    pub physical: DistributionSet,
}

impl PrimaryProcess {
    pub fn new(primary_type: ParticleType, injection: DistributionSet, physical: DistributionSet) -> Self {
        Self {
            primary_type,
            injection,
            physical,
        }
    }

    /// Required keys present, physical keys a subset of injection keys,
    /// parameters valid
    pub fn validate(&self) -> InjectorResult<()> {
        for key in REQUIRED_INJECTION_KEYS {
            if !self.injection.contains(key) {
                return Err(InjectorError::configuration(format!(
                    "injection distributions for {} lack '{}'",
                    self.primary_type, key
                )));
            }
        }
        for key in REQUIRED_PHYSICAL_KEYS {
            if !self.physical.contains(key) {
                return Err(InjectorError::configuration(format!(
                    "physical distributions for {} lack '{}'",
                    self.primary_type, key
                )));
            }
        }
        if let Some(key) = self.physical.keys().into_iter().find(|k| !self.injection.contains(*k)) {
            return Err(InjectorError::configuration(format!(
                "physical '{}' distribution has no injection counterpart",
                key
            )));
        }
        self.injection.validate()?;
        self.physical.validate()
    }
}

// ============================================================================
// WEIGHTER
// ============================================================================

/// Ratio of physical to injection densities
#[derive(Debug, Clone, Copy)]
pub struct Weighter<'a> {
    process: &'a PrimaryProcess,
    context: SamplingContext<'a>,
}

impl<'a> Weighter<'a> {
    pub fn new(process: &'a PrimaryProcess, context: SamplingContext<'a>) -> Self {
        Self { process, context }
    }

    /// Π_k p_phys,k / p_inj,k over the physical keys, times the interaction
    /// probability of the injection path
    pub fn weight(&self, record: &InteractionRecord, interaction_probability: f64) -> InjectorResult<f64> {
        let mut weight = interaction_probability;
        for (key, physical) in self.process.physical.iter() {
            let injection = self.process.injection.get(*key).ok_or_else(|| {
                InjectorError::configuration(format!("no injection '{}' distribution", key))
            })?;
            if injection == physical {
                continue;
            }

            let p_inj = injection.density(&self.context, record);
            if !(p_inj > 0.0) {
                return Err(InjectorError::Generation(format!(
                    "injection '{}' density vanishes for a sampled event",
                    key
                )));
            }
            weight *= physical.density(&self.context, record) / p_inj;
        }
        Ok(weight)
    }
}

// ============================================================================
// INJECTOR
// ============================================================================

/// Samples events for one primary process
#[derive(Debug, Clone, Copy)]
pub struct Injector<'a> {
    process: &'a PrimaryProcess,
    interactions: &'a InteractionCollection,
    detector: &'a DetectorModel,
    max_attempts: usize,
}

impl<'a> Injector<'a> {
    pub fn new(
        process: &'a PrimaryProcess,
        interactions: &'a InteractionCollection,
        detector: &'a DetectorModel,
        max_attempts: usize,
    ) -> Self {
        Self {
            process,
            interactions,
            detector,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn context(&self) -> SamplingContext<'a> {
        SamplingContext {
            detector: self.detector,
            interactions: self.interactions,
        }
    }

    pub fn weighter(&self) -> Weighter<'a> {
        Weighter::new(self.process, self.context())
    }

    /// One sampling attempt: the record and its path interaction probability
    pub fn sample_record(&self, rng: &mut RandomGenerator) -> InjectorResult<(InteractionRecord, f64)> {
        let ctx = self.context();
        let injection = &self.process.injection;
        let mut record = InteractionRecord::new(self.process.primary_type);

        injection.sample_kinematics(&mut record, rng);

        let position = injection
            .position()
            .ok_or_else(|| InjectorError::configuration("no injection position distribution"))?
            .sample(&ctx, &record, rng)?;
        record.interaction_vertex = position.vertex;
        record.primary_initial_position = position.initial_position;

        // Target in proportion to the local interaction density
        let energy = record.primary_energy();
        let targets = self.interactions.target_types();
        let densities: Vec<f64> = targets
            .iter()
            .map(|t| {
                self.interactions.total_cross_section(energy, *t)
                    * self.detector.target_number_density(&position.vertex, *t)
            })
            .collect();
        let target = WeightedIndex::new(&densities)
            .map(|w| targets[w.sample(rng)])
            .map_err(|_| InjectorError::injection_failure("no interacting target at the vertex"))?;
        record.set_target(target);

        // Model in proportion to its cross section
        let models = self.interactions.cross_sections_for_target(target);
        let sigmas: Vec<f64> = models
            .iter()
            .map(|xs| xs.total_cross_section(self.process.primary_type, energy, target))
            .collect();
        let model = WeightedIndex::new(&sigmas)
            .map(|w| models[w.sample(rng)])
            .map_err(|_| InjectorError::injection_failure(format!("no cross section on {}", target)))?;

        model.sample_final_state(&mut record, rng)?;
        Ok((record, position.interaction_probability))
    }

    /// Generate event `index` from its own stream of `seed`
    pub fn generate_event(&self, index: usize, seed: u64) -> InjectorResult<Event> {
        let mut rng = RandomGenerator::for_stream(seed, index as u64);
        let weighter = self.weighter();

        for attempt in 1..=self.max_attempts {
            match self.sample_record(&mut rng) {
                Ok((record, interaction_probability)) => {
                    let weight = weighter.weight(&record, interaction_probability)?;
                    return Ok(Event {
                        index,
                        record,
                        weight,
                        interaction_probability,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() => {
                    debug!(event = index, attempt, reason = %e, "Resampling event");
                }
                Err(e) => return Err(e),
            }
        }

        Err(InjectorError::Generation(format!(
            "event {} failed {} sampling attempts",
            index, self.max_attempts
        )))
    }

    /// Generate `count` events in parallel, ordered by index
    pub fn generate(&self, count: usize, seed: u64) -> InjectorResult<Vec<Event>> {
        (0..count)
            .into_par_iter()
            .map(|index| self.generate_event(index, seed))
            .collect()
    }
}
