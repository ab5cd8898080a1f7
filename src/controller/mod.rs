//! # Controller
//!
//! Orchestrates one generation run.
//!
//! ## Lifecycle
//!
//! ```text
//! new ─► set_interactions ─► set_processes ─► initialize ─► generate_events ─► save_events
//!        (Configuring)                        (Initialized)  (Generated)
//! ```
//!
//! Registrations are only accepted while configuring. `initialize` checks
//! that the registrations form a coherent run; generation refuses to start
//! before it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::dataclasses::ParticleType;
use crate::detector::DetectorModel;
use crate::distributions::DistributionSet;
use crate::error::{InjectorError, InjectorResult};
use crate::events::EventSet;
use crate::injection::{Injector, PrimaryProcess, DEFAULT_MAX_ATTEMPTS};
use crate::interactions::InteractionCollection;
use crate::resources::ResourceRoot;

/// Failure fraction above which generation logs a warning
const FAILURE_WARN_FRACTION: f64 = 0.5;

/// Run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of events to generate
    pub events_to_inject: usize,
    /// Experiment (detector model) name
    pub experiment: String,
    /// Run seed
    pub seed: u64,
    /// Sampling attempts per event before giving up
    pub max_attempts_per_event: usize,
    pub resources: ResourceRoot,
}

impl ControllerConfig {
    pub fn new(events_to_inject: usize, experiment: impl Into<String>) -> Self {
        Self {
            events_to_inject,
            experiment: experiment.into(),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_resources(mut self, resources: ResourceRoot) -> Self {
        self.resources = resources;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            events_to_inject: 1000,
            experiment: "DUNEFD".to_string(),
            seed: 42,
            max_attempts_per_event: DEFAULT_MAX_ATTEMPTS,
            resources: ResourceRoot::bundled(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Configuring,
    Initialized,
    Generated,
}

/// Experiment controller
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    detector: DetectorModel,
    interactions: Option<InteractionCollection>,
    process: Option<PrimaryProcess>,
    state: ControllerState,
    events: Option<EventSet>,
}

impl Controller {
    /// Create a controller and load the experiment's detector model
    pub fn new(config: ControllerConfig) -> InjectorResult<Self> {
        let detector = DetectorModel::load(&config.resources, &config.experiment)?;
        Ok(Self::with_detector(config, detector))
    }

    /// Create a controller around an already loaded detector model
    pub fn with_detector(config: ControllerConfig, detector: DetectorModel) -> Self {
        info!(
            experiment = %config.experiment,
            events = config.events_to_inject,
            seed = config.seed,
            "Controller created"
        );
        Self {
            config,
            detector,
            interactions: None,
            process: None,
            state: ControllerState::Configuring,
            events: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn detector_model(&self) -> &DetectorModel {
        &self.detector
    }

    /// Primary declared by the registrations so far
    pub fn primary_type(&self) -> Option<ParticleType> {
        self.interactions
            .as_ref()
            .map(|c| c.primary_type())
            .or_else(|| self.process.as_ref().map(|p| p.primary_type))
    }

    pub fn events(&self) -> Option<&EventSet> {
        self.events.as_ref()
    }

    fn require_configuring(&self, operation: &str) -> InjectorResult<()> {
        if self.state != ControllerState::Configuring {
            return Err(InjectorError::configuration(format!(
                "{} is not allowed after initialize",
                operation
            )));
        }
        Ok(())
    }

    fn require_primary(&self, primary_type: ParticleType) -> InjectorResult<()> {
        match self.primary_type() {
            Some(declared) if declared != primary_type => Err(InjectorError::configuration(format!(
                "primary {} conflicts with the declared primary {}",
                primary_type, declared
            ))),
            _ => Ok(()),
        }
    }

    /// Register the cross-section models of a primary
    pub fn set_interactions(&mut self, primary_type: ParticleType, collection: InteractionCollection) -> InjectorResult<()> {
        self.require_configuring("set_interactions")?;
        if collection.primary_type() != primary_type {
            return Err(InjectorError::configuration(format!(
                "interaction collection is for {}, not {}",
                collection.primary_type(),
                primary_type
            )));
        }
        if let Some(process) = &self.process {
            if process.primary_type != primary_type {
                return Err(InjectorError::configuration(format!(
                    "primary {} conflicts with the declared primary {}",
                    primary_type, process.primary_type
                )));
            }
        }

        info!(
            primary = %primary_type,
            models = collection.cross_sections().len(),
            targets = ?collection.target_types(),
            "Interactions registered"
        );
        self.interactions = Some(collection);
        Ok(())
    }

    /// Register the injection and physical distributions of a primary
    pub fn set_processes(
        &mut self,
        primary_type: ParticleType,
        injection: DistributionSet,
        physical: DistributionSet,
    ) -> InjectorResult<()> {
        self.require_configuring("set_processes")?;
        if let Some(interactions) = &self.interactions {
            if interactions.primary_type() != primary_type {
                return Err(InjectorError::configuration(format!(
                    "primary {} conflicts with the declared primary {}",
                    primary_type,
                    interactions.primary_type()
                )));
            }
        }

        info!(
            primary = %primary_type,
            injection = ?injection.keys(),
            physical = ?physical.keys(),
            "Processes registered"
        );
        self.process = Some(PrimaryProcess::new(primary_type, injection, physical));
        Ok(())
    }

    /// Targets present in the detector model and their names
    pub fn detector_model_targets(&self) -> (Vec<ParticleType>, Vec<String>) {
        let targets = self.detector.targets();
        let names = targets.iter().map(|t| t.to_string()).collect();
        (targets, names)
    }

    /// Check the registrations and prepare for generation
    pub fn initialize(&mut self) -> InjectorResult<()> {
        self.require_configuring("initialize")?;

        if self.config.events_to_inject == 0 {
            return Err(InjectorError::configuration("events_to_inject must be positive"));
        }
        let interactions = self
            .interactions
            .as_ref()
            .ok_or_else(|| InjectorError::configuration("no interactions registered"))?;
        let process = self
            .process
            .as_ref()
            .ok_or_else(|| InjectorError::configuration("no processes registered"))?;
        self.require_primary(process.primary_type)?;
        process.validate()?;

        // A forced-interaction sampler needs targets that both interact and exist
        let detector_targets: BTreeSet<ParticleType> = self.detector.targets().into_iter().collect();
        if let Some(position) = process.injection.position() {
            if !position.target_types().is_empty() {
                let usable: Vec<ParticleType> = position
                    .target_types()
                    .iter()
                    .copied()
                    .filter(|t| interactions.has_target(*t) && detector_targets.contains(t))
                    .collect();
                if usable.is_empty() {
                    return Err(InjectorError::configuration(format!(
                        "position targets {:?} share nothing with interaction targets {:?} in {}",
                        position.target_types(),
                        interactions.target_types(),
                        self.detector.name
                    )));
                }
            }
        }
        if !interactions.target_types().iter().any(|t| detector_targets.contains(t)) {
            return Err(InjectorError::configuration(format!(
                "no interaction target of {} exists in detector {}",
                process.primary_type, self.detector.name
            )));
        }

        self.state = ControllerState::Initialized;
        info!(
            primary = %process.primary_type,
            experiment = %self.config.experiment,
            "Controller initialized"
        );
        Ok(())
    }

    /// Generate the configured number of events
    pub fn generate_events(&mut self) -> InjectorResult<&EventSet> {
        if self.state == ControllerState::Configuring {
            return Err(InjectorError::configuration("generate_events called before initialize"));
        }
        let (Some(interactions), Some(process)) = (&self.interactions, &self.process) else {
            return Err(InjectorError::configuration("controller has no registrations"));
        };

        let count = self.config.events_to_inject;
        let seed = self.config.seed;
        info!(events = count, seed, primary = %process.primary_type, "Generating events");
        let start = Instant::now();

        let injector = Injector::new(process, interactions, &self.detector, self.config.max_attempts_per_event);
        let events = injector.generate(count, seed)?;

        let failed_attempts: usize = events.iter().map(|e| e.attempts - 1).sum();
        let total_attempts = failed_attempts + events.len();
        let failure_fraction = failed_attempts as f64 / total_attempts.max(1) as f64;
        if failure_fraction > FAILURE_WARN_FRACTION {
            warn!(
                failed_attempts,
                total_attempts,
                "Most sampling attempts were rejected; check the distribution and cross-section ranges"
            );
        }

        let set = EventSet {
            experiment: self.config.experiment.clone(),
            primary_type: process.primary_type,
            seed,
            events_to_inject: count,
            failed_attempts,
            events,
        };
        info!(
            events = set.len(),
            failed_attempts,
            total_weight = set.total_weight(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );

        self.state = ControllerState::Generated;
        Ok(self.events.insert(set))
    }

    /// Write the generated events to `<prefix>.json` and `<prefix>.csv`
    pub fn save_events(&self, prefix: impl AsRef<Path>) -> InjectorResult<(PathBuf, PathBuf)> {
        let events = self
            .events
            .as_ref()
            .ok_or_else(|| InjectorError::configuration("save_events called before generate_events"))?;
        events.save(prefix)
    }

    /// Short human-readable run description
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Experiment {} ({} sectors), {} events, seed {}\n",
            self.config.experiment,
            self.detector.sectors.len(),
            self.config.events_to_inject,
            self.config.seed
        );
        if let Some(primary) = self.primary_type() {
            s.push_str(&format!("Primary: {}\n", primary));
        }
        if let Some(interactions) = &self.interactions {
            let names: Vec<&str> = interactions.cross_sections().iter().map(|xs| xs.name()).collect();
            s.push_str(&format!("Interactions: {}\n", names.join(", ")));
        }
        if let Some(events) = &self.events {
            s.push_str(&format!(
                "Generated: {} events, {} rejected attempts, total weight {:.4e}\n",
                events.len(),
                events.failed_attempts,
                events.total_weight()
            ));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{
        DepthFunction, DirectionDistribution, EnergyDistribution, PositionDistribution,
    };
    use crate::interactions::tests::FlatCrossSection;
    use crate::interactions::CrossSection;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn collection(primary: ParticleType) -> InteractionCollection {
        let xs: Arc<dyn CrossSection> = Arc::new(FlatCrossSection {
            primaries: vec![primary],
            targets: vec![ParticleType::Nucleon],
            sigma: 1e-38,
        });
        InteractionCollection::new(primary, vec![xs]).unwrap()
    }

    fn distributions(targets: Vec<ParticleType>) -> (DistributionSet, DistributionSet) {
        let physical = DistributionSet::new()
            .with(EnergyDistribution::power_law(2.0, 1e3, 1e6))
            .with(DirectionDistribution::Isotropic);
        let injection = physical.clone().with(PositionDistribution::ColumnDepth {
            radius: 50.0,
            endcap_length: 50.0,
            depth_function: DepthFunction::LeptonDepth,
            target_types: targets,
        });
        (injection, physical)
    }

    fn controller(events: usize) -> Controller {
        Controller::with_detector(ControllerConfig::new(events, "DUNEFD"), DetectorModel::dune_fd())
    }

    fn configured(events: usize) -> Controller {
        let mut c = controller(events);
        c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu)).unwrap();
        let (injection, physical) = distributions(c.detector_model_targets().0);
        c.set_processes(ParticleType::NuMu, injection, physical).unwrap();
        c
    }

    #[test]
    fn test_generate_before_initialize() {
        let mut c = configured(10);
        assert!(matches!(c.generate_events(), Err(InjectorError::Configuration(_))));
        assert!(c.events().is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut c = configured(25);
        c.initialize().unwrap();
        assert_eq!(c.state(), ControllerState::Initialized);

        let events = c.generate_events().unwrap();
        assert_eq!(events.len(), 25);
        assert!(events.iter().all(|e| e.record.signature.primary_type == ParticleType::NuMu));
        assert_eq!(c.state(), ControllerState::Generated);

        let (json, _) = c.save_events(dir.path().join("run")).unwrap();
        assert_eq!(&EventSet::load(json).unwrap(), c.events().unwrap());
        assert!(c.summary().contains("25 events"));
    }

    #[test]
    fn test_registration_after_initialize_rejected() {
        let mut c = configured(5);
        c.initialize().unwrap();
        let result = c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu));
        assert!(matches!(result, Err(InjectorError::Configuration(_))));
        assert!(matches!(c.initialize(), Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_primary_mismatch() {
        let mut c = controller(5);
        assert!(c.set_interactions(ParticleType::NuE, collection(ParticleType::NuMu)).is_err());

        c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu)).unwrap();
        let (injection, physical) = distributions(vec![ParticleType::Nucleon]);
        assert!(c.set_processes(ParticleType::NuE, injection, physical).is_err());
    }

    #[test]
    fn test_missing_registrations() {
        let mut c = controller(5);
        assert!(matches!(c.initialize(), Err(InjectorError::Configuration(_))));

        let mut c = controller(5);
        c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu)).unwrap();
        assert!(matches!(c.initialize(), Err(InjectorError::Configuration(_))));

        let mut c = controller(0);
        c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu)).unwrap();
        let (injection, physical) = distributions(vec![ParticleType::Nucleon]);
        c.set_processes(ParticleType::NuMu, injection, physical).unwrap();
        assert!(matches!(c.initialize(), Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_disjoint_position_targets() {
        let mut c = controller(5);
        c.set_interactions(ParticleType::NuMu, collection(ParticleType::NuMu)).unwrap();
        let (injection, physical) = distributions(vec![ParticleType::EMinus]);
        c.set_processes(ParticleType::NuMu, injection, physical).unwrap();
        assert!(matches!(c.initialize(), Err(InjectorError::Configuration(_))));
    }

    #[test]
    fn test_detector_targets_and_names() {
        let c = controller(1);
        let (targets, names) = c.detector_model_targets();
        assert_eq!(targets.len(), names.len());
        assert!(names.iter().any(|n| n == "Nucleon"));
    }

    #[test]
    fn test_save_without_events() {
        let dir = TempDir::new().unwrap();
        let c = controller(1);
        assert!(c.save_events(dir.path().join("x")).is_err());
        assert!(!dir.path().join("x.json").exists());
    }

    #[test]
    fn test_unknown_experiment() {
        let dir = TempDir::new().unwrap();
        let config = ControllerConfig::new(1, "Nowhere").with_resources(ResourceRoot::new(dir.path()));
        assert!(matches!(Controller::new(config), Err(InjectorError::Resource { .. })));
    }
}
