//! # Run Configuration
//!
//! Parses a run file, the declarative description of one generation run.
//!
//! ```toml
//! events_to_inject = 10000
//! experiment = "DUNEFD"
//! primary = "NuMu"
//! output = "output/DUNE_DIS"
//!
//! [[interactions]]
//! model = "CSMSDISSplines"
//! differential = "dsdxdy_nu_CC_iso.json"
//! total = "sigma_nu_CC_iso.json"
//! targets = ["Nucleon"]
//!
//! [injection.energy]
//! family = "power_law"
//! index = 2.0
//! min = 1e3
//! max = 1e6
//!
//! [injection.direction]
//! family = "isotropic"
//!
//! [injection.position]
//! family = "column_depth"
//! radius = 600.0
//! endcap_length = 600.0
//! depth_function = { type = "lepton_depth" }
//! ```
//!
//! Without a `[physical]` table the physical distributions are the injection
//! ones minus the position. A position sampler without `target_types` uses
//! the detector model's targets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::controller::ControllerConfig;
use crate::dataclasses::ParticleType;
use crate::distributions::{
    DepthFunction, DirectionDistribution, DistributionKey, DistributionSet, EnergyDistribution,
    HelicityDistribution, PositionDistribution,
};
use crate::error::{InjectorError, InjectorResult};
use crate::injection::DEFAULT_MAX_ATTEMPTS;
use crate::resources::ResourceRoot;

/// Top-level run description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_events")]
    pub events_to_inject: usize,
    #[serde(default = "default_experiment")]
    pub experiment: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_event: usize,
    /// Output prefix; `.json` and `.csv` are appended
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Resource root; the bundled resources when absent
    #[serde(default)]
    pub resources: Option<PathBuf>,
    pub primary: ParticleType,
    pub interactions: Vec<InteractionConfig>,
    pub injection: DistributionTables,
    #[serde(default)]
    pub physical: Option<DistributionTables>,
}

fn default_events() -> usize { 1000 }
fn default_experiment() -> String { "DUNEFD".to_string() }
fn default_seed() -> u64 { 42 }
fn default_max_attempts() -> usize { DEFAULT_MAX_ATTEMPTS }
fn default_output() -> PathBuf { PathBuf::from("output/events") }

/// One cross-section model, tables relative to `CrossSections/<model>/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionConfig {
    pub model: String,
    pub differential: String,
    pub total: String,
    #[serde(default = "default_targets")]
    pub targets: Vec<ParticleType>,
}

fn default_targets() -> Vec<ParticleType> {
    vec![ParticleType::Nucleon]
}

/// Optional distribution per key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionTables {
    #[serde(default)]
    pub energy: Option<EnergyDistribution>,
    #[serde(default)]
    pub direction: Option<DirectionDistribution>,
    #[serde(default)]
    pub position: Option<PositionDistribution>,
    #[serde(default)]
    pub helicity: Option<HelicityDistribution>,
}

impl DistributionTables {
    /// Distribution set with empty position targets filled from `default_targets`
    pub fn to_set(&self, default_targets: &[ParticleType]) -> DistributionSet {
        let mut set = DistributionSet::new();
        if let Some(d) = &self.energy {
            set.insert(d.clone());
        }
        if let Some(d) = &self.direction {
            set.insert(d.clone());
        }
        if let Some(d) = &self.position {
            set.insert(d.clone().with_default_targets(default_targets));
        }
        if let Some(d) = &self.helicity {
            set.insert(d.clone());
        }
        set
    }
}

impl RunConfig {
    /// Load a run file
    pub fn load(path: &Path) -> InjectorResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InjectorError::resource(path, e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> InjectorResult<Self> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> InjectorResult<String> {
        toml::to_string_pretty(self).map_err(|e| InjectorError::configuration(e.to_string()))
    }

    pub fn validate(&self) -> InjectorResult<()> {
        if self.interactions.is_empty() {
            return Err(InjectorError::configuration("run file lists no interactions"));
        }
        if let Some(i) = self.interactions.iter().find(|i| i.targets.is_empty()) {
            return Err(InjectorError::configuration(format!(
                "interaction model '{}' lists no targets",
                i.model
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(InjectorError::configuration("output prefix is empty"));
        }
        Ok(())
    }

    /// The resource root this run reads from, unless overridden
    pub fn resource_root(&self) -> ResourceRoot {
        self.resources
            .as_ref()
            .map_or_else(ResourceRoot::bundled, ResourceRoot::new)
    }

    pub fn controller_config(&self, resources: ResourceRoot) -> ControllerConfig {
        ControllerConfig {
            events_to_inject: self.events_to_inject,
            experiment: self.experiment.clone(),
            seed: self.seed,
            max_attempts_per_event: self.max_attempts_per_event,
            resources,
        }
    }

    pub fn injection_set(&self, default_targets: &[ParticleType]) -> DistributionSet {
        self.injection.to_set(default_targets)
    }

    /// Physical set, or the injection set without its position
    pub fn physical_set(&self, default_targets: &[ParticleType]) -> DistributionSet {
        match &self.physical {
            Some(tables) => tables.to_set(default_targets),
            None => {
                let mut set = self.injection.to_set(default_targets);
                set.remove(DistributionKey::Position);
                set
            }
        }
    }

    /// Deep-inelastic νμ charged-current scattering in the DUNE far detector
    pub fn dune_dis() -> Self {
        Self {
            events_to_inject: 10_000,
            experiment: "DUNEFD".to_string(),
            seed: default_seed(),
            max_attempts_per_event: DEFAULT_MAX_ATTEMPTS,
            output: PathBuf::from("output/DUNE_DIS"),
            resources: None,
            primary: ParticleType::NuMu,
            interactions: vec![InteractionConfig {
                model: "CSMSDISSplines".to_string(),
                differential: "dsdxdy_nu_CC_iso.json".to_string(),
                total: "sigma_nu_CC_iso.json".to_string(),
                targets: vec![ParticleType::Nucleon],
            }],
            injection: DistributionTables {
                energy: Some(EnergyDistribution::power_law(2.0, 1e3, 1e6)),
                direction: Some(DirectionDistribution::Isotropic),
                position: Some(PositionDistribution::ColumnDepth {
                    radius: 600.0,
                    endcap_length: 600.0,
                    depth_function: DepthFunction::LeptonDepth,
                    target_types: Vec::new(),
                }),
                helicity: None,
            },
            physical: Some(DistributionTables {
                energy: Some(EnergyDistribution::power_law(2.0, 1e3, 1e6)),
                direction: Some(DirectionDistribution::Isotropic),
                position: None,
                helicity: None,
            }),
        }
    }
}
