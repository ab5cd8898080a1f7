//! # Assembler
//!
//! Turns a [`RunConfig`] into a configured [`Controller`] and drives it
//! through a full run. Calls are made in a fixed order:
//!
//! ```text
//! Controller::new ─► set_interactions ─► set_processes ─► initialize ─► generate_events ─► save_events
//! ```
//!
//! Any failure aborts the run; nothing is retried and nothing is written
//! unless generation completed.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::RunConfig;
use crate::controller::Controller;
use crate::error::InjectorResult;
use crate::interactions::{CrossSection, DisFromSpline, InteractionCollection};
use crate::resources::ResourceRoot;

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub events: usize,
    pub failed_attempts: usize,
    pub total_weight: f64,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct Assembler {
    config: RunConfig,
    resources: ResourceRoot,
}

impl Assembler {
    pub fn new(config: RunConfig) -> Self {
        let resources = config.resource_root();
        Self { config, resources }
    }

    /// Read tables and detector models from `resources` instead
    pub fn with_resources(mut self, resources: ResourceRoot) -> Self {
        self.resources = resources;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceRoot {
        &self.resources
    }

    /// Load every configured cross-section model for the primary
    pub fn build_interactions(&self) -> InjectorResult<InteractionCollection> {
        let primary = self.config.primary;
        let cross_sections = self
            .config
            .interactions
            .iter()
            .map(|ic| {
                let differential = self.resources.cross_section_table(&ic.model, &ic.differential)?;
                let total = self.resources.cross_section_table(&ic.model, &ic.total)?;
                let model = DisFromSpline::from_files(differential, total, &[primary], &ic.targets)?;
                Ok(Arc::new(model) as Arc<dyn CrossSection>)
            })
            .collect::<InjectorResult<Vec<_>>>()?;
        InteractionCollection::new(primary, cross_sections)
    }

    /// Controller with interactions and processes registered, not yet initialized
    pub fn assemble(&self) -> InjectorResult<Controller> {
        let mut controller = Controller::new(self.config.controller_config(self.resources.clone()))?;
        let primary = self.config.primary;

        controller.set_interactions(primary, self.build_interactions()?)?;

        let (targets, _) = controller.detector_model_targets();
        controller.set_processes(
            primary,
            self.config.injection_set(&targets),
            self.config.physical_set(&targets),
        )?;
        Ok(controller)
    }

    /// Assemble, initialize, generate and save
    pub fn run(&self) -> InjectorResult<RunReport> {
        let mut controller = self.assemble()?;
        controller.initialize()?;

        let (events, failed_attempts, total_weight) = {
            let set = controller.generate_events()?;
            (set.len(), set.failed_attempts, set.total_weight())
        };
        let (json_path, csv_path) = controller.save_events(&self.config.output)?;

        info!(
            events,
            output = %self.config.output.display(),
            "Run complete"
        );
        Ok(RunReport {
            events,
            failed_attempts,
            total_weight,
            json_path,
            csv_path,
            summary: controller.summary(),
        })
    }
}
