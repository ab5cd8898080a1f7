//! # NUINJECTOR-RS
//!
//! Monte Carlo neutrino interaction injector
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          NUINJECTOR-RS                                      │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  CONFIG       RunConfig (TOML) ─► Assembler                                 │
//! │  CONTROLLER   registrations, lifecycle, generate / save                     │
//! │  INJECTION    per-event sampling, retries, weights (rayon)                  │
//! │  SAMPLING     energy, direction, position, helicity distributions           │
//! │  PHYSICS      cross-section tables, detector geometry and column depth      │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units
//!
//! GeV for energies and masses, meters for lengths, kg/m³ for densities,
//! kg/m² for column depths and m² for cross sections.
//!
//! ## Reproducibility
//!
//! Event `i` of a run draws from its own random stream derived from
//! `(seed, i)`, so an event set depends only on the configuration and seed,
//! not on the number of worker threads.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod controller;
pub mod dataclasses;
pub mod detector;
pub mod distributions;
pub mod error;
pub mod events;
pub mod injection;
pub mod interactions;
pub mod resources;
pub mod stochastic;
pub mod types;

// Re-exports
pub use assembler::{Assembler, RunReport};
pub use config::RunConfig;
pub use controller::{Controller, ControllerConfig, ControllerState};
pub use dataclasses::{InteractionRecord, InteractionSignature, ParticleType};
pub use detector::DetectorModel;
pub use distributions::{
    DepthFunction, DirectionDistribution, DistributionSet, EnergyDistribution,
    HelicityDistribution, PositionDistribution,
};
pub use error::{InjectorError, InjectorResult};
pub use events::{load_events, Event, EventSet};
pub use interactions::{CrossSection, DisFromSpline, InteractionCollection};
pub use resources::ResourceRoot;
pub use types::Vec3;

/// NUINJECTOR version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about the injector
pub fn info() -> String {
    format!(
        "NUINJECTOR-RS v{}\n\
         Monte Carlo Neutrino Interaction Injector\n\
         Weighted event generation with forced interactions\n\
         Built-in detectors: {}",
        VERSION,
        detector::BUILTIN_DETECTORS.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        let info = info();
        assert!(info.contains("NUINJECTOR"));
        assert!(info.contains("DUNEFD"));
    }
}
