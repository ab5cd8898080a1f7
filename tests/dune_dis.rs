//! End-to-end runs of the DUNE far-detector DIS scenario with the bundled resources

use nuinjector_rs::{
    load_events, Assembler, ControllerState, EventSet, InjectorError, ParticleType, RunConfig,
};
use tempfile::TempDir;

fn scenario(dir: &TempDir, events: usize, seed: u64) -> RunConfig {
    let mut config = RunConfig::dune_dis();
    config.events_to_inject = events;
    config.seed = seed;
    config.output = dir.path().join("output").join("DUNE_DIS");
    config
}

fn generate(config: RunConfig) -> EventSet {
    let mut controller = Assembler::new(config).assemble().unwrap();
    controller.initialize().unwrap();
    controller.generate_events().unwrap().clone()
}

#[test]
fn test_dune_dis_scenario() {
    let dir = TempDir::new().unwrap();
    let config = scenario(&dir, 10_000, 42);
    assert_eq!(config.experiment, "DUNEFD");

    let report = Assembler::new(config).run().unwrap();
    assert_eq!(report.events, 10_000);
    assert_eq!(report.json_path, dir.path().join("output/DUNE_DIS.json"));
    assert!(report.csv_path.is_file());

    let events = load_events(dir.path().join("output/DUNE_DIS")).unwrap();
    assert_eq!(events.len(), 10_000);
    assert_eq!(events.primary_type, ParticleType::NuMu);

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.index, i);
        assert_eq!(event.record.signature.primary_type, ParticleType::NuMu);

        let energy = event.record.primary_energy();
        assert!((1e3..=1e6).contains(&energy), "energy {} out of range", energy);

        assert!(event.weight.is_finite() && event.weight > 0.0);
        assert!(event.interaction_probability > 0.0 && event.interaction_probability <= 1.0);
        assert_eq!(event.record.signature.secondary_types.first(), Some(&ParticleType::MuMinus));

        let y = event.record.interaction_parameters["bjorken_y"];
        assert!(y > 0.0 && y <= 1.0);
    }

    let csv = std::fs::read_to_string(&report.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 10_001);
}

#[test]
fn test_save_then_load_is_exact() {
    let dir = TempDir::new().unwrap();
    let config = scenario(&dir, 300, 11);
    let prefix = config.output.clone();

    let mut controller = Assembler::new(config).assemble().unwrap();
    controller.initialize().unwrap();
    controller.generate_events().unwrap();
    let (json, _) = controller.save_events(&prefix).unwrap();

    assert_eq!(&load_events(json).unwrap(), controller.events().unwrap());
}

#[test]
fn test_generate_before_initialize() {
    let dir = TempDir::new().unwrap();
    let mut controller = Assembler::new(scenario(&dir, 10, 1)).assemble().unwrap();
    assert_eq!(controller.state(), ControllerState::Configuring);
    assert!(matches!(controller.generate_events(), Err(InjectorError::Configuration(_))));
    assert!(controller.save_events(dir.path().join("none")).is_err());
}

#[test]
fn test_seed_determinism() {
    let dir = TempDir::new().unwrap();
    let a = generate(scenario(&dir, 200, 7));
    let b = generate(scenario(&dir, 200, 7));
    let c = generate(scenario(&dir, 200, 8));

    assert_eq!(a, b);
    assert_ne!(a.events, c.events);
}

#[test]
fn test_thread_count_does_not_change_events() {
    let dir = TempDir::new().unwrap();
    let reference = generate(scenario(&dir, 100, 3));

    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let single = pool.install(|| generate(scenario(&dir, 100, 3)));
    assert_eq!(reference, single);
}
