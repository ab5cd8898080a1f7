//! # NUINJECTOR
//!
//! Runs one event-generation scenario and writes `<output>.json` and
//! `<output>.csv`. Without `--config` the DUNE far-detector DIS scenario runs.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nuinjector_rs::{info as banner, Assembler, InjectorResult, ResourceRoot, RunConfig, RunReport};

#[derive(Parser, Debug)]
#[command(name = "nuinjector")]
#[command(about = "Generate weighted neutrino interaction events", version)]
struct Cli {
    /// TOML run file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Number of events to generate
    #[arg(long, short)]
    events: Option<usize>,

    /// Experiment (detector model) name
    #[arg(long)]
    experiment: Option<String>,

    /// Run seed
    #[arg(long, short)]
    seed: Option<u64>,

    /// Resource directory with cross-section tables and detector models
    #[arg(long, env = "NUINJECTOR_RESOURCES")]
    resources: Option<PathBuf>,

    /// Output prefix; `.json` and `.csv` are appended
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> InjectorResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::dune_dis(),
        };
        if let Some(events) = self.events {
            config.events_to_inject = events;
        }
        if let Some(experiment) = &self.experiment {
            config.experiment = experiment.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(resources) = &self.resources {
            config.resources = Some(resources.clone());
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> InjectorResult<RunReport> {
    let config = cli.run_config()?;
    let resources = config.resource_root();
    info!(resources = %resources.path().display(), "Using resources");
    Assembler::new(config).with_resources(resources).run()
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nuinjector_rs=info,nuinjector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    println!("{}", banner());
    println!();

    match run(&cli) {
        Ok(report) => {
            println!("{}", report.summary);
            println!("Events:  {}", report.json_path.display());
            println!("Summary: {}", report.csv_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
