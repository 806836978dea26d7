use anyhow::Context;
use clap::Parser;
use coordination_framework::tracing::setup_tracing;
use coordination_protocols::{ProtocolKind, Simulation, SimulationConfig};
use std::path::PathBuf;
use tracing::info;

/// Runs classic concurrency-coordination protocols and reports what every actor did.
#[derive(Parser, Debug)]
#[command(name = "coordination", version, about)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol to run; repeat to run several. Runs all of them when omitted.
    #[arg(short, long = "protocol", value_enum)]
    protocols: Vec<ProtocolKind>,

    /// Seed for the random work durations.
    #[arg(long)]
    seed: Option<u64>,

    /// Skip simulated work entirely.
    #[arg(long)]
    no_delay: bool,

    /// Print every event of each run.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let mut simulation = Simulation::new(config)?;
    if cli.no_delay {
        simulation = simulation.without_delay();
    }

    let kinds = if cli.protocols.is_empty() {
        ProtocolKind::ALL.to_vec()
    } else {
        cli.protocols.clone()
    };

    for kind in kinds {
        let run = simulation
            .run(kind)
            .await
            .with_context(|| format!("protocol {kind} failed"))?;
        if cli.verbose {
            for event in &run.events {
                println!("{event}");
            }
        }
        println!(
            "{:<16} {} ({} events, {:.2}s)",
            run.kind.name(),
            run.summary,
            run.events.len(),
            run.elapsed.as_secs_f64()
        );
    }

    info!("All protocols finished");
    Ok(())
}
